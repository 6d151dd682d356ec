// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use serde_json::json;
use tokio::{net::TcpListener, sync::mpsc::Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::{Config, DEFAULT_RECEIVER_ENDPOINT};
use crate::http::{
    extract_request_body, handler_not_found, log_and_create_http_response,
    verify_request_content_length,
};
use crate::otlp::transform::dd_traces_to_otel;
use crate::traces::decoder;
use crate::traces::error::DecodeError;

const V3_TRACE_ENDPOINT_PATH: &str = "/v0.3/traces";
const V4_TRACE_ENDPOINT_PATH: &str = "/v0.4/traces";
const V5_TRACE_ENDPOINT_PATH: &str = "/v0.5/traces";

const ERROR_MESSAGE_PREFIX: &str = "Error processing traces";

type AgentState = (Arc<Config>, Sender<ExportTraceServiceRequest>);

/// HTTP receiver for the Datadog trace intake endpoints. Every accepted
/// payload is translated to OTLP and forwarded on `trace_tx`.
pub struct TraceAgent {
    config: Arc<Config>,
    trace_tx: Sender<ExportTraceServiceRequest>,
    endpoint: String,
    shutdown_token: CancellationToken,
}

impl TraceAgent {
    #[must_use]
    pub fn new(config: Arc<Config>, trace_tx: Sender<ExportTraceServiceRequest>) -> Self {
        let endpoint = Self::parse_endpoint(config.receiver_endpoint.as_deref());

        Self {
            config,
            trace_tx,
            endpoint,
            shutdown_token: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn parse_endpoint(endpoint: Option<&str>) -> String {
        if let Some(endpoint) = endpoint {
            let endpoint = endpoint.trim();
            let valid = endpoint
                .rsplit_once(':')
                .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
            if valid {
                return endpoint.to_string();
            }

            error!(
                "TRACES | Invalid receiver endpoint '{endpoint}', using default {DEFAULT_RECEIVER_ENDPOINT}"
            );
        }

        DEFAULT_RECEIVER_ENDPOINT.to_string()
    }

    /// Binds the configured endpoint and serves until the shutdown token is
    /// cancelled.
    pub async fn start(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.endpoint).await?;
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        let router = self.make_router();

        if let Ok(addr) = listener.local_addr() {
            debug!("TRACES | Listening for traces on {addr}");
        }
        axum::serve(listener, router)
            .with_graceful_shutdown(Self::graceful_shutdown(self.shutdown_token.clone()))
            .await
    }

    fn make_router(&self) -> Router {
        let state: AgentState = (Arc::clone(&self.config), self.trace_tx.clone());

        Router::new()
            .route(
                V3_TRACE_ENDPOINT_PATH,
                post(Self::traces).put(Self::traces),
            )
            .route(
                V4_TRACE_ENDPOINT_PATH,
                post(Self::traces).put(Self::traces),
            )
            .route(
                V5_TRACE_ENDPOINT_PATH,
                post(Self::traces).put(Self::traces),
            )
            .layer(DefaultBodyLimit::max(self.config.max_request_content_length))
            .fallback(handler_not_found)
            .with_state(state)
    }

    async fn graceful_shutdown(shutdown_token: CancellationToken) {
        shutdown_token.cancelled().await;
        debug!("TRACES | Shutdown signal received, shutting down");
    }

    async fn traces(
        State((config, trace_tx)): State<AgentState>,
        request: Request,
    ) -> Response {
        if let Some(response) = verify_request_content_length(
            request.headers(),
            config.max_request_content_length,
            ERROR_MESSAGE_PREFIX,
        ) {
            return response;
        }

        let read_timeout = Duration::from_secs(config.receiver_read_timeout);
        let (parts, body) =
            match tokio::time::timeout(read_timeout, extract_request_body(request)).await {
                Ok(Ok(r)) => r,
                Ok(Err(e)) => {
                    return log_and_create_http_response(
                        &format!("{ERROR_MESSAGE_PREFIX}: Failed to read request body: {e}"),
                        e.status(),
                    );
                }
                Err(_) => {
                    return log_and_create_http_response(
                        &format!(
                            "{ERROR_MESSAGE_PREFIX}: Timed out reading request body after {}s",
                            read_timeout.as_secs()
                        ),
                        StatusCode::REQUEST_TIMEOUT,
                    );
                }
            };

        let content_type = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let path = parts.uri.path().to_string();

        let decoded = tokio::task::spawn_blocking(move || {
            decode_and_translate(&body, &content_type, &path)
        })
        .await;

        let request = match decoded {
            Ok(Ok(request)) => request,
            Ok(Err(e)) => {
                return log_and_create_http_response(
                    &format!("{ERROR_MESSAGE_PREFIX}: {e}"),
                    StatusCode::BAD_REQUEST,
                );
            }
            Err(e) => {
                return log_and_create_http_response(
                    &format!("{ERROR_MESSAGE_PREFIX}: Decoding task failed: {e}"),
                    StatusCode::INTERNAL_SERVER_ERROR,
                );
            }
        };

        match trace_tx.send(request).await {
            Ok(()) => {
                debug!("TRACES | Successfully forwarded translated traces");
                (
                    StatusCode::OK,
                    json!({"rate_by_service":{"service:,env:":1}}).to_string(),
                )
                    .into_response()
            }
            Err(err) => log_and_create_http_response(
                &format!("{ERROR_MESSAGE_PREFIX}: Error forwarding translated traces: {err}"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        }
    }
}

/// Decodes and translates a buffered body. Called on the blocking pool.
fn decode_and_translate(
    body: &[u8],
    content_type: &str,
    path: &str,
) -> Result<ExportTraceServiceRequest, DecodeError> {
    let traces = decoder::decode(body, content_type, path).inspect_err(|e| match e.codec() {
        Some(codec) => debug!("TRACES | {codec} payload on {path} rejected"),
        None => debug!(
            "TRACES | Payload on {path} with content type '{content_type}' matched no codec"
        ),
    })?;

    let span_count: usize = traces.iter().map(Vec::len).sum();
    debug!(
        "TRACES | Decoded {} traces with {span_count} spans from {path}",
        traces.len()
    );

    Ok(dd_traces_to_otel(&traces))
}
