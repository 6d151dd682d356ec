#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]

use std::{
    env,
    io::{Error, Result},
    path::Path,
    sync::Arc,
};

use datadog_receiver::{
    config::{self, Config},
    logger,
    traces::trace_agent::TraceAgent,
};
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use tokio::sync::mpsc::{self, Receiver};
use tracing::{Level, debug, error, info, trace};

fn load_config() -> Result<Arc<Config>> {
    let config_directory = env::var("DD_CONFIG_DIR").unwrap_or_else(|_| ".".to_string());
    config::get_config(Path::new(&config_directory))
        .map(Arc::new)
        .map_err(|e| Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
}

async fn consume_traces(mut trace_rx: Receiver<ExportTraceServiceRequest>) {
    while let Some(request) = trace_rx.recv().await {
        let span_count: usize = request
            .resource_spans
            .iter()
            .flat_map(|resource_spans| &resource_spans.scope_spans)
            .map(|scope_spans| scope_spans.spans.len())
            .sum();
        info!(
            "Received {} resource spans with {span_count} spans",
            request.resource_spans.len()
        );

        if tracing::enabled!(Level::TRACE) {
            match serde_json::to_string(&request) {
                Ok(json) => trace!("{json}"),
                Err(e) => error!("Failed to serialize translated traces: {e}"),
            }
        }
    }
    debug!("Trace channel closed");
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;

    logger::init(config.log_level).map_err(|e| {
        Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to initialize logging: {e}"),
        )
    })?;

    let (trace_tx, trace_rx) = mpsc::channel(config.trace_channel_buffer_size);
    let consumer = tokio::spawn(consume_traces(trace_rx));

    let trace_agent = TraceAgent::new(Arc::clone(&config), trace_tx);
    let shutdown_token = trace_agent.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received interrupt, shutting down");
                shutdown_token.cancel();
            }
            Err(e) => error!("Failed to listen for interrupt: {e}"),
        }
    });

    info!("Starting trace receiver on {}", trace_agent.endpoint());
    if let Err(e) = trace_agent.start().await {
        error!("Trace receiver failed: {e}");
        return Err(e);
    }

    // Closes the channel so the consumer drains and exits.
    drop(trace_agent);
    if let Err(e) = consumer.await {
        error!("Trace consumer failed: {e}");
    }

    Ok(())
}
