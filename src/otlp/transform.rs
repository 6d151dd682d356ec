use std::collections::HashMap;

use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::{
    AnyValue, InstrumentationScope as OtelInstrumentationScope, KeyValue, any_value,
};
use opentelemetry_proto::tonic::resource::v1::Resource as OtelResource;
use opentelemetry_proto::tonic::trace::v1::{
    ResourceSpans, ScopeSpans, Span as OtelSpan, Status, span::SpanKind, status::StatusCode,
};
use opentelemetry_semantic_conventions::resource::SERVICE_NAME;

use crate::otlp::ids::{dd_trace_id_to_otel, u64_to_span_id};
use crate::traces::span::{Span as DatadogSpan, Trace};
use crate::{RECEIVER_NAME, RECEIVER_VERSION};

/// Meta key Datadog tracers store the HTTP response status under.
pub const KEY_HTTP_STATUS_CODE: &str = "http.status_code";
pub const KEY_ERROR: &str = "error";

const SPAN_TYPE_WEB: &str = "web";
const SPAN_TYPE_CLIENT: &str = "client";

fn string_value(value: &str) -> Option<AnyValue> {
    Some(AnyValue {
        value: Some(any_value::Value::StringValue(value.to_string())),
    })
}

fn has_attribute(attributes: &[KeyValue], key: &str) -> bool {
    attributes.iter().any(|attribute| attribute.key == key)
}

/// Inserts or overwrites `key`, keeping keys unique.
fn set_attribute(attributes: &mut Vec<KeyValue>, key: &str, value: Option<AnyValue>) {
    if let Some(attribute) = attributes.iter_mut().find(|attribute| attribute.key == key) {
        attribute.value = value;
    } else {
        attributes.push(KeyValue {
            key: key.to_string(),
            value,
        });
    }
}

#[must_use]
pub fn otel_span_kind_from_dd_type(span_type: &str) -> SpanKind {
    match span_type {
        SPAN_TYPE_WEB => SpanKind::Server,
        SPAN_TYPE_CLIENT => SpanKind::Client,
        _ => SpanKind::Unspecified,
    }
}

/// Maps an HTTP status code to a span status code. Codes outside of the
/// 2xx-5xx ranges, including `0` for an unparsable value, leave it unset.
#[must_use]
pub fn status_code_from_http(code: i64) -> StatusCode {
    match code {
        200..=399 => StatusCode::Ok,
        400..=599 => StatusCode::Error,
        _ => StatusCode::Unset,
    }
}

fn otel_status(span: &DatadogSpan) -> Option<Status> {
    let code = span.meta.get(KEY_HTTP_STATUS_CODE)?;
    let code = code.parse::<i64>().unwrap_or_default();

    Some(Status {
        code: status_code_from_http(code) as i32,
        ..Default::default()
    })
}

/// Absolute start and end in nanoseconds since epoch. Negative starts clamp
/// to zero and the end never precedes the start.
#[must_use]
pub fn otel_timestamps(start: i64, duration: i64) -> (u64, u64) {
    let end = start.saturating_add(duration.max(0));
    (
        u64::try_from(start).unwrap_or_default(),
        u64::try_from(end).unwrap_or_default(),
    )
}

fn otel_attributes(span: &DatadogSpan) -> Vec<KeyValue> {
    let mut meta: Vec<(&String, &String)> = span.meta.iter().collect();
    meta.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let mut attributes: Vec<KeyValue> = meta
        .into_iter()
        .map(|(key, value)| KeyValue {
            key: key.clone(),
            value: string_value(value),
        })
        .collect();

    // Copied after the meta so it wins over a colliding meta key.
    set_attribute(&mut attributes, SERVICE_NAME, string_value(&span.service));

    // A meta `error` wins over the numeric flag.
    if span.error > 0 && !has_attribute(&attributes, KEY_ERROR) {
        attributes.push(KeyValue {
            key: KEY_ERROR.to_string(),
            value: Some(AnyValue {
                value: Some(any_value::Value::IntValue(i64::from(span.error))),
            }),
        });
    }

    attributes
}

#[must_use]
pub fn dd_span_to_otel_span(span: &DatadogSpan) -> OtelSpan {
    let (start_time_unix_nano, end_time_unix_nano) = otel_timestamps(span.start, span.duration);

    OtelSpan {
        trace_id: dd_trace_id_to_otel(span.trace_id).to_vec(),
        span_id: u64_to_span_id(span.span_id).to_vec(),
        // A root span keeps an all-zero parent, the same way Datadog encodes it.
        parent_span_id: u64_to_span_id(span.parent_id).to_vec(),
        name: span.name.clone(),
        kind: otel_span_kind_from_dd_type(&span.r#type) as i32,
        start_time_unix_nano,
        end_time_unix_nano,
        attributes: otel_attributes(span),
        status: otel_status(span),
        ..Default::default()
    }
}

/// Spans of a trace keyed by service, in order of appearance.
#[must_use]
pub fn group_by_service(trace: &[DatadogSpan]) -> HashMap<&str, Vec<&DatadogSpan>> {
    let mut grouped: HashMap<&str, Vec<&DatadogSpan>> = HashMap::new();
    for span in trace {
        grouped.entry(span.service.as_str()).or_default().push(span);
    }
    grouped
}

fn receiver_scope() -> OtelInstrumentationScope {
    OtelInstrumentationScope {
        name: RECEIVER_NAME.to_string(),
        version: RECEIVER_VERSION.to_string(),
        attributes: Vec::new(),
        dropped_attributes_count: 0,
    }
}

/// One `ResourceSpans` per service found in `trace`, sorted by service name.
#[must_use]
pub fn dd_trace_to_otel_resource_spans(trace: &[DatadogSpan]) -> Vec<ResourceSpans> {
    let mut grouped: Vec<(&str, Vec<&DatadogSpan>)> = group_by_service(trace).into_iter().collect();
    grouped.sort_unstable_by_key(|(service, _)| *service);

    grouped
        .into_iter()
        .map(|(service, spans)| ResourceSpans {
            resource: Some(OtelResource {
                attributes: vec![KeyValue {
                    key: SERVICE_NAME.to_string(),
                    value: string_value(service),
                }],
                ..Default::default()
            }),
            scope_spans: vec![ScopeSpans {
                scope: Some(receiver_scope()),
                spans: spans.into_iter().map(dd_span_to_otel_span).collect(),
                ..Default::default()
            }],
            ..Default::default()
        })
        .collect()
}

#[must_use]
pub fn dd_traces_to_otel(traces: &[Trace]) -> ExportTraceServiceRequest {
    ExportTraceServiceRequest {
        resource_spans: traces
            .iter()
            .flat_map(|trace| dd_trace_to_otel_resource_spans(trace))
            .collect(),
    }
}
