// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

/// A span as sent by Datadog tracers to the `/v0.3`, `/v0.4` and `/v0.5`
/// trace endpoints.
///
/// Field order matters: positional msgpack encodings (array-encoded spans and
/// the v0.5 dictionary format) list fields in exactly this order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Span {
    #[serde(deserialize_with = "deserialize_null_as_default")]
    pub service: String,
    #[serde(deserialize_with = "deserialize_null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "deserialize_null_as_default")]
    pub resource: String,
    #[serde(deserialize_with = "deserialize_null_as_default")]
    pub trace_id: u64,
    #[serde(deserialize_with = "deserialize_null_as_default")]
    pub span_id: u64,
    /// `0` when the span is a root span
    #[serde(deserialize_with = "deserialize_null_as_default")]
    pub parent_id: u64,
    /// Nanoseconds since epoch
    #[serde(deserialize_with = "deserialize_null_as_default")]
    pub start: i64,
    /// Nanoseconds
    #[serde(deserialize_with = "deserialize_null_as_default")]
    pub duration: i64,
    /// `0` for no error, the error code otherwise
    #[serde(deserialize_with = "deserialize_null_as_default")]
    pub error: i32,
    #[serde(deserialize_with = "deserialize_null_as_default")]
    pub meta: HashMap<String, String>,
    #[serde(deserialize_with = "deserialize_null_as_default")]
    pub metrics: HashMap<String, f64>,
    #[serde(rename = "type", deserialize_with = "deserialize_null_as_default")]
    pub r#type: String,
}

/// Spans grouped by the tracer. They are expected, not guaranteed, to share a
/// trace ID.
pub type Trace = Vec<Span>;

/// Everything decoded from a single request body.
pub type Traces = Vec<Trace>;

/// Number of positional fields of an array-encoded span.
pub const SPAN_FIELD_COUNT: usize = 12;

fn deserialize_null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_absent_and_null_fields_default() {
        let json = r#"[[{"trace_id": 1, "span_id": 2, "meta": null, "service": null}]]"#;
        let traces: Traces = serde_json::from_str(json).expect("should decode");

        let span = &traces[0][0];
        assert_eq!(span.trace_id, 1);
        assert_eq!(span.span_id, 2);
        assert_eq!(span.parent_id, 0);
        assert!(span.service.is_empty());
        assert!(span.meta.is_empty());
        assert!(span.r#type.is_empty());
    }

    #[test]
    fn test_null_numeric_fields_default_to_zero() {
        let payload = serde_json::json!([[{
            "service": "api",
            "trace_id": 1,
            "span_id": 2,
            "parent_id": null,
            "error": null,
            "start": null,
            "duration": null
        }]]);

        let from_json: Traces =
            serde_json::from_str(&payload.to_string()).expect("should decode");
        let msgpack = rmp_serde::to_vec_named(&payload).expect("should encode");
        let from_msgpack: Traces = rmp_serde::from_slice(&msgpack).expect("should decode");

        for traces in [from_json, from_msgpack] {
            let span = &traces[0][0];
            assert_eq!(span.service, "api");
            assert_eq!(span.trace_id, 1);
            assert_eq!(span.span_id, 2);
            assert_eq!(span.parent_id, 0);
            assert_eq!(span.error, 0);
            assert_eq!(span.start, 0);
            assert_eq!(span.duration, 0);
        }
    }

    #[test]
    fn test_json_type_key() {
        let json = r#"[[{"type": "web", "name": "http.request"}]]"#;
        let traces: Traces = serde_json::from_str(json).expect("should decode");
        assert_eq!(traces[0][0].r#type, "web");
        assert_eq!(traces[0][0].name, "http.request");
    }

    #[test]
    fn test_msgpack_named_and_positional_spans_decode_alike() {
        let span = test_utils::create_test_span(11, 222, 333, "api");

        let named = rmp_serde::to_vec_named(&vec![vec![span.clone()]]).expect("should encode");
        let positional = rmp_serde::to_vec(&vec![vec![span.clone()]]).expect("should encode");

        let from_named: Traces = rmp_serde::from_slice(&named).expect("should decode");
        let from_positional: Traces = rmp_serde::from_slice(&positional).expect("should decode");

        assert_eq!(from_named, vec![vec![span.clone()]]);
        assert_eq!(from_positional, vec![vec![span]]);
    }
}
