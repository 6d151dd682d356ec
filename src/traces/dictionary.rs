// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Decoder for the `/v0.5/traces` payload.
//!
//! The payload is a msgpack array of two elements: a string table, and the
//! traces. Every span is a 12-element array in [`Span`] field order where all
//! string values are indexes into the string table.

use std::collections::HashMap;

use rmpv::Value;
use rmpv::decode::read_value;
use thiserror::Error;

use crate::traces::span::{SPAN_FIELD_COUNT, Span, Trace, Traces};

#[derive(Error, Debug)]
pub enum DictionaryError {
    #[error("failed to read msgpack value: {0}")]
    Read(#[from] rmpv::decode::Error),
    #[error("expected {expected}, got {found}")]
    UnexpectedValue {
        expected: &'static str,
        found: String,
    },
    #[error("expected a payload of 2 elements, got {0}")]
    PayloadLength(usize),
    #[error("string table entry {0} is not a string")]
    InvalidString(usize),
    #[error("string table index {index} out of range, table has {len} entries")]
    IndexOutOfRange { index: u64, len: usize },
    #[error("expected {SPAN_FIELD_COUNT} span fields, got {0}")]
    SpanLength(usize),
    #[error("span field `{field}` has unexpected value {value}")]
    FieldType { field: &'static str, value: String },
}

fn unexpected(expected: &'static str, found: &Value) -> DictionaryError {
    DictionaryError::UnexpectedValue {
        expected,
        found: found.to_string(),
    }
}

fn field_type(field: &'static str, value: &Value) -> DictionaryError {
    DictionaryError::FieldType {
        field,
        value: value.to_string(),
    }
}

/// Decodes a v0.5 payload.
pub fn from_slice(mut data: &[u8]) -> Result<Traces, DictionaryError> {
    let payload = read_value(&mut data)?;
    let Some(payload) = payload.as_array() else {
        return Err(unexpected("payload array", &payload));
    };
    let [dict, traces] = payload.as_slice() else {
        return Err(DictionaryError::PayloadLength(payload.len()));
    };

    let dict = read_string_table(dict)?;

    let Some(traces) = traces.as_array() else {
        return Err(unexpected("traces array", traces));
    };
    traces
        .iter()
        .map(|trace| read_trace(trace, &dict))
        .collect()
}

fn read_string_table(value: &Value) -> Result<Vec<&str>, DictionaryError> {
    let Some(entries) = value.as_array() else {
        return Err(unexpected("string table array", value));
    };
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| entry.as_str().ok_or(DictionaryError::InvalidString(i)))
        .collect()
}

fn read_trace(value: &Value, dict: &[&str]) -> Result<Trace, DictionaryError> {
    let Some(spans) = value.as_array() else {
        return Err(unexpected("trace array", value));
    };
    spans.iter().map(|span| read_span(span, dict)).collect()
}

fn read_span(value: &Value, dict: &[&str]) -> Result<Span, DictionaryError> {
    let Some(fields) = value.as_array() else {
        return Err(unexpected("span array", value));
    };
    let [
        service,
        name,
        resource,
        trace_id,
        span_id,
        parent_id,
        start,
        duration,
        error,
        meta,
        metrics,
        r#type,
    ] = fields.as_slice()
    else {
        return Err(DictionaryError::SpanLength(fields.len()));
    };

    Ok(Span {
        service: lookup(dict, service, "service")?.to_string(),
        name: lookup(dict, name, "name")?.to_string(),
        resource: lookup(dict, resource, "resource")?.to_string(),
        trace_id: trace_id
            .as_u64()
            .ok_or_else(|| field_type("trace_id", trace_id))?,
        span_id: span_id
            .as_u64()
            .ok_or_else(|| field_type("span_id", span_id))?,
        parent_id: parent_id
            .as_u64()
            .ok_or_else(|| field_type("parent_id", parent_id))?,
        start: start.as_i64().ok_or_else(|| field_type("start", start))?,
        duration: duration
            .as_i64()
            .ok_or_else(|| field_type("duration", duration))?,
        error: error
            .as_i64()
            .and_then(|e| i32::try_from(e).ok())
            .ok_or_else(|| field_type("error", error))?,
        meta: read_meta(meta, dict)?,
        metrics: read_metrics(metrics, dict)?,
        r#type: lookup(dict, r#type, "type")?.to_string(),
    })
}

fn lookup<'a>(
    dict: &[&'a str],
    value: &Value,
    field: &'static str,
) -> Result<&'a str, DictionaryError> {
    let index = value.as_u64().ok_or_else(|| field_type(field, value))?;
    usize::try_from(index)
        .ok()
        .and_then(|i| dict.get(i).copied())
        .ok_or(DictionaryError::IndexOutOfRange {
            index,
            len: dict.len(),
        })
}

fn read_meta(value: &Value, dict: &[&str]) -> Result<HashMap<String, String>, DictionaryError> {
    let Some(entries) = value.as_map() else {
        return Err(field_type("meta", value));
    };
    entries
        .iter()
        .map(|(k, v)| {
            Ok((
                lookup(dict, k, "meta")?.to_string(),
                lookup(dict, v, "meta")?.to_string(),
            ))
        })
        .collect()
}

fn read_metrics(value: &Value, dict: &[&str]) -> Result<HashMap<String, f64>, DictionaryError> {
    let Some(entries) = value.as_map() else {
        return Err(field_type("metrics", value));
    };
    entries
        .iter()
        .map(|(k, v)| {
            let key = lookup(dict, k, "metrics")?.to_string();
            let metric = v.as_f64().ok_or_else(|| field_type("metrics", v))?;
            Ok((key, metric))
        })
        .collect()
}
