//! Widening of Datadog's 64-bit identifiers into OTLP identifiers.

/// Big-endian 16-byte trace ID from its high and low 64-bit halves.
#[must_use]
pub fn u64_to_trace_id(high: u64, low: u64) -> [u8; 16] {
    let mut trace_id = [0u8; 16];
    trace_id[..8].copy_from_slice(&high.to_be_bytes());
    trace_id[8..].copy_from_slice(&low.to_be_bytes());
    trace_id
}

#[must_use]
pub fn u64_to_span_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// A Datadog trace ID is the low half of the OTLP trace ID, the high half is
/// zero.
#[must_use]
pub fn dd_trace_id_to_otel(trace_id: u64) -> [u8; 16] {
    u64_to_trace_id(0, trace_id)
}
