// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use mime::Mime;

use crate::traces::dictionary;
use crate::traces::error::{CodecError, DecodeError};
use crate::traces::span::Traces;

pub const APPLICATION_MSGPACK: &str = "application/msgpack";
const APPLICATION_JSON: &str = "application/json";
const TEXT_JSON: &str = "text/json";
const V05_URI_MARKER: &str = "v0.5";

/// Wire formats a trace payload can be sent in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    /// Array of arrays of span objects.
    Json,
    /// Array of arrays of spans, each a map or a positional array.
    Msgpack,
    /// The v0.5 string table format.
    MsgpackDictionary,
}

impl Codec {
    /// Order in which codecs are attempted when the content type is not
    /// conclusive.
    pub const CASCADE: [Codec; 3] = [Codec::Json, Codec::Msgpack, Codec::MsgpackDictionary];

    /// Decodes `body` into a fresh value.
    pub fn decode(self, body: &[u8]) -> Result<Traces, CodecError> {
        match self {
            Codec::Json => Ok(serde_json::from_slice(body)?),
            Codec::Msgpack => Ok(rmp_serde::from_slice(body)?),
            Codec::MsgpackDictionary => Ok(dictionary::from_slice(body)?),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Json => write!(f, "JSON"),
            Codec::Msgpack => write!(f, "Msgpack"),
            Codec::MsgpackDictionary => write!(f, "v0.5"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    Single(Codec),
    /// Try every codec in [`Codec::CASCADE`] order, keep the first success.
    Cascade,
}

/// Lowercase `type/subtype` of a `Content-Type` header value, without
/// parameters. `None` when the value is empty or not a media type.
#[must_use]
pub fn media_type(content_type: &str) -> Option<String> {
    content_type
        .trim()
        .parse::<Mime>()
        .ok()
        .map(|mime| mime.essence_str().to_ascii_lowercase())
}

#[must_use]
pub fn select_strategy(content_type: &str, uri: &str) -> Strategy {
    match media_type(content_type).as_deref() {
        Some(APPLICATION_JSON | TEXT_JSON) => Strategy::Single(Codec::Json),
        Some(APPLICATION_MSGPACK) if uri.contains(V05_URI_MARKER) => {
            Strategy::Single(Codec::MsgpackDictionary)
        }
        Some(APPLICATION_MSGPACK) => Strategy::Single(Codec::Msgpack),
        // Senders that omit the header still get a JSON-first decode.
        None | Some(_) => Strategy::Cascade,
    }
}

/// Decodes a request body into traces, picking the wire format from the
/// declared content type and the request URI.
///
/// `body` must be the whole, already buffered request body: a cascade reads
/// it once per codec.
pub fn decode(body: &[u8], content_type: &str, uri: &str) -> Result<Traces, DecodeError> {
    match select_strategy(content_type, uri) {
        Strategy::Single(codec) => codec
            .decode(body)
            .map_err(|source| DecodeError::Decode { codec, source }),
        Strategy::Cascade => decode_cascade(body),
    }
}

fn decode_cascade(body: &[u8]) -> Result<Traces, DecodeError> {
    let [json, msgpack, dictionary] = Codec::CASCADE;

    let json = match json.decode(body) {
        Ok(traces) => return Ok(traces),
        Err(e) => e,
    };
    let msgpack = match msgpack.decode(body) {
        Ok(traces) => return Ok(traces),
        Err(e) => e,
    };
    let dictionary = match dictionary.decode(body) {
        Ok(traces) => return Ok(traces),
        Err(e) => e,
    };

    Err(DecodeError::Exhausted {
        body_len: body.len(),
        json,
        msgpack,
        dictionary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traces::dictionary::test_utils::{v05_payload, v05_span};
    use crate::traces::span::test_utils::create_test_span;

    #[test]
    fn test_media_type() {
        assert_eq!(media_type("application/json").as_deref(), Some("application/json"));
        assert_eq!(
            media_type("Application/MsgPack; charset=utf-8").as_deref(),
            Some("application/msgpack")
        );
        assert_eq!(media_type(""), None);
        assert_eq!(media_type("not a media type"), None);
    }

    #[test]
    fn test_select_strategy() {
        assert_eq!(
            select_strategy("application/json", "/v0.4/traces"),
            Strategy::Single(Codec::Json)
        );
        assert_eq!(
            select_strategy("text/json", "/v0.3/traces"),
            Strategy::Single(Codec::Json)
        );
        assert_eq!(
            select_strategy("application/msgpack", "/v0.4/traces"),
            Strategy::Single(Codec::Msgpack)
        );
        assert_eq!(
            select_strategy("application/msgpack", "/v0.5/traces"),
            Strategy::Single(Codec::MsgpackDictionary)
        );
        assert_eq!(
            select_strategy("application/octet-stream", "/v0.5/traces"),
            Strategy::Cascade
        );
        assert_eq!(select_strategy("", "/v0.4/traces"), Strategy::Cascade);
        assert_eq!(select_strategy(";;;", "/v0.4/traces"), Strategy::Cascade);
    }

    #[test]
    fn test_decode_json() {
        let body = br#"[[{"service":"api","name":"GET /","trace_id":1,"span_id":2,"start":10,"duration":5,"type":"web"}],[]]"#;
        let traces = decode(body, "application/json", "/v0.4/traces").expect("should decode");
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0][0].service, "api");
        assert_eq!(traces[0][0].duration, 5);
        assert!(traces[1].is_empty());
    }

    #[test]
    fn test_decode_msgpack() {
        let span = create_test_span(1, 2, 0, "api");
        let body = rmp_serde::to_vec_named(&vec![vec![span.clone()]]).expect("should encode");
        let traces = decode(&body, "application/msgpack", "/v0.4/traces").expect("should decode");
        assert_eq!(traces, vec![vec![span]]);
    }

    #[test]
    fn test_decode_msgpack_dictionary() {
        let body = v05_payload(&["api", "op", ""], vec![vec![v05_span(0, 1, 1, 2, 0, vec![], 2)]]);
        let traces = decode(&body, "application/msgpack", "/v0.5/traces").expect("should decode");
        assert_eq!(traces[0][0].service, "api");
        assert_eq!(traces[0][0].name, "op");
    }

    #[test]
    fn test_single_strategy_returns_codec_error() {
        let span = create_test_span(1, 2, 0, "api");
        let body = rmp_serde::to_vec_named(&vec![vec![span]]).expect("should encode");

        let err = decode(&body, "application/json", "/v0.4/traces").expect_err("should fail");
        assert_eq!(err.codec(), Some(Codec::Json));
        assert!(matches!(
            err,
            DecodeError::Decode {
                source: CodecError::Json(_),
                ..
            }
        ));
    }

    #[test]
    fn test_msgpack_content_type_does_not_fall_back_to_json() {
        let err = decode(b"[[]]", "application/msgpack", "/v0.4/traces").expect_err("should fail");
        assert_eq!(err.codec(), Some(Codec::Msgpack));
    }

    #[test]
    fn test_cascade_reaches_msgpack() {
        let span = create_test_span(1, 2, 0, "api");
        let body = rmp_serde::to_vec_named(&vec![vec![span.clone()]]).expect("should encode");

        let traces = decode(&body, "", "/v0.4/traces").expect("should decode");
        assert_eq!(traces, vec![vec![span.clone()]]);

        let traces =
            decode(&body, "application/octet-stream", "/v0.4/traces").expect("should decode");
        assert_eq!(traces, vec![vec![span]]);
    }

    #[test]
    fn test_cascade_reaches_dictionary() {
        let body = v05_payload(&["api", "op", ""], vec![vec![v05_span(0, 1, 7, 8, 0, vec![], 2)]]);
        let traces = decode(&body, "", "/v0.5/traces").expect("should decode");
        assert_eq!(traces[0][0].trace_id, 7);
        assert_eq!(traces[0][0].service, "api");
    }

    #[test]
    fn test_cascade_prefers_json() {
        let traces = decode(br#"[[{"name":"x"}]]"#, "", "/v0.4/traces").expect("should decode");
        assert_eq!(traces[0][0].name, "x");
    }

    #[test]
    fn test_cascade_exhausted_reports_every_codec() {
        let body = b"definitely not a trace payload";
        let err = decode(body, "application/x-unknown", "/v0.4/traces").expect_err("should fail");

        assert_eq!(err.codec(), None);
        let DecodeError::Exhausted {
            body_len,
            json,
            msgpack,
            dictionary,
        } = &err
        else {
            panic!("expected an exhausted cascade, got {err:?}");
        };
        assert_eq!(*body_len, body.len());
        assert!(matches!(json, CodecError::Json(_)));
        assert!(matches!(msgpack, CodecError::Msgpack(_)));
        assert!(matches!(dictionary, CodecError::Dictionary(_)));

        let message = err.to_string();
        assert!(message.contains(&format!("JSON ({json})")));
        assert!(message.contains(&format!("Msgpack ({msgpack})")));
        assert!(message.contains(&format!("v0.5 ({dictionary})")));
    }
}
