use axum::{
    extract::{FromRequest, Request, rejection::BytesRejection},
    http::{self, HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde_json::json;
use tracing::{debug, error};

pub async fn handler_not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

/// Buffers the whole request body.
pub async fn extract_request_body(
    request: Request,
) -> Result<(http::request::Parts, Bytes), BytesRejection> {
    let (parts, body) = request.into_parts();
    let bytes = Bytes::from_request(Request::from_parts(parts.clone(), body), &()).await?;

    Ok((parts, bytes))
}

/// Logs `message` and returns it as `{"message": message}` with `status`.
///
/// Success statuses are logged at debug level, everything else as an error.
pub fn log_and_create_http_response(message: &str, status: StatusCode) -> Response {
    if status.is_success() {
        debug!("{message}");
    } else {
        error!("{message}");
    }
    (status, json!({ "message": message }).to_string()).into_response()
}

/// Rejects requests whose declared `Content-Length` is invalid or larger than
/// `max_content_length`. Requests without the header (chunked bodies) are
/// let through and bounded by the body limit instead.
pub fn verify_request_content_length(
    header_map: &HeaderMap,
    max_content_length: usize,
    error_message_prefix: &str,
) -> Option<Response> {
    let content_length_header = header_map.get(header::CONTENT_LENGTH)?;

    let Some(content_length) = content_length_header
        .to_str()
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
    else {
        return Some(log_and_create_http_response(
            &format!("{error_message_prefix}: Invalid Content-Length header"),
            StatusCode::BAD_REQUEST,
        ));
    };

    if content_length > max_content_length {
        return Some(log_and_create_http_response(
            &format!("{error_message_prefix}: Payload too large"),
            StatusCode::PAYLOAD_TOO_LARGE,
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn create_test_headers_with_content_length(val: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(
            header::CONTENT_LENGTH,
            HeaderValue::from_str(val).expect("valid header value"),
        );
        map
    }

    #[test]
    fn test_request_content_length_missing() {
        assert!(
            verify_request_content_length(&HeaderMap::new(), 1, "Error processing traces")
                .is_none()
        );
    }

    #[test]
    fn test_request_content_length_cant_convert_to_usize() {
        let response = verify_request_content_length(
            &create_test_headers_with_content_length("not_an_int"),
            1,
            "Error processing traces",
        )
        .expect("should reject");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_request_content_length_too_long() {
        let response = verify_request_content_length(
            &create_test_headers_with_content_length("100"),
            1,
            "Error processing traces",
        )
        .expect("should reject");
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_request_content_length_within_limit() {
        assert!(
            verify_request_content_length(
                &create_test_headers_with_content_length("100"),
                100,
                "Error processing traces",
            )
            .is_none()
        );
    }

    #[tokio::test]
    async fn test_extract_request_body() {
        let request = Request::builder()
            .uri("/v0.4/traces")
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from("[[]]"))
            .expect("valid request");

        let (parts, body) = extract_request_body(request)
            .await
            .expect("should extract body");
        assert_eq!(parts.uri.path(), "/v0.4/traces");
        assert_eq!(body.as_ref(), b"[[]]");
    }
}
