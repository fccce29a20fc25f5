//! Request ID propagation and the per-request tracing span.

use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{field, info_span, Instrument};
use uuid::Uuid;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
pub static CORRELATION_ID_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

#[derive(Debug, Clone)]
pub struct RequestId(pub Arc<str>);

impl RequestId {
    pub fn new() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opens the `request` span. `user_id` starts empty and is filled in by the
/// auth middleware once a token has been verified.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = extract_or_generate_request_id(&request);

    request.extensions_mut().insert(request_id.clone());

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
        user_id = field::Empty,
    );

    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}

fn extract_or_generate_request_id(request: &Request) -> RequestId {
    [&REQUEST_ID_HEADER, &CORRELATION_ID_HEADER]
        .into_iter()
        .filter_map(|name| request.headers().get(name))
        .filter_map(|value| value.to_str().ok())
        .find(|id| is_valid_request_id(id))
        .map(|id| RequestId(Arc::from(id)))
        .unwrap_or_default()
}

fn is_valid_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with(headers: &[(&HeaderName, &str)]) -> Request {
        let mut builder = Request::builder().uri("/api/leaderboard/naturalists");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(RequestId::new().as_str(), RequestId::new().as_str());
    }

    #[test]
    fn test_incoming_request_id_is_kept() {
        let req = request_with(&[(&REQUEST_ID_HEADER, "qr-scan-42")]);
        assert_eq!(extract_or_generate_request_id(&req).as_str(), "qr-scan-42");
    }

    #[test]
    fn test_correlation_id_is_a_fallback() {
        let req = request_with(&[
            (&REQUEST_ID_HEADER, "bad id with spaces"),
            (&CORRELATION_ID_HEADER, "corr-7"),
        ]);
        assert_eq!(extract_or_generate_request_id(&req).as_str(), "corr-7");
    }

    #[test]
    fn test_request_id_validation() {
        assert!(is_valid_request_id("ABC-123_xyz"));
        assert!(is_valid_request_id(&"a".repeat(128)));
        assert!(!is_valid_request_id(""));
        assert!(!is_valid_request_id("abc@123"));
        assert!(!is_valid_request_id(&"a".repeat(129)));
    }
}
