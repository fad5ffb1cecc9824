//! Request ID middleware for request tracing and correlation.
//!
//! An upstream `x-request-id` is honoured when it looks sane (short, visible
//! ASCII); anything else is replaced by a fresh UUID v4. The id is recorded on
//! the request span, tagged on the Sentry scope, stored in the request
//! extensions and echoed back in the response.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream request id accepted verbatim.
const MAX_REQUEST_ID_LENGTH: usize = 128;

/// The id assigned to the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Middleware that ensures every request has a request ID.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id =
        upstream_request_id(request.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", request_id.as_str());
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// A usable request id supplied by a proxy, if any.
fn upstream_request_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(REQUEST_ID_HEADER)?.to_str().ok()?.trim();

    let acceptable = !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LENGTH
        && value.bytes().all(|b| b.is_ascii_graphic());

    acceptable.then(|| value.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(v) = HeaderValue::from_str(value) {
            headers.insert(REQUEST_ID_HEADER, v);
        }
        headers
    }

    #[test]
    fn test_upstream_id_is_kept() {
        assert_eq!(
            upstream_request_id(&headers("abc-123")).as_deref(),
            Some("abc-123")
        );
    }

    #[test]
    fn test_unusable_ids_are_replaced() {
        assert_eq!(upstream_request_id(&HeaderMap::new()), None);
        assert_eq!(upstream_request_id(&headers("has space")), None);
        assert_eq!(upstream_request_id(&headers(&"x".repeat(200))), None);
    }
}
