//! Correlation IDs.
//!
//! Every request gets one ID. A client may supply its own in
//! `X-Correlation-ID`; anything that is not a UUID is replaced. The ID is
//! stored in request extensions (read it with [`CorrelationId`]), recorded on
//! the request span and returned in the response header.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::extractors::CorrelationId;

/// Header carrying the correlation ID both ways.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// The client-supplied ID, when it is a UUID.
#[must_use]
pub fn incoming_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

/// Middleware function; install with `axum::middleware::from_fn(correlate)`.
pub async fn correlate(mut request: Request, next: Next) -> Response {
    let id = incoming_id(request.headers()).unwrap_or_else(Uuid::new_v4);
    request.extensions_mut().insert(CorrelationId(id));

    let span = tracing::info_span!(
        "request",
        correlation_id = %id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::try_from(id.hyphenated().to_string()) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{body::Body, body::to_bytes, routing::get, Router};
    use tower::ServiceExt;

    /// Echo router: the body is the ID the handler saw.
    fn app() -> Router {
        Router::new()
            .route("/whoami", get(|CorrelationId(id): CorrelationId| async move { id.to_string() }))
            .layer(axum::middleware::from_fn(correlate))
    }

    /// (header returned, id the handler saw)
    async fn send(header: Option<&str>) -> (String, String) {
        let mut request = axum::http::Request::builder().uri("/whoami");
        if let Some(value) = header {
            request = request.header(CORRELATION_ID_HEADER, value);
        }
        let response = app().oneshot(request.body(Body::empty()).unwrap()).await.unwrap();
        let echoed = response.headers()[CORRELATION_ID_HEADER].to_str().unwrap().to_string();
        let seen = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (echoed, String::from_utf8(seen.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn client_id_is_kept_through_the_handler_and_back() {
        let id = Uuid::new_v4().to_string();
        let (echoed, seen) = send(Some(&id)).await;
        assert_eq!(echoed, id);
        assert_eq!(seen, id);
    }

    #[tokio::test]
    async fn unusable_ids_are_replaced_with_a_fresh_one() {
        for header in [None, Some("not-a-uuid"), Some(""), Some("1234")] {
            let (echoed, seen) = send(header).await;
            let fresh = Uuid::parse_str(&echoed).unwrap();
            assert!(!fresh.is_nil());
            assert_ne!(Some(echoed.as_str()), header);
            assert_eq!(seen, echoed, "handler and response disagree for {header:?}");
        }
    }

    #[tokio::test]
    async fn requests_without_an_id_do_not_share_one() {
        let (first, _) = send(None).await;
        let (second, _) = send(None).await;
        assert_ne!(first, second);
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(CORRELATION_ID_HEADER, HeaderValue::try_from(format!(" {id} ")).unwrap());
        assert_eq!(incoming_id(&headers), Some(id));
    }
}
