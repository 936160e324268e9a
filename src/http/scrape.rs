//! Metrics scrape endpoint.
//!
//! Serves the registry in Prometheus text exposition format, GET only.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{on, MethodFilter},
    Router,
};
use prometheus::{Encoder, Registry, TextEncoder};

/// Default scrape path.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Router with a single scrape route at `path`.
///
/// HEAD is refused explicitly; axum would otherwise answer it from the GET
/// endpoint.
pub fn metrics_router(path: &str, registry: Registry) -> Router {
    Router::new()
        .route(
            path,
            on(MethodFilter::GET, scrape).on(MethodFilter::HEAD, get_only),
        )
        .with_state(registry)
}

async fn get_only() -> impl IntoResponse {
    (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "GET")])
}

async fn scrape(State(registry): State<Registry>) -> Response {
    let encoder = TextEncoder::new();
    let families = registry.gather();
    let mut buffer = Vec::new();

    match encoder.encode(&families, &mut buffer) {
        Ok(()) => (
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(
                error = %e,
                metric_family_count = families.len(),
                "Prometheus text encoder failed"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http, http::Method};
    use prometheus::{IntCounter, Registry};
    use tower::ServiceExt;

    #[tokio::test]
    async fn serves_registry_contents() {
        let registry = Registry::new();
        let counter = IntCounter::new("scrape_test_total", "help").unwrap();
        registry.register(Box::new(counter.clone())).unwrap();
        counter.inc();

        let response = metrics_router(DEFAULT_METRICS_PATH, registry)
            .oneshot(http::Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("scrape_test_total 1"));
    }

    #[tokio::test]
    async fn only_get_on_configured_path() {
        let router = metrics_router("/stats", Registry::new());

        let post = router
            .clone()
            .oneshot(
                http::Request::builder()
                    .method(Method::POST)
                    .uri("/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(post.status(), StatusCode::METHOD_NOT_ALLOWED);

        let head = router
            .clone()
            .oneshot(
                http::Request::builder()
                    .method(Method::HEAD)
                    .uri("/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(head.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(head.headers()[header::ALLOW], "GET");

        let other = router
            .oneshot(http::Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(other.status(), StatusCode::NOT_FOUND);
    }
}
