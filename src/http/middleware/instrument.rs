//! Request instrumentation middleware.
//!
//! Wraps every matched application route. Each request produces one
//! [`RequestObservation`], recorded as one counter increment and one duration
//! sample. Responses pass through untouched.
//!
//! The `path` label is the route template from [`MatchedPath`] (`/bar/{type}`),
//! not the request path (`/bar/snafu`), which keeps label cardinality bounded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::observability::metrics::RequestMetrics;

/// One finished request, ready to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestObservation {
    /// Lowercased HTTP method.
    pub method: String,
    /// Route template, or empty if the router did not resolve one.
    pub path: String,
    /// Final response status.
    pub code: u16,
    pub elapsed: Duration,
}

impl RequestObservation {
    /// Record into `metrics`: one counter increment, one duration sample.
    pub fn record(&self, metrics: &dyn RequestMetrics) {
        metrics
            .request_counter(&self.method, &self.path, &self.code.to_string())
            .inc();
        metrics
            .request_duration(&self.method, &self.path)
            .observe(self.elapsed.as_secs_f64());
    }
}

/// Route template for `request`, or `""` when none was matched.
pub fn route_template(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default()
}

/// Middleware function; attach with `axum::middleware::from_fn_with_state`.
pub async fn instrument(
    State(metrics): State<Arc<dyn RequestMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().as_str().to_lowercase();
    let path = route_template(&request);

    let response = next.run(request).await;

    let observation = RequestObservation {
        method,
        path,
        code: response.status().as_u16(),
        elapsed: start.elapsed(),
    };
    observation.record(metrics.as_ref());

    tracing::trace!(
        method = %observation.method,
        path = %observation.path,
        code = observation.code,
        elapsed = ?observation.elapsed,
        "Request recorded"
    );

    response
}
