//! Route registrations for the application listener.
//!
//! # Responsibilities
//! - Hold path → handler → methods registrations
//! - Build the instrumented application router from them
//!
//! # Design Decisions
//! - No methods means GET only
//! - A method already claimed on a path by an earlier registration is skipped
//!   with a warning; the first registration wins
//! - Instrumentation wraps each method endpoint, so 404s and 405s never reach it

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use axum::{
    http::Method,
    middleware,
    routing::{on, MethodFilter, MethodRouter},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::http::middleware::instrument;
use crate::observability::metrics::RequestMetrics;

type RouteFactory = dyn Fn(MethodFilter) -> MethodRouter + Send + Sync;

/// An endpoint to register on the application listener.
#[derive(Clone)]
pub struct Handler {
    path: String,
    methods: Vec<Method>,
    route: Arc<RouteFactory>,
}

impl Handler {
    /// Register `handler` at `path` (axum syntax, e.g. `/bar/{type}`), GET only.
    pub fn new<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: axum::handler::Handler<T, ()>,
        T: 'static,
    {
        Self {
            path: path.into(),
            methods: Vec::new(),
            route: Arc::new(move |filter: MethodFilter| on(filter, handler.clone())),
        }
    }

    /// Replace the accepted methods. An empty list means GET.
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Accepted methods after applying the GET default.
    pub fn allowed_methods(&self) -> Vec<Method> {
        if self.methods.is_empty() {
            vec![Method::GET]
        } else {
            self.methods.clone()
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("path", &self.path)
            .field("methods", &self.allowed_methods())
            .finish()
    }
}

/// Why a registration was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid route {path:?}: {reason}")]
pub struct InvalidRoute {
    pub path: String,
    pub reason: &'static str,
}

/// How one path segment captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture<'a> {
    Literal(&'a str),
    Param(&'a str),
    CatchAll(&'a str),
}

fn invalid(path: &str, reason: &'static str) -> InvalidRoute {
    InvalidRoute {
        path: path.to_string(),
        reason,
    }
}

/// Split a path template into segments, refusing anything the router would panic on.
fn parse_template(path: &str) -> Result<Vec<Capture<'_>>, InvalidRoute> {
    let Some(rest) = path.strip_prefix('/') else {
        return Err(invalid(path, "path must start with '/'"));
    };

    let segments: Vec<&str> = rest.split('/').collect();
    let mut captures = Vec::with_capacity(segments.len());
    let mut names = HashSet::new();

    for (i, &segment) in segments.iter().enumerate() {
        let capture = match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(inner) => match inner.strip_prefix('*') {
                Some(name) => Capture::CatchAll(name),
                None => Capture::Param(inner),
            },
            None if segment.starts_with(':') || segment.starts_with('*') => {
                return Err(invalid(path, "captures use {name} or {*name} syntax"));
            }
            None if segment.contains(['{', '}']) => {
                return Err(invalid(path, "a capture must span a whole segment"));
            }
            None => Capture::Literal(segment),
        };

        match capture {
            Capture::Param(name) | Capture::CatchAll(name) => {
                if name.is_empty() || name.contains(['{', '}', '*']) {
                    return Err(invalid(path, "malformed capture name"));
                }
                if !names.insert(name) {
                    return Err(invalid(path, "duplicate capture name"));
                }
            }
            Capture::Literal(_) => {}
        }
        if matches!(capture, Capture::CatchAll(_)) && i + 1 != segments.len() {
            return Err(invalid(path, "a catch-all must be the last segment"));
        }
        captures.push(capture);
    }
    Ok(captures)
}

/// Check every registration, alone and against the others.
///
/// Everything axum would panic on at router build time is reported here
/// instead: malformed templates, methods with no [`MethodFilter`], and
/// captures at the same position that differ in name or kind.
pub fn validate(handlers: &[Handler]) -> Result<(), InvalidRoute> {
    // Normalized prefix → the capture that follows it.
    let mut slots: HashMap<String, Capture<'_>> = HashMap::new();

    for h in handlers {
        if h
            .allowed_methods()
            .into_iter()
            .any(|method| MethodFilter::try_from(method).is_err())
        {
            return Err(invalid(&h.path, "method cannot be routed"));
        }

        let mut prefix = String::new();
        for capture in parse_template(&h.path)? {
            match capture {
                Capture::Literal(segment) => {
                    prefix.push('/');
                    prefix.push_str(segment);
                }
                Capture::Param(_) | Capture::CatchAll(_) => {
                    let seen = *slots.entry(prefix.clone()).or_insert(capture);
                    if seen != capture {
                        return Err(invalid(
                            &h.path,
                            "conflicts with a differently named capture at the same position",
                        ));
                    }
                    prefix.push_str(match capture {
                        Capture::CatchAll(_) => "/{*}",
                        _ => "/{}",
                    });
                }
            }
        }
    }
    Ok(())
}

/// Build the application router: every registration, instrumented, traced.
///
/// Expects registrations that passed [`validate`]. Instrumentation wraps each
/// method endpoint, so 404 and 405 responses are never recorded.
pub fn application_router(handlers: &[Handler], metrics: Arc<dyn RequestMetrics>) -> Router {
    let mut claimed: HashMap<&str, HashSet<Method>> = HashMap::new();
    let mut router = Router::new();

    for h in handlers {
        let taken = claimed.entry(h.path.as_str()).or_default();
        let mut filter: Option<MethodFilter> = None;

        for method in h.allowed_methods() {
            if taken.contains(&method) {
                tracing::warn!(path = %h.path, method = %method, "Method already registered on path, skipping");
                continue;
            }
            if let Ok(f) = MethodFilter::try_from(method.clone()) {
                filter = Some(filter.map_or(f, |acc| acc.or(f)));
                taken.insert(method);
            }
        }

        if let Some(filter) = filter {
            tracing::debug!(path = %h.path, "Route registered");
            let route = (h.route)(filter)
                .route_layer(middleware::from_fn_with_state(metrics.clone(), instrument));
            router = router.route(&h.path, route);
        }
    }

    router.layer(TraceLayer::new_for_http())
}
