//! Request metrics instrument sets.
//!
//! # Metrics
//! - `http_requests_total` (counter): labels `method`, `path`, `code`
//! - `http_requests_duration_seconds` (histogram or summary): labels `method`, `path`
//!
//! Both carry a constant `handler` label naming the server, so several servers
//! can report into one registry.
//!
//! # Design Decisions
//! - Two interchangeable strategies behind [`RequestMetrics`]: [`SloMetrics`]
//!   (histogram, for quantile/SLO queries) and [`AverageMetrics`] (count/sum
//!   summary, for mean latency only)
//! - Instruments register with a registry exactly once, at construction;
//!   a name clash is a construction error
//! - Labels are route templates, never raw paths

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use prometheus::core::Collector;
use prometheus::{Counter, CounterVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry};

use crate::observability::summary::{Summary, SummaryVec};

/// Name of the request counter.
pub const REQUESTS_TOTAL: &str = "http_requests_total";
/// Name of the request duration instrument.
pub const REQUEST_DURATION_SECONDS: &str = "http_requests_duration_seconds";
/// Default histogram buckets, in seconds.
pub const DEFAULT_BUCKETS: [f64; 5] = [0.001, 0.01, 0.1, 1.0, 10.0];
/// `handler` label used when no name is configured.
pub const DEFAULT_NAME: &str = "default";

const REQUEST_LABELS: [&str; 3] = ["method", "path", "code"];
const DURATION_LABELS: [&str; 2] = ["method", "path"];

/// Something that records a duration in seconds.
pub trait Observe: Send {
    fn observe(&self, seconds: f64);
}

impl Observe for Histogram {
    fn observe(&self, seconds: f64) {
        Histogram::observe(self, seconds)
    }
}

impl Observe for Summary {
    fn observe(&self, seconds: f64) {
        Summary::observe(self, seconds)
    }
}

/// Instrument lookup used by the request middleware.
///
/// Implementations must be safe to call from many request tasks at once.
pub trait RequestMetrics: Send + Sync {
    /// Counter for one `(method, path, code)` combination.
    fn request_counter(&self, method: &str, path: &str, code: &str) -> Counter;

    /// Duration observer for one `(method, path)` combination.
    fn request_duration(&self, method: &str, path: &str) -> Box<dyn Observe>;
}

fn request_counter_vec(name: &str) -> Result<CounterVec, prometheus::Error> {
    CounterVec::new(
        Opts::new(REQUESTS_TOTAL, "Total number of http requests").const_label("handler", name),
        &REQUEST_LABELS,
    )
}

/// Register both collectors, leaving the registry untouched if either fails.
fn register_pair<A, B>(registry: &Registry, a: &A, b: &B) -> Result<(), prometheus::Error>
where
    A: Collector + Clone + 'static,
    B: Collector + Clone + 'static,
{
    registry.register(Box::new(a.clone()))?;
    if let Err(e) = registry.register(Box::new(b.clone())) {
        let _ = registry.unregister(Box::new(a.clone()));
        return Err(e);
    }
    Ok(())
}

/// Histogram-backed instrument set.
#[derive(Clone)]
pub struct SloMetrics {
    requests: CounterVec,
    duration: HistogramVec,
}

impl SloMetrics {
    /// Create with [`DEFAULT_BUCKETS`] and register with `registry`.
    pub fn new(name: &str, registry: &Registry) -> Result<Self, prometheus::Error> {
        Self::with_buckets(name, DEFAULT_BUCKETS.to_vec(), registry)
    }

    /// Create with custom bucket boundaries (seconds) and register with `registry`.
    pub fn with_buckets(
        name: &str,
        buckets: Vec<f64>,
        registry: &Registry,
    ) -> Result<Self, prometheus::Error> {
        let requests = request_counter_vec(name)?;
        let duration = HistogramVec::new(
            HistogramOpts::new(REQUEST_DURATION_SECONDS, "Request duration in seconds")
                .const_label("handler", name)
                .buckets(buckets),
            &DURATION_LABELS,
        )?;
        register_pair(registry, &requests, &duration)?;

        tracing::debug!(handler = name, strategy = "slo", "Request metrics registered");
        Ok(Self { requests, duration })
    }
}

impl RequestMetrics for SloMetrics {
    fn request_counter(&self, method: &str, path: &str, code: &str) -> Counter {
        self.requests.with_label_values(&[method, path, code])
    }

    fn request_duration(&self, method: &str, path: &str) -> Box<dyn Observe> {
        Box::new(self.duration.with_label_values(&[method, path]))
    }
}

/// Summary-backed instrument set. Tracks count and sum only.
#[derive(Clone)]
pub struct AverageMetrics {
    requests: CounterVec,
    duration: SummaryVec,
}

impl AverageMetrics {
    /// Create and register with `registry`.
    pub fn new(name: &str, registry: &Registry) -> Result<Self, prometheus::Error> {
        let requests = request_counter_vec(name)?;
        let duration = SummaryVec::new(
            REQUEST_DURATION_SECONDS,
            "Request duration in seconds",
            &DURATION_LABELS,
            HashMap::from([("handler".to_string(), name.to_string())]),
        )?;
        register_pair(registry, &requests, &duration)?;

        tracing::debug!(handler = name, strategy = "average", "Request metrics registered");
        Ok(Self { requests, duration })
    }
}

impl RequestMetrics for AverageMetrics {
    fn request_counter(&self, method: &str, path: &str, code: &str) -> Counter {
        self.requests.with_label_values(&[method, path, code])
    }

    fn request_duration(&self, method: &str, path: &str) -> Box<dyn Observe> {
        Box::new(self.duration.with_label_values(&[method, path]))
    }
}

static DEFAULT_METRICS: OnceCell<SloMetrics> = OnceCell::new();

/// The process-wide default instrument set: an [`SloMetrics`] named
/// `"default"` registered with [`prometheus::default_registry`].
///
/// Created and registered on first use; every later call returns the same set.
pub fn default_metrics() -> Result<Arc<dyn RequestMetrics>, prometheus::Error> {
    let metrics = DEFAULT_METRICS
        .get_or_try_init(|| SloMetrics::new(DEFAULT_NAME, prometheus::default_registry()))?;
    Ok(Arc::new(metrics.clone()))
}
