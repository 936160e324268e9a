//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Application requests
//!     → instrument middleware
//!     → metrics.rs (RequestMetrics: counter + duration observer)
//!     → prometheus Registry
//!     → metrics listener scrape endpoint
//!
//! All subsystems
//!     → logging.rs (tracing events, fmt subscriber)
//! ```

pub mod logging;
pub mod metrics;
pub mod summary;

pub use metrics::{
    default_metrics, AverageMetrics, Observe, RequestMetrics, SloMetrics, DEFAULT_BUCKETS,
    REQUESTS_TOTAL, REQUEST_DURATION_SECONDS,
};
pub use summary::{Summary, SummaryVec};
