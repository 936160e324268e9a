//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Application listener:
//!     request → TraceLayer → router (path + method match)
//!             → instrument middleware (matched routes only) → user handler
//!
//! Metrics listener:
//!     GET <metrics path> → scrape.rs (registry → text exposition format)
//! ```

pub mod handler;
pub mod middleware;
pub mod scrape;

pub use handler::{application_router, Handler, InvalidRoute};
pub use scrape::{metrics_router, DEFAULT_METRICS_PATH};
