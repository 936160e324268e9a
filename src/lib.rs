//! Dual-listener HTTP server harness.
//!
//! Runs an application listener serving user handlers and a metrics listener
//! serving a Prometheus scrape endpoint. Every application request is counted
//! and timed into `http_requests_total` / `http_requests_duration_seconds`.
//!
//! ```no_run
//! use std::time::Duration;
//! use dual_listener::{with_handlers, with_port, Handler, Server};
//!
//! # async fn demo() -> Result<(), dual_listener::ServerError> {
//! let server = std::sync::Arc::new(
//!     Server::new([
//!         with_port(8080),
//!         with_handlers([Handler::new("/health", || async { "ok" })]),
//!     ])
//!     .await?,
//! );
//! let running = tokio::spawn({
//!     let server = server.clone();
//!     async move { server.run().await }
//! });
//! println!("metrics on port {}", server.metrics_port());
//! server.shutdown(Duration::from_secs(30)).await;
//! let _errors = running.await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod server;

pub use error::{ListenerError, ListenerKind, ServerError};
pub use http::Handler;
pub use observability::metrics::{AverageMetrics, RequestMetrics, SloMetrics};
pub use server::{
    with_bind_address, with_failure_mode, with_handlers, with_metrics, with_metrics_path,
    with_metrics_port, with_name, with_port, with_registry, FailureMode, Phase, Server,
    ServerConfig, ServerOption,
};
