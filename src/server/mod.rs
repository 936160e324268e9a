//! Dual-listener server.
//!
//! # Data Flow
//! ```text
//! [ServerOption] → ServerConfig → Server::new
//!     → validate routes
//!     → bind application listener (skipped when no handlers)
//!     → bind metrics listener
//!     → resolve and register request instruments
//!     → Server (Bound; both ports queryable)
//!
//! run():      one task per listener, errors collected per listener
//! shutdown(): both listeners drained concurrently, each with its own deadline
//! ```
//!
//! # Design Decisions
//! - Fail fast: if either bind fails, no server is returned and no
//!   instruments are registered
//! - A failure in one listener never stops the other
//! - Single-use: a stopped server cannot be run again

pub mod options;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use parking_lot::Mutex;
use prometheus::Registry;

use crate::error::{ListenerError, ListenerKind, ServerError};
use crate::http::{application_router, handler, metrics_router};
use crate::net::Listener;
use crate::observability::metrics::{default_metrics, RequestMetrics, SloMetrics, DEFAULT_NAME};

pub use options::{
    with_bind_address, with_failure_mode, with_handlers, with_metrics, with_metrics_path,
    with_metrics_port, with_name, with_port, with_registry, FailureMode, ServerConfig,
    ServerOption,
};

/// Lifecycle phase of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Listeners bound, not yet serving.
    Bound,
    Running,
    Draining,
    Stopped,
}

/// A listener together with the router it serves.
struct Endpoint {
    listener: Arc<Listener>,
    router: Router,
}

/// Runs an application listener and a metrics listener side by side.
pub struct Server {
    application: Option<Endpoint>,
    metrics: Endpoint,
    failure_mode: FailureMode,
    phase: Mutex<Phase>,
}

impl Server {
    /// Apply `options` in order, then bind both listeners.
    pub async fn new(options: impl IntoIterator<Item = ServerOption>) -> Result<Self, ServerError> {
        Self::from_config(ServerConfig::from_options(options)).await
    }

    /// Bind both listeners for an already-merged config.
    pub async fn from_config(config: ServerConfig) -> Result<Self, ServerError> {
        let registry = config
            .registry
            .clone()
            .unwrap_or_else(|| prometheus::default_registry().clone());

        if !config.handlers.is_empty() {
            handler::validate(&config.handlers)?;
        }

        let application = if config.handlers.is_empty() {
            tracing::info!("No application handlers registered, running metrics listener only");
            None
        } else {
            let listener = Listener::with_ip(
                ListenerKind::Application.as_str(),
                config.bind_address,
                config.port,
            );
            listener
                .bind()
                .await
                .map_err(|e| ServerError::listener(ListenerKind::Application, e))?;
            Some(listener)
        };

        // An application listener bound above is closed on drop if this fails.
        let metrics_listener = Listener::with_ip(
            ListenerKind::Metrics.as_str(),
            config.bind_address,
            config.metrics_port,
        );
        metrics_listener
            .bind()
            .await
            .map_err(|e| ServerError::listener(ListenerKind::Metrics, e))?;

        // Instruments are registered only once both listeners are bound.
        let application = match application {
            Some(listener) => Some(Endpoint {
                listener: Arc::new(listener),
                router: application_router(&config.handlers, resolve_metrics(&config, &registry)?),
            }),
            None => None,
        };
        let metrics = Endpoint {
            listener: Arc::new(metrics_listener),
            router: metrics_router(&config.metrics_path, registry),
        };

        tracing::info!(
            port = application.as_ref().map(|e| e.listener.port()).unwrap_or(0),
            metrics_port = metrics.listener.port(),
            metrics_path = %config.metrics_path,
            "Server bound"
        );

        Ok(Self {
            application,
            metrics,
            failure_mode: config.failure_mode,
            phase: Mutex::new(Phase::Bound),
        })
    }

    /// Serve both listeners until [`Server::shutdown`].
    ///
    /// Returns every listener failure; empty means both stopped cleanly.
    pub async fn run(&self) -> Vec<ServerError> {
        {
            let mut phase = self.phase.lock();
            if *phase != Phase::Bound {
                tracing::warn!(phase = ?*phase, "Server already started, ignoring run");
                return Vec::new();
            }
            *phase = Phase::Running;
        }

        let application = self.application.as_ref().map(|endpoint| {
            let listener = endpoint.listener.clone();
            let router = endpoint.router.clone();
            let failure_mode = self.failure_mode;
            tokio::spawn(async move {
                let result = listener.serve(router).await;
                if let (Err(e), FailureMode::Fatal) = (&result, failure_mode) {
                    tracing::error!(error = %e, "Application listener failed, exiting");
                    std::process::exit(1);
                }
                result
            })
        });

        let metrics = {
            let listener = self.metrics.listener.clone();
            let router = self.metrics.router.clone();
            tokio::spawn(async move { listener.serve(router).await })
        };

        let mut errors = Vec::new();
        if let Some(task) = application {
            if let Err(e) = flatten(task.await) {
                errors.push(ServerError::listener(ListenerKind::Application, e));
            }
        }
        if let Err(e) = flatten(metrics.await) {
            errors.push(ServerError::listener(ListenerKind::Metrics, e));
        }

        {
            let mut phase = self.phase.lock();
            if *phase == Phase::Running {
                *phase = Phase::Stopped;
            }
        }
        errors
    }

    /// Drain both listeners concurrently, each bounded by `timeout`.
    ///
    /// Safe to call on a server that never ran.
    pub async fn shutdown(&self, timeout: Duration) -> Vec<ServerError> {
        {
            let mut phase = self.phase.lock();
            if *phase == Phase::Stopped {
                return Vec::new();
            }
            *phase = Phase::Draining;
        }

        let application = async {
            match &self.application {
                Some(endpoint) => endpoint.listener.shutdown(timeout).await,
                None => Ok(()),
            }
        };
        let (application, metrics) =
            tokio::join!(application, self.metrics.listener.shutdown(timeout));

        let mut errors = Vec::new();
        if let Err(e) = application {
            errors.push(ServerError::listener(ListenerKind::Application, e));
        }
        if let Err(e) = metrics {
            errors.push(ServerError::listener(ListenerKind::Metrics, e));
        }

        *self.phase.lock() = Phase::Stopped;
        errors
    }

    /// Application listener port; 0 when there are no handlers.
    pub fn port(&self) -> u16 {
        self.application
            .as_ref()
            .map(|endpoint| endpoint.listener.port())
            .unwrap_or(0)
    }

    /// Metrics listener port.
    pub fn metrics_port(&self) -> u16 {
        self.metrics.listener.port()
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    /// The instrumented application router, for driving requests in-process.
    pub fn application_router(&self) -> Option<Router> {
        self.application.as_ref().map(|endpoint| endpoint.router.clone())
    }
}

/// Pick the instrument set: explicit, process default, or fresh per registry.
fn resolve_metrics(
    config: &ServerConfig,
    registry: &Registry,
) -> Result<Arc<dyn RequestMetrics>, ServerError> {
    if let Some(metrics) = &config.metrics {
        return Ok(metrics.clone());
    }
    if config.registry.is_none() && config.name == DEFAULT_NAME {
        return Ok(default_metrics()?);
    }
    Ok(Arc::new(SloMetrics::new(&config.name, registry)?))
}

fn flatten(
    joined: Result<Result<(), ListenerError>, tokio::task::JoinError>,
) -> Result<(), ListenerError> {
    joined.map_err(|e| ListenerError::Task(e.to_string()))?
}
