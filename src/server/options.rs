//! Server configuration options.
//!
//! Options are applied in order, each one a pure merge step into a
//! [`ServerConfig`]. Scalar fields are last-write-wins; handler lists
//! accumulate. The resulting config is consumed once by `Server::new`.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use prometheus::Registry;
use serde::{Deserialize, Serialize};

use crate::http::{Handler, DEFAULT_METRICS_PATH};
use crate::observability::metrics::{RequestMetrics, DEFAULT_NAME};

/// What a runtime failure of the application listener does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Return it from `Server::run` like any other listener error.
    #[default]
    Report,
    /// Log it and exit the process with status 1.
    Fatal,
}

/// One configuration step.
#[derive(Clone)]
pub enum ServerOption {
    Port(u16),
    MetricsPort(u16),
    MetricsPath(String),
    Handlers(Vec<Handler>),
    Metrics(Arc<dyn RequestMetrics>),
    Name(String),
    Registry(Registry),
    BindAddress(IpAddr),
    FailureMode(FailureMode),
}

impl fmt::Debug for ServerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerOption::Port(p) => f.debug_tuple("Port").field(p).finish(),
            ServerOption::MetricsPort(p) => f.debug_tuple("MetricsPort").field(p).finish(),
            ServerOption::MetricsPath(p) => f.debug_tuple("MetricsPath").field(p).finish(),
            ServerOption::Handlers(h) => f.debug_tuple("Handlers").field(h).finish(),
            ServerOption::Metrics(_) => f.write_str("Metrics(..)"),
            ServerOption::Name(n) => f.debug_tuple("Name").field(n).finish(),
            ServerOption::Registry(_) => f.write_str("Registry(..)"),
            ServerOption::BindAddress(a) => f.debug_tuple("BindAddress").field(a).finish(),
            ServerOption::FailureMode(m) => f.debug_tuple("FailureMode").field(m).finish(),
        }
    }
}

/// Application listener port. Default 0 (ephemeral).
pub fn with_port(port: u16) -> ServerOption {
    ServerOption::Port(port)
}

/// Metrics listener port. Default 0 (ephemeral).
pub fn with_metrics_port(port: u16) -> ServerOption {
    ServerOption::MetricsPort(port)
}

/// Scrape endpoint path. Empty means `/metrics`.
pub fn with_metrics_path(path: impl Into<String>) -> ServerOption {
    ServerOption::MetricsPath(path.into())
}

/// Add application handlers.
pub fn with_handlers(handlers: impl IntoIterator<Item = Handler>) -> ServerOption {
    ServerOption::Handlers(handlers.into_iter().collect())
}

/// Use a caller-built instrument set instead of the default one. The caller
/// is responsible for having registered it.
pub fn with_metrics(metrics: Arc<dyn RequestMetrics>) -> ServerOption {
    ServerOption::Metrics(metrics)
}

/// `handler` label for the auto-created instrument set.
pub fn with_name(name: impl Into<String>) -> ServerOption {
    ServerOption::Name(name.into())
}

/// Registry scraped by the metrics listener and used for the auto-created
/// instrument set. Default: the process-global registry.
pub fn with_registry(registry: Registry) -> ServerOption {
    ServerOption::Registry(registry)
}

/// Interface both listeners bind on. Default `0.0.0.0`.
pub fn with_bind_address(address: IpAddr) -> ServerOption {
    ServerOption::BindAddress(address)
}

pub fn with_failure_mode(mode: FailureMode) -> ServerOption {
    ServerOption::FailureMode(mode)
}

/// The merged result of all options.
#[derive(Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub metrics_path: String,
    pub handlers: Vec<Handler>,
    pub metrics: Option<Arc<dyn RequestMetrics>>,
    pub name: String,
    pub registry: Option<Registry>,
    pub bind_address: IpAddr,
    pub failure_mode: FailureMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            metrics_port: 0,
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            handlers: Vec::new(),
            metrics: None,
            name: DEFAULT_NAME.to_string(),
            registry: None,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            failure_mode: FailureMode::Report,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("metrics_port", &self.metrics_port)
            .field("metrics_path", &self.metrics_path)
            .field("handlers", &self.handlers)
            .field("custom_metrics", &self.metrics.is_some())
            .field("name", &self.name)
            .field("custom_registry", &self.registry.is_some())
            .field("bind_address", &self.bind_address)
            .field("failure_mode", &self.failure_mode)
            .finish()
    }
}

impl ServerConfig {
    /// Fold `options` over the defaults, in order.
    pub fn from_options(options: impl IntoIterator<Item = ServerOption>) -> Self {
        options.into_iter().fold(Self::default(), Self::apply)
    }

    /// Merge one option.
    pub fn apply(mut self, option: ServerOption) -> Self {
        match option {
            ServerOption::Port(port) => self.port = port,
            ServerOption::MetricsPort(port) => self.metrics_port = port,
            ServerOption::MetricsPath(path) => {
                self.metrics_path = if path.is_empty() {
                    DEFAULT_METRICS_PATH.to_string()
                } else {
                    path
                };
            }
            ServerOption::Handlers(handlers) => self.handlers.extend(handlers),
            ServerOption::Metrics(metrics) => self.metrics = Some(metrics),
            ServerOption::Name(name) => self.name = name,
            ServerOption::Registry(registry) => self.registry = Some(registry),
            ServerOption::BindAddress(address) => self.bind_address = address,
            ServerOption::FailureMode(mode) => self.failure_mode = mode,
        }
        self
    }
}
