//! Configuration schema for the `dual-listener` binary.
//!
//! All types derive Serde traits for deserialization from TOML. Every section
//! has defaults, so an empty file is a valid config.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http::DEFAULT_METRICS_PATH;
use crate::observability::metrics::{DEFAULT_BUCKETS, DEFAULT_NAME};
use crate::server::FailureMode;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub metrics: MetricsSettings,
    pub shutdown: ShutdownSettings,
    pub logging: LoggingSettings,
}

/// Application listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Value of the `handler` metric label.
    pub name: String,

    /// Interface both listeners bind on.
    pub bind_address: IpAddr,

    /// Application port (0 = ephemeral).
    pub port: u16,

    /// What an application listener failure does.
    pub failure_mode: FailureMode,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            failure_mode: FailureMode::Report,
        }
    }
}

/// Duration instrument strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Histogram with configurable buckets.
    #[default]
    Slo,
    /// Count/sum summary.
    Average,
}

/// Metrics listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Metrics port (0 = ephemeral).
    pub port: u16,

    /// Scrape path.
    pub path: String,

    pub strategy: Strategy,

    /// Histogram buckets in seconds. Ignored by the average strategy.
    pub buckets: Vec<f64>,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            port: 9090,
            path: DEFAULT_METRICS_PATH.to_string(),
            strategy: Strategy::Slo,
            buckets: DEFAULT_BUCKETS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownSettings {
    /// Drain deadline per listener.
    pub timeout_secs: u64,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl ShutdownSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
