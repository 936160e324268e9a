//! Error taxonomy for listeners and the server coordinator.
//!
//! Construction-time failures abort immediately. Runtime failures of the two
//! listeners are collected independently and tagged with the listener that
//! produced them.

use std::fmt;
use std::time::Duration;

use crate::http::InvalidRoute;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to the requested port.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    /// The accept loop stopped for a reason other than shutdown.
    #[error("accept loop failed: {0}")]
    Accept(#[source] std::io::Error),
    /// Graceful drain did not finish before the deadline.
    #[error("graceful shutdown did not complete within {timeout:?}")]
    DrainTimeout { timeout: Duration },
    /// The serve task panicked or was cancelled.
    #[error("serve task failed: {0}")]
    Task(String),
}

impl ListenerError {
    /// True if this error is a drain deadline being exceeded.
    pub fn is_drain_timeout(&self) -> bool {
        matches!(self, ListenerError::DrainTimeout { .. })
    }
}

/// Which of the coordinator's two listeners an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Application,
    Metrics,
}

impl ListenerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerKind::Application => "application",
            ListenerKind::Metrics => "metrics",
        }
    }
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for the server coordinator.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("{listener} listener: {source}")]
    Listener {
        listener: ListenerKind,
        #[source]
        source: ListenerError,
    },
    /// Instrument creation or registration failed.
    #[error("metrics: {0}")]
    Metrics(#[from] prometheus::Error),
    /// A route registration was refused.
    #[error(transparent)]
    Route(#[from] InvalidRoute),
}

impl ServerError {
    pub(crate) fn listener(listener: ListenerKind, source: ListenerError) -> Self {
        ServerError::Listener { listener, source }
    }

    /// The listener this error belongs to, if any.
    pub fn listener_kind(&self) -> Option<ListenerKind> {
        match self {
            ServerError::Listener { listener, .. } => Some(*listener),
            ServerError::Metrics(_) | ServerError::Route(_) => None,
        }
    }

    /// True if this error is a drain deadline being exceeded.
    pub fn is_drain_timeout(&self) -> bool {
        match self {
            ServerError::Listener { source, .. } => source.is_drain_timeout(),
            ServerError::Metrics(_) | ServerError::Route(_) => false,
        }
    }
}
