//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger → serve loop stops accepting → in-flight requests drain → serve returns
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary calls Server::shutdown(timeout)
//! ```
//!
//! # Design Decisions
//! - Shutdown has a deadline per listener; a timed-out drain is reported, not retried

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
