//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Listener::new(port)
//!     → bind()      (socket open, actual port published)
//!     → serve()     (axum accept loop)
//!     → shutdown()  (drain, bounded by deadline)
//!
//! Listener States:
//!     Unbound → Bound → Serving → Stopped
//! ```

pub mod listener;

pub use listener::Listener;
