//! HTTP middleware.

pub mod instrument;

pub use instrument::{instrument, RequestObservation};
