//! Configuration validation.
//!
//! # Design Decisions
//! - Serde handles syntax and ranges (ports are `u16`); this handles semantics
//! - Returns all validation errors, not just the first

use crate::config::schema::{Settings, Strategy};

/// A semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("metrics.path must start with '/', got {0:?}")]
    MetricsPath(String),
    #[error("metrics.buckets must not be empty")]
    EmptyBuckets,
    #[error("metrics.buckets must be strictly increasing")]
    UnsortedBuckets,
    #[error("shutdown.timeout_secs must be greater than 0")]
    ZeroTimeout,
    #[error("server.port and metrics.port are both {0}")]
    PortClash(u16),
}

/// Check `settings`, collecting every error.
pub fn validate_config(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !settings.metrics.path.starts_with('/') {
        errors.push(ValidationError::MetricsPath(settings.metrics.path.clone()));
    }

    if settings.metrics.strategy == Strategy::Slo {
        let buckets = &settings.metrics.buckets;
        if buckets.is_empty() {
            errors.push(ValidationError::EmptyBuckets);
        } else if buckets.windows(2).any(|w| w[0] >= w[1]) {
            errors.push(ValidationError::UnsortedBuckets);
        }
    }

    if settings.shutdown.timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if settings.server.port != 0 && settings.server.port == settings.metrics.port {
        errors.push(ValidationError::PortClash(settings.server.port));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&Settings::default()).is_ok());
    }

    #[test]
    fn reports_every_error() {
        let mut settings = Settings::default();
        settings.metrics.path = "metrics".into();
        settings.metrics.buckets = vec![1.0, 0.1];
        settings.shutdown.timeout_secs = 0;
        settings.server.port = 9000;
        settings.metrics.port = 9000;

        let errors = validate_config(&settings).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::MetricsPath("metrics".into()),
                ValidationError::UnsortedBuckets,
                ValidationError::ZeroTimeout,
                ValidationError::PortClash(9000),
            ]
        );
    }

    #[test]
    fn ephemeral_ports_never_clash() {
        let mut settings = Settings::default();
        settings.server.port = 0;
        settings.metrics.port = 0;
        assert!(validate_config(&settings).is_ok());
    }

    #[test]
    fn buckets_ignored_for_average() {
        let mut settings = Settings::default();
        settings.metrics.strategy = Strategy::Average;
        settings.metrics.buckets.clear();
        assert!(validate_config(&settings).is_ok());
    }
}
