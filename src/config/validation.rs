//! Configuration validation.
//!
//! Semantic checks on top of what serde already enforces. Every problem is
//! reported, not just the first.

use std::net::SocketAddr;

use crate::config::schema::GatekeeperConfig;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    InvalidBindAddress(String),

    #[error("limiter.rps must be a positive finite number, got {0}")]
    InvalidRate(f64),

    #[error("limiter.burst must be at least 1")]
    ZeroBurst,

    #[error("cors.trusted_origins contains an empty origin")]
    EmptyOrigin,

    #[error("auth.lookup_timeout_ms must be greater than zero")]
    ZeroLookupTimeout,

    #[error("observability.metrics_address `{0}` is not a socket address")]
    InvalidMetricsAddress(String),
}

pub fn validate_config(config: &GatekeeperConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.limiter.enabled {
        let rps = config.limiter.rps;
        if !rps.is_finite() || rps <= 0.0 {
            errors.push(ValidationError::InvalidRate(rps));
        }
        if config.limiter.burst == 0 {
            errors.push(ValidationError::ZeroBurst);
        }
    }

    if config.cors.trusted_origins.iter().any(|o| o.trim().is_empty()) {
        errors.push(ValidationError::EmptyOrigin);
    }

    if config.auth.lookup_timeout_ms == 0 {
        errors.push(ValidationError::ZeroLookupTimeout);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
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
        assert_eq!(validate_config(&GatekeeperConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_problem() {
        let mut config = GatekeeperConfig::default();
        config.listener.bind_address = "not an address".into();
        config.limiter.rps = -1.0;
        config.limiter.burst = 0;
        config.cors.trusted_origins = vec!["https://ok.example.com".into(), " ".into()];
        config.auth.lookup_timeout_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidBindAddress("not an address".into()),
                ValidationError::InvalidRate(-1.0),
                ValidationError::ZeroBurst,
                ValidationError::EmptyOrigin,
                ValidationError::ZeroLookupTimeout,
            ]
        );
    }

    #[test]
    fn disabled_limiter_skips_rate_checks() {
        let mut config = GatekeeperConfig::default();
        config.limiter.enabled = false;
        config.limiter.rps = 0.0;
        config.limiter.burst = 0;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = GatekeeperConfig::default();
        config.observability.metrics_address = "nope".into();
        assert_eq!(validate_config(&config), Ok(()));

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidMetricsAddress("nope".into())])
        );
    }
}
