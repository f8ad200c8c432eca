//! Settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (widths, rounds, connection limits)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: Settings → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::Settings;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.logfile must not be empty")]
    EmptyLogFile,

    #[error("server.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("server.max_connections must be greater than zero")]
    ZeroConnections,

    #[error("logging.poll_interval_ms must be greater than zero")]
    ZeroPollInterval,

    #[error("selftest width range {min}..={max} is empty or below 1")]
    WidthRange { min: i32, max: i32 },

    #[error("selftest.rng_samples_per_bin must be greater than zero")]
    ZeroSamples,

    #[error("security.password_hash_rounds must be greater than zero")]
    ZeroHashRounds,
}

pub fn validate_settings(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.server.logfile.trim().is_empty() {
        errors.push(ValidationError::EmptyLogFile);
    }
    if settings.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(settings.server.bind_address.clone()));
    }
    if settings.server.max_connections == 0 {
        errors.push(ValidationError::ZeroConnections);
    }
    if settings.logging.poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }

    let selftest = &settings.selftest;
    if selftest.rng_min_width < 1 || selftest.rng_min_width > selftest.rng_max_width {
        errors.push(ValidationError::WidthRange {
            min: selftest.rng_min_width,
            max: selftest.rng_max_width,
        });
    }
    if selftest.rng_samples_per_bin == 0 {
        errors.push(ValidationError::ZeroSamples);
    }
    if settings.security.password_hash_rounds == 0 {
        errors.push(ValidationError::ZeroHashRounds);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
