//! Configuration validation.
//!
//! Semantic checks only; serde handles syntax. All errors are collected
//! rather than stopping at the first one.

use axum::http::HeaderName;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{ClientKind, InsightsConfig};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("telemetry.instrumentation_key must not be empty")]
    MissingInstrumentationKey,

    #[error("telemetry.transaction_header is not a valid header name: {0:?}")]
    InvalidHeader(String),

    #[error("{field} is not a socket address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroTimeout,

    #[error("telemetry.channel_capacity must be greater than zero")]
    ZeroChannelCapacity,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &InsightsConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.telemetry.instrumentation_key.trim().is_empty() {
        errors.push(ValidationError::MissingInstrumentationKey);
    }

    if HeaderName::try_from(config.telemetry.transaction_header.as_str()).is_err() {
        errors.push(ValidationError::InvalidHeader(
            config.telemetry.transaction_header.clone(),
        ));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if config.telemetry.client == ClientKind::Channel && config.telemetry.channel_capacity == 0 {
        errors.push(ValidationError::ZeroChannelCapacity);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
