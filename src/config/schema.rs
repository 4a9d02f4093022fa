//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::tracking::{MissingIdPolicy, TRANSACTION_ID_HEADER};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct InsightsConfig {
    /// Listener configuration for the demo server.
    pub listener: ListenerConfig,

    /// Request tracking settings.
    pub telemetry: TelemetryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Which telemetry client the demo server submits to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    /// Structured log events.
    #[default]
    Logging,
    /// In-memory buffer (tests and local experiments).
    Memory,
    /// Bounded channel drained by a transport task.
    Channel,
}

/// Request tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Tenant key every record is addressed to.
    pub instrumentation_key: String,

    /// Header carrying the caller's transaction id.
    pub transaction_header: String,

    /// Behavior when the header is missing.
    pub missing_transaction_id: MissingIdPolicy,

    /// Client the records are handed to.
    pub client: ClientKind,

    /// Undelivered records the channel client holds before dropping.
    pub channel_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            instrumentation_key: String::new(),
            transaction_header: TRANSACTION_ID_HEADER.to_string(),
            missing_transaction_id: MissingIdPolicy::Generate,
            client: ClientKind::Logging,
            channel_capacity: 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: InsightsConfig = toml::from_str(
            r#"
            [telemetry]
            instrumentation_key = "00000000-ikey"
            "#,
        )
        .unwrap();

        assert_eq!(config.telemetry.instrumentation_key, "00000000-ikey");
        assert_eq!(config.telemetry.transaction_header, "transactionId");
        assert_eq!(config.telemetry.missing_transaction_id, MissingIdPolicy::Generate);
        assert_eq!(config.telemetry.client, ClientKind::Logging);
        assert_eq!(config.telemetry.channel_capacity, 1024);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_policy_and_client_parse_lowercase() {
        let config: InsightsConfig = toml::from_str(
            r#"
            [telemetry]
            instrumentation_key = "k"
            missing_transaction_id = "empty"
            client = "channel"
            channel_capacity = 16
            "#,
        )
        .unwrap();

        assert_eq!(config.telemetry.missing_transaction_id, MissingIdPolicy::Empty);
        assert_eq!(config.telemetry.client, ClientKind::Channel);
        assert_eq!(config.telemetry.channel_capacity, 16);
    }
}
