//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::InsightsConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<InsightsConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<InsightsConfig, ConfigError> {
    let config: InsightsConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Values that take precedence over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub instrumentation_key: Option<String>,
    pub bind_address: Option<String>,
}

/// Load the file at `path` (or defaults), apply `overrides`, then validate.
pub fn load_with_overrides(
    path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<InsightsConfig, ConfigError> {
    let mut config = match path {
        Some(path) => toml::from_str::<InsightsConfig>(&fs::read_to_string(path)?)?,
        None => InsightsConfig::default(),
    };

    if let Some(ikey) = overrides.instrumentation_key {
        config.telemetry.instrumentation_key = ikey;
    }
    if let Some(addr) = overrides.bind_address {
        config.listener.bind_address = addr;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
