//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → InsightsConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_with_overrides, parse_config, ConfigError, ConfigOverrides};
pub use schema::{
    ClientKind, InsightsConfig, ListenerConfig, ObservabilityConfig, TelemetryConfig,
    TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
