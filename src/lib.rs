//! Request telemetry for axum services.
//!
//! Captures a request trace, the dependency calls made while handling it, and
//! any failures logged along the way, then hands each record to an injected
//! [`TelemetryClient`](telemetry::TelemetryClient).
//!
//! ```text
//! request ──▶ InsightsLayer ──▶ handler (RequestContext extractor)
//!                  │                 │ add_dependency / log_failure / attach_error
//!                  ▼                 ▼
//!            Insights::complete_* ──▶ TelemetryClient::track (one call per record)
//! ```

pub mod config;
pub mod http;
pub mod observability;
pub mod telemetry;
pub mod tracking;

pub use config::InsightsConfig;
pub use http::{insights_tracker, AttachedError, InsightsLayer, InsightsServer};
pub use telemetry::{Envelope, MemoryClient, TelemetryClient};
pub use tracking::{DependencyHandle, Insights, RequestContext, RequestInfo, TelemetryInsights};
