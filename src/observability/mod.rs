//! Observability for the tracking layer itself.
//!
//! # Data Flow
//! ```text
//! tracking / http / telemetry
//!     → logging.rs (tracing subscriber, structured events)
//!     → metrics.rs (request and submission counters)
//! ```
//!
//! Telemetry records are not logs: they go through `telemetry::TelemetryClient`.

pub mod logging;
pub mod metrics;
