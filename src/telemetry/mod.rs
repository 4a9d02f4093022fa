//! Telemetry data model and client seam.
//!
//! # Data Flow
//! ```text
//! tracking::insights (finalized RequestContext)
//!     → types.rs (RequestTelemetry / RemoteDependencyTelemetry / ExceptionTelemetry)
//!     → Envelope { instrumentation_key, item }
//!     → client.rs (TelemetryClient::track, one call per record)
//!     → external transport (batching, retry, ingestion)
//! ```
//!
//! # Design Decisions
//! - `track` is infallible: telemetry never fails the request path
//! - The client is injected as `Arc<dyn TelemetryClient>`, never a global

pub mod client;
pub mod types;

pub use client::{ChannelClient, LoggingClient, MemoryClient, TelemetryClient};
pub use types::{
    Envelope, ExceptionTelemetry, RemoteDependencyTelemetry, RequestTelemetry, SeverityLevel,
    Telemetry, TelemetryTags,
};
