//! HTTP integration.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, TraceLayer, TimeoutLayer)
//!     → middleware/insights.rs (RequestContext in, telemetry out)
//!     → handlers.rs (demo endpoints recording dependencies and failures)
//! ```

pub mod handlers;
pub mod middleware;
pub mod server;

pub use middleware::{insights_tracker, with_error, AttachedError, InsightsLayer};
pub use server::InsightsServer;
