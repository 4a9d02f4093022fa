//! Request tracking subsystem.
//!
//! # Data Flow
//! ```text
//! http::middleware (request enters)
//!     → insights.rs (start_request: resolve transaction id, stamp trace)
//!     → context.rs (RequestContext in request extensions)
//!     → handler records dependencies / exceptions / errors
//!     → insights.rs (complete_*: finalize trace, tag children, submit)
//!     → telemetry::TelemetryClient
//! ```

pub mod context;
pub mod insights;

pub use context::{
    transaction_id_header, DependencyHandle, RequestContext, RequestInfo,
    TRANSACTION_ID_HEADER,
};
pub use insights::{Insights, MissingIdPolicy, TelemetryInsights};
