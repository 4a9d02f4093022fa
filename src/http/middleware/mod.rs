//! HTTP middleware.

pub mod insights;

pub use insights::{insights_tracker, with_error, AttachedError, InsightsLayer, InsightsService};
