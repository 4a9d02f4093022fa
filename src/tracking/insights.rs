//! Adapter between request contexts and a telemetry client.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::observability::metrics;
use crate::telemetry::types::{PROPERTY_ERROR, PROPERTY_QUERY};
use crate::telemetry::{
    Envelope, ExceptionTelemetry, RemoteDependencyTelemetry, Telemetry, TelemetryClient,
};
use crate::tracking::context::{RequestContext, RequestInfo};

#[cfg(test)]
use mockall::automock;

/// What to do when a request arrives without a transaction id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingIdPolicy {
    /// Generate a UUID v4.
    #[default]
    Generate,
    /// Leave the id empty.
    Empty,
}

/// Request tracking operations used by the middleware.
#[cfg_attr(test, automock)]
pub trait Insights: Send + Sync {
    /// Create the context for a request that is about to be handled.
    fn start_request(&self, info: RequestInfo, instrumentation_key: &str) -> RequestContext;

    /// Finalize a request that ended with a 2xx status and submit its telemetry.
    fn complete_successful_request(&self, ctx: &RequestContext, status_code: &str);

    /// Finalize a request that ended with any other status and submit its telemetry.
    fn complete_failed_request(&self, ctx: &RequestContext, status_code: &str, error: Option<String>);
}

/// `Insights` backed by a `TelemetryClient`.
///
/// Every completion submits the request trace, then each dependency, then
/// each exception, one `track` call per record. Completing the same context
/// twice submits everything twice.
#[derive(Clone)]
pub struct TelemetryInsights {
    client: Arc<dyn TelemetryClient>,
    missing_id: MissingIdPolicy,
}

impl TelemetryInsights {
    pub fn new(client: Arc<dyn TelemetryClient>) -> Self {
        Self {
            client,
            missing_id: MissingIdPolicy::default(),
        }
    }

    pub fn with_missing_id_policy(mut self, policy: MissingIdPolicy) -> Self {
        self.missing_id = policy;
        self
    }

    fn submit(&self, ikey: &str, item: Telemetry) {
        metrics::record_submission(item.kind());
        self.client.track(Envelope::new(ikey, item));
    }

    fn track_dependencies(&self, ikey: &str, parent_id: &str, dependencies: Vec<RemoteDependencyTelemetry>) {
        for mut dependency in dependencies {
            dependency.tags.operation_parent_id = Some(parent_id.to_string());
            self.submit(ikey, Telemetry::Dependency(dependency));
        }
    }

    fn track_exceptions(&self, ikey: &str, parent_id: &str, exceptions: Vec<ExceptionTelemetry>) {
        for mut exception in exceptions {
            exception.tags.operation_parent_id = Some(parent_id.to_string());
            self.submit(ikey, Telemetry::Exception(exception));
        }
    }

    fn complete(&self, ctx: &RequestContext, status_code: &str, success: bool, error: Option<String>) {
        let elapsed = ctx.start_time().elapsed();
        let (trace, dependencies, exceptions) = ctx.finalize(|trace| {
            trace.duration = elapsed;
            trace.success = success;
            trace.response_code = status_code.to_string();
            trace.tags.operation_id = Some(trace.id.clone());
            if !success {
                trace
                    .properties
                    .insert(PROPERTY_ERROR.to_string(), error.unwrap_or_default());
            }
        });

        tracing::debug!(
            transaction_id = %ctx.transaction_id(),
            status = %status_code,
            success,
            dependencies = dependencies.len(),
            exceptions = exceptions.len(),
            "Submitting request telemetry"
        );
        metrics::record_request(ctx.method(), status_code, elapsed);

        let ikey = ctx.instrumentation_key();
        let parent_id = trace.id.clone();
        self.submit(ikey, Telemetry::Request(trace));
        self.track_dependencies(ikey, &parent_id, dependencies);
        self.track_exceptions(ikey, &parent_id, exceptions);
    }
}

impl std::fmt::Debug for TelemetryInsights {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryInsights")
            .field("missing_id", &self.missing_id)
            .finish_non_exhaustive()
    }
}

impl Insights for TelemetryInsights {
    fn start_request(&self, mut info: RequestInfo, instrumentation_key: &str) -> RequestContext {
        if info.transaction_id.is_none() && self.missing_id == MissingIdPolicy::Generate {
            info.transaction_id = Some(Uuid::new_v4().to_string());
        }

        let ctx = RequestContext::new(info, instrumentation_key);
        let query = ctx.query().unwrap_or_default().to_string();
        let id = ctx.transaction_id().to_string();
        ctx.update_trace(|trace| {
            trace.properties.insert(PROPERTY_QUERY.to_string(), query);
            trace.timestamp = std::time::SystemTime::now();
            trace.id = id;
        });
        ctx
    }

    fn complete_successful_request(&self, ctx: &RequestContext, status_code: &str) {
        self.complete(ctx, status_code, true, None);
    }

    fn complete_failed_request(&self, ctx: &RequestContext, status_code: &str, error: Option<String>) {
        self.complete(ctx, status_code, false, error);
    }
}
