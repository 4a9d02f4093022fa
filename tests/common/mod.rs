//! Shared utilities for integration tests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use std::sync::Arc;

use request_insights::{insights_tracker, AttachedError, MemoryClient, RequestContext, TelemetryInsights};

pub const IKEY: &str = "test-ikey";

/// App with request tracking that submits into the returned memory client.
pub fn tracked_app() -> (Router, Arc<MemoryClient>) {
    let client = Arc::new(MemoryClient::new());
    let insights = Arc::new(TelemetryInsights::new(client.clone()));

    let app = Router::new()
        .route(
            "/orders",
            get(|ctx: RequestContext| async move {
                let dep = ctx.add_dependency("db", "sql", "orders-db");
                ctx.complete_dependency(&dep, true);
                "[]"
            }),
        )
        .route(
            "/fail",
            get(|ctx: RequestContext| async move {
                ctx.log_failure("upstream timed out");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    AttachedError::new("timeout"),
                    "failed",
                )
            }),
        )
        .layer(insights_tracker(insights, IKEY));

    (app, client)
}

pub fn request(uri: &str, transaction_id: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(tid) = transaction_id {
        builder = builder.header("transactionId", tid);
    }
    builder.body(Body::empty()).unwrap()
}
