//! HTTP server setup for the demo application.
//!
//! # Responsibilities
//! - Create the Axum Router with the demo handlers
//! - Wire up middleware (tracing, timeout, request tracking)
//! - Bind server to listener with graceful shutdown

use axum::{http::HeaderName, routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::InsightsConfig;
use crate::http::handlers;
use crate::http::middleware::{insights_tracker, InsightsLayer};
use crate::telemetry::TelemetryClient;
use crate::tracking::{Insights, TelemetryInsights};

/// Demo HTTP server with request tracking installed.
pub struct InsightsServer {
    router: Router,
    config: InsightsConfig,
}

impl InsightsServer {
    /// Create a server submitting telemetry to `client`.
    pub fn new(config: InsightsConfig, client: Arc<dyn TelemetryClient>) -> Self {
        let insights: Arc<dyn Insights> = Arc::new(
            TelemetryInsights::new(client)
                .with_missing_id_policy(config.telemetry.missing_transaction_id),
        );
        let router = Self::build_router(&config, insights);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &InsightsConfig, insights: Arc<dyn Insights>) -> Router {
        let mut tracker = insights_tracker(insights, config.telemetry.instrumentation_key.clone());
        match HeaderName::try_from(config.telemetry.transaction_header.as_str()) {
            Ok(header) => tracker = tracker.with_header(header),
            Err(e) => tracing::warn!(
                header = %config.telemetry.transaction_header,
                error = %e,
                "Invalid transaction header, using default"
            ),
        }

        let routes = Router::new()
            .route("/health", get(handlers::health))
            .route("/orders", get(handlers::list_orders))
            .route("/orders/{id}", get(handlers::get_order))
            .route("/fail", get(handlers::fail));

        with_middleware(
            routes,
            tracker,
            Duration::from_secs(config.timeouts.request_secs),
        )
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Run until `shutdown` resolves.
    pub async fn run_until<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            ikey = %self.config.telemetry.instrumentation_key,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &InsightsConfig {
        &self.config
    }
}

/// Wrap `routes` in timeout, tracking and trace layers.
///
/// The tracker sits outside the timeout so a timed-out request is reported
/// with its 408 status.
#[allow(deprecated)]
fn with_middleware(routes: Router, tracker: InsightsLayer, timeout: Duration) -> Router {
    routes
        .layer(TimeoutLayer::new(timeout))
        .layer(tracker)
        .layer(TraceLayer::new_for_http())
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    tracing::info!("Shutdown signal received");
}
