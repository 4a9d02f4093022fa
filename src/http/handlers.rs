//! Demo handlers exercising the context API.

use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;

use crate::http::middleware::AttachedError;
use crate::tracking::RequestContext;

/// An order as returned by the demo endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: u64,
    pub item: String,
}

/// Simulated database round trip.
async fn query_orders(ids: std::ops::RangeInclusive<u64>) -> Vec<Order> {
    tokio::time::sleep(Duration::from_millis(5)).await;
    ids.map(|id| Order {
        id,
        item: format!("item-{}", id),
    })
    .collect()
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn list_orders(ctx: RequestContext) -> Json<Vec<Order>> {
    let dep = ctx.add_dependency("db", "sql", "orders-db");
    let orders = query_orders(1..=3).await;
    ctx.complete_dependency(&dep, true);

    ctx.info("Listed orders", &[("count", &orders.len())]);
    Json(orders)
}

pub async fn get_order(ctx: RequestContext, Path(id): Path<String>) -> Response {
    let id: u64 = match id.parse() {
        Ok(id) => id,
        Err(e) => {
            ctx.log_warning(&e);
            return (
                StatusCode::BAD_REQUEST,
                AttachedError::new("invalid order id"),
                "Invalid order id",
            )
                .into_response();
        }
    };

    let dep = ctx.add_dependency("db", "sql", "orders-db");
    let found = query_orders(id..=id).await.pop().filter(|o| o.id != 0);
    ctx.complete_dependency(&dep, true);
    ctx.debug("Looked up order", &[("order_id", &id)]);

    match found {
        Some(order) => Json(order).into_response(),
        None => {
            ctx.attach_error("order not found");
            (StatusCode::NOT_FOUND, "Order not found").into_response()
        }
    }
}

/// Always fails: a downstream call times out.
pub async fn fail(ctx: RequestContext) -> Response {
    let dep = ctx.add_dependency("billing", "http", "billing-service");
    ctx.complete_dependency(&dep, false);
    ctx.log_failure("billing call timed out");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        AttachedError::new("timeout"),
        "Upstream timeout",
    )
        .into_response()
}
