//! Tests against a real listening demo server.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use request_insights::config::InsightsConfig;
use request_insights::telemetry::{MemoryClient, TelemetryClient};
use request_insights::InsightsServer;

async fn start_server() -> (String, Arc<MemoryClient>, oneshot::Sender<()>) {
    let mut config = InsightsConfig::default();
    config.telemetry.instrumentation_key = "server-ikey".into();

    let client = Arc::new(MemoryClient::new());
    let sink: Arc<dyn TelemetryClient> = client.clone();
    let server = InsightsServer::new(config, sink);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let _ = server
            .run_until(listener, async {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{}", addr), client, tx)
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_orders_endpoint_is_tracked() {
    let (base, client, shutdown) = start_server().await;

    let res = http_client()
        .get(format!("{}/orders", base))
        .header("transactionId", "abc123")
        .send()
        .await
        .expect("server unreachable");

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers().get("transactionId").unwrap(), "abc123");
    let orders: serde_json::Value = res.json().await.unwrap();
    assert_eq!(orders.as_array().map(Vec::len), Some(3));

    let trace = &client.requests()[0];
    assert_eq!(trace.id, "abc123");
    assert!(trace.success);
    assert_eq!(client.dependencies().len(), 1);
    assert!(client
        .envelopes()
        .iter()
        .all(|e| e.instrumentation_key == "server-ikey"));

    let _ = shutdown.send(());
}

#[tokio::test]
async fn test_failing_endpoint_reports_error() {
    let (base, client, shutdown) = start_server().await;

    let res = http_client()
        .get(format!("{}/fail", base))
        .header("transactionId", "fail-1")
        .send()
        .await
        .expect("server unreachable");
    assert_eq!(res.status(), 500);

    let trace = &client.requests()[0];
    assert!(!trace.success);
    assert_eq!(trace.response_code, "500");
    assert_eq!(trace.properties.get("error").map(String::as_str), Some("timeout"));

    let deps = client.dependencies();
    assert_eq!(deps.len(), 1);
    assert!(!deps[0].success);
    assert_eq!(client.exceptions().len(), 1);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn test_invalid_order_id_is_a_warning() {
    let (base, client, shutdown) = start_server().await;

    let res = http_client()
        .get(format!("{}/orders/abc", base))
        .send()
        .await
        .expect("server unreachable");
    assert_eq!(res.status(), 400);

    let trace = &client.requests()[0];
    assert_eq!(trace.response_code, "400");
    assert_eq!(
        trace.properties.get("error").map(String::as_str),
        Some("invalid order id")
    );
    let exceptions = client.exceptions();
    assert_eq!(exceptions.len(), 1);
    assert_eq!(
        exceptions[0].severity,
        request_insights::telemetry::SeverityLevel::Warning
    );

    let _ = shutdown.send(());
}
