use std::net::SocketAddr;
use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::Histogram;
use prometheus::HistogramOpts;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::Error;
use crate::Result;


lazy_static! {
    pub static ref NODE_NOTIFICATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("node_notifications_total", "Node change notifications received"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref DUPLICATE_NOTIFICATIONS: IntCounter = IntCounter::new(
        "node_duplicate_notifications_total",
        "Notifications dropped because the version token was unchanged"
    )
    .expect("metric can not be created");

    pub static ref WATCH_ERRORS: IntCounter = IntCounter::new(
        "node_watch_errors_total",
        "Errors reported by the node watch before reconnecting"
    )
    .expect("metric can not be created");

    pub static ref RECONCILE_OUTCOMES: IntCounterVec = IntCounterVec::new(
        Opts::new("node_reconcile_outcomes_total", "Per-node reconcile results"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRATION_CALLS: IntCounterVec = IntCounterVec::new(
        Opts::new("node_registration_calls_total", "External registration calls by result"),
        &["result"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRATION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "node_registration_duration_seconds",
            "Latency of external registration calls"
        )
        .buckets(exponential_buckets(0.005, 2.0, 14).expect("valid buckets"))
    )
    .expect("metric can not be created");

    pub static ref PERSIST_CALLS: IntCounterVec = IntCounterVec::new(
        Opts::new("node_persist_calls_total", "Registration marker writes by result"),
        &["result"]
    )
    .expect("metric can not be created");

    pub static ref IN_FLIGHT_RECONCILES: IntGauge = IntGauge::new(
        "node_reconciles_in_flight",
        "Reconciles currently holding a worker permit"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

fn register_custom_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(NODE_NOTIFICATIONS.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(DUPLICATE_NOTIFICATIONS.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(WATCH_ERRORS.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(RECONCILE_OUTCOMES.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(REGISTRATION_CALLS.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(REGISTRATION_DURATION.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(PERSIST_CALLS.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(IN_FLIGHT_RECONCILES.clone()))
            .expect("collector can be registered");
    });
}

/// Text exposition of all registrar metrics
pub fn render() -> String {
    register_custom_metrics();

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("custom metrics could not be from_utf8'd: {}", e);
        String::default()
    })
}

/// Serves `/metrics` and `/healthz` until `shutdown` is cancelled.
pub async fn start_server(
    listen_addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<()> {
    register_custom_metrics();

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);
    let health_route = warp::path!("healthz").map(|| "ok");

    let (addr, server): (SocketAddr, _) = warp::serve(metrics_route.or(health_route))
        .try_bind_with_graceful_shutdown(listen_addr, async move {
            shutdown.cancelled().await;
        })
        .map_err(|e| Error::Fatal(format!("failed to bind metrics server on {listen_addr}: {e}")))?;

    info!(%addr, "metrics server listening");
    server.await;
    Ok(())
}

async fn metrics_handler() -> std::result::Result<impl Reply, Rejection> {
    Ok(render())
}
