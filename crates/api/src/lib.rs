//! Baby Monitor Daemon
//!
//! Wires snapshot sources, the per-feed alert engines and notification
//! delivery together, and serves the monitor's HTTP API.

use alert_engine::{run_ingest_loop, MonitorHub, NotificationSink, SnapshotSource, TracingSink};
use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use cloud_sync::MqttSnapshotSource;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;
pub mod settings;

use settings::{LoggingConfig, MonitorConfig};

/// Application state shared across handlers
pub struct AppState {
    /// Per-feed engines
    pub hub: Arc<MonitorHub>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: Instant,
    /// Prometheus render handle, absent when no recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new application state
    pub fn new(hub: Arc<MonitorHub>, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            hub,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
            metrics,
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub version: String,
    pub uptime_seconds: u64,
    pub feed_count: usize,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/feeds", get(routes::feeds::list_feeds))
        .route("/api/v1/feeds/:feed_id/status", get(routes::feeds::get_status))
        .route("/api/v1/feeds/:feed_id/snapshots", post(routes::feeds::post_snapshot))
        .route("/api/v1/feeds/:feed_id/reset", post(routes::feeds::reset_feed))
        .route("/api/v1/alerts", get(routes::alerts::get_alerts))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let feed_count = state.hub.feeds().map(|feeds| feeds.len()).unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().timestamp(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        feed_count,
    })
}

/// Prometheus scrape handler
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

/// Initialize logging
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
}

/// Run the monitor until interrupted
pub async fn run(config: MonitorConfig) -> anyhow::Result<()> {
    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("installing metrics recorder")?;

    let mut mqtt_source = config.mqtt.clone().map(MqttSnapshotSource::new);
    let sink: Arc<dyn NotificationSink> = match &mqtt_source {
        Some(source) => Arc::new(source.notification_sink()),
        None => Arc::new(TracingSink),
    };

    let hub = Arc::new(
        MonitorHub::new(&config.engine, sink).context("invalid engine configuration")?,
    );

    tokio::spawn(evict_idle_feeds(Arc::clone(&hub)));

    if let Some(source) = mqtt_source.as_mut() {
        let (tx, rx) = mpsc::channel(256);
        source.subscribe(tx).context("subscribing to MQTT feed")?;
        tokio::spawn(run_ingest_loop(rx, Arc::clone(&hub)));
    } else {
        info!("No MQTT broker configured, accepting snapshots over HTTP only");
    }

    let state = Arc::new(AppState::new(hub, Some(metrics)));
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    info!("Starting API server on {}", config.server.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

/// Periodically drop feeds that stopped reporting
async fn evict_idle_feeds(hub: Arc<MonitorHub>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
    loop {
        interval.tick().await;
        match hub.evict_idle(chrono::Utc::now()) {
            Ok(0) => {}
            Ok(dropped) => info!("Dropped {} idle feeds", dropped),
            Err(e) => tracing::error!("Idle feed eviction failed: {}", e),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
