//! LicenseCore API Gateway
//!
//! The HTTP entry point for the license registry.
//! Handles:
//! - License CRUD and bulk intake
//! - Key validation (activation), rate limited
//! - Usage statistics
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use licensecore_common::{
    config::{AppConfig, DatabaseConfig, ObservabilityConfig},
    db::{DbPool, LicenseStore, MemoryStore, Repository},
    metrics as app_metrics,
    services::{ActivationEngine, BulkIntake, UsageAggregator},
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{signal, sync::Notify};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::middleware::rate_limit::{rate_limit, RateLimit};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn LicenseStore>,
    pub engine: ActivationEngine,
    pub aggregator: UsageAggregator,
    pub intake: BulkIntake,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn LicenseStore>) -> Self {
        Self {
            engine: ActivationEngine::new(store.clone()),
            aggregator: UsageAggregator::new(store.clone(), &config.licensing),
            intake: BulkIntake::new(store.clone(), config.licensing.import_default_max_uses),
            config,
            store,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load().context("Failed to load configuration")?);

    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        version = licensecore_common::VERSION,
        "Starting LicenseCore API Gateway"
    );

    init_metrics(&config.observability)?;

    let store = connect_store(&config.database).await?;

    // Create app state
    let state = AppState::new(config.clone(), store.clone());

    // Build the router
    let app = create_router(state)?;

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // In-flight requests get `shutdown_timeout_secs` to finish after a signal
    let draining = Arc::new(Notify::new());
    let signal = {
        let draining = draining.clone();
        async move {
            shutdown_signal().await;
            draining.notify_one();
        }
    };
    let drain_deadline = async {
        draining.notified().await;
        tokio::time::sleep(Duration::from_secs(config.server.shutdown_timeout_secs)).await;
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(signal);
    tokio::select! {
        result = server.into_future() => result?,
        _ = drain_deadline => tracing::warn!(
            timeout_secs = config.server.shutdown_timeout_secs,
            "Graceful shutdown timed out, dropping open connections"
        ),
    }

    store.close().await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Install the Prometheus exporter unless `metrics_port` is 0
fn init_metrics(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if config.metrics_port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", config.service_name.clone())
        .set_buckets(app_metrics::LATENCY_BUCKETS)?
        .install()
        .context("Failed to install Prometheus exporter")?;

    app_metrics::register_metrics();
    info!(%addr, "Metrics exporter listening");

    Ok(())
}

/// Pick the storage backend and prepare it
async fn connect_store(config: &DatabaseConfig) -> anyhow::Result<Arc<dyn LicenseStore>> {
    if config.in_memory {
        info!("Using in-memory license store; data will not survive a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    info!("Connecting to database...");
    let pool = DbPool::new(config).await?;
    let repository = Repository::new(pool);
    repository.migrate().await?;

    Ok(Arc::new(repository))
}

/// Create the main application router
fn create_router(state: AppState) -> anyhow::Result<Router> {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Activation endpoint, rate limited when enabled
    let mut validate_routes = Router::new()
        .route("/api/licenses/validate", post(handlers::validate::validate));

    if state.config.rate_limit.enabled {
        let limit = RateLimit::from_config(&state.config.rate_limit)?;
        validate_routes = validate_routes
            .route_layer(axum::middleware::from_fn_with_state(limit, rate_limit));
    }

    let api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Registry endpoints
        .route(
            "/api/licenses",
            post(handlers::licenses::create_license).get(handlers::licenses::list_licenses),
        )
        .route(
            "/api/licenses/{id}",
            put(handlers::licenses::update_license).delete(handlers::licenses::delete_license),
        )
        .route("/api/licenses/import", post(handlers::import::import_licenses))

        // Statistics endpoints
        .route("/api/stats", get(handlers::stats::stats))
        .route("/api/stats/chart", get(handlers::stats::chart))
        .merge(validate_routes);

    // Compose the app
    Ok(api_routes
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
