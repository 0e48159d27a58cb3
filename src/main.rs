//! marina-gateway server entry point.
//!
//! Loads configuration once, wires stores, payment gateway and services,
//! and starts the Axum HTTP server.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use marina_gateway::api;
use marina_gateway::app_state::AppState;
use marina_gateway::config::{GatewayConfig, LogFormat};
use marina_gateway::domain::{
    BookingStore, Clock, EventBus, InMemoryBookingStore, InMemoryYachtCatalog, SystemClock,
    Yacht, YachtCatalog,
};
use marina_gateway::payment::{HttpPaymentGateway, PaymentGateway, SandboxGateway, WebhookVerifier};
use marina_gateway::persistence::PostgresStore;
use marina_gateway::service::{
    AdmissionController, BookingService, EventSink, ReconciliationService, spawn_event_recorder,
    spawn_expiry_sweeper,
};

struct Stores {
    bookings: Arc<dyn BookingStore>,
    catalog: Arc<dyn YachtCatalog>,
    sink: Option<Arc<dyn EventSink>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config =
        GatewayConfig::from_env().map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting marina-gateway");
    tracing::debug!(?config, "configuration loaded");

    let fleet = match &config.fleet_seed_path {
        Some(path) => load_fleet(path)?,
        None => Vec::new(),
    };

    // Build domain layer
    let stores = build_stores(&config, fleet).await?;
    let event_bus = EventBus::new(config.event_bus_capacity);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Payment gateway, constructed once and injected
    let gateway: Arc<dyn PaymentGateway> = match &config.payment.secret_key {
        Some(key) => Arc::new(
            HttpPaymentGateway::new(
                config.payment.api_base.clone(),
                key.clone(),
                Duration::from_secs(config.payment.timeout_secs),
            )
            .context("building payment gateway client")?,
        ),
        None => {
            tracing::warn!("PAYMENT_SECRET_KEY not set, using the in-process sandbox gateway");
            Arc::new(SandboxGateway::new())
        }
    };
    let webhook_secret = config.payment.webhook_secret.clone().unwrap_or_else(|| {
        tracing::warn!("PAYMENT_WEBHOOK_SECRET not set, webhook deliveries cannot be verified");
        format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        )
    });
    let verifier = WebhookVerifier::new(webhook_secret, config.payment.webhook_tolerance_secs);

    // Build service layer
    let admission = Arc::new(AdmissionController::new(
        Arc::clone(&stores.catalog),
        Arc::clone(&stores.bookings),
        event_bus.clone(),
        Arc::clone(&clock),
    ));
    let bookings = Arc::new(BookingService::new(
        Arc::clone(&stores.bookings),
        event_bus.clone(),
        Arc::clone(&clock),
    ));
    let reconciliation = Arc::new(ReconciliationService::new(
        Arc::clone(&bookings),
        gateway,
        verifier,
        config.payment.currency.clone(),
    ));

    // Background tasks
    let _recorder = spawn_event_recorder(&event_bus, stores.sink);
    if config.pending_expiry_minutes > 0 {
        let Some(max_age) = i64::try_from(config.pending_expiry_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
        else {
            anyhow::bail!("PENDING_EXPIRY_MINUTES out of range");
        };
        let _sweeper = spawn_expiry_sweeper(
            Arc::clone(&bookings),
            max_age,
            Duration::from_secs(config.sweep_interval_secs.max(1)),
        );
        tracing::info!(
            minutes = config.pending_expiry_minutes,
            interval_secs = config.sweep_interval_secs,
            "pending booking expiry enabled"
        );
    }

    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set, admin routes will refuse every request");
    }

    // Build application state
    let app_state = AppState {
        admission,
        bookings,
        reconciliation,
        event_bus,
        admin_token: config.admin_token.as_deref().map(Arc::from),
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs.max(1),
        )))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn build_stores(config: &GatewayConfig, fleet: Vec<Yacht>) -> anyhow::Result<Stores> {
    if !config.persistence_enabled {
        tracing::info!(yachts = fleet.len(), "using in-memory booking store");
        return Ok(Stores {
            bookings: Arc::new(InMemoryBookingStore::new()),
            catalog: Arc::new(InMemoryYachtCatalog::with_yachts(fleet)),
            sink: None,
        });
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await
        .context("connecting to PostgreSQL")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("running database migrations")?;

    let store = Arc::new(PostgresStore::new(pool));
    for yacht in &fleet {
        store
            .upsert_yacht(yacht)
            .await
            .with_context(|| format!("seeding yacht {}", yacht.id))?;
    }
    tracing::info!(seeded = fleet.len(), "using PostgreSQL booking store");

    Ok(Stores {
        bookings: Arc::clone(&store) as Arc<dyn BookingStore>,
        catalog: Arc::clone(&store) as Arc<dyn YachtCatalog>,
        sink: Some(store as Arc<dyn EventSink>),
    })
}

fn load_fleet(path: &Path) -> anyhow::Result<Vec<Yacht>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading fleet file {}", path.display()))?;
    let fleet: Vec<Yacht> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing fleet file {}", path.display()))?;
    Ok(fleet)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
