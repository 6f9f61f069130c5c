//! bms-billing server binary.
//!
//! Loads `BMS__*` configuration, builds the provider registry and billing
//! store, and serves the billing endpoints.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use bms_billing::adapters::http::{billing_router, BillingAppState};
use bms_billing::adapters::{
    InMemoryBillingStore, InMemoryUserDirectory, JwtSessionValidator, PostgresBillingStore,
    ProviderRegistry, ReqwestProviderClient, SystemClock, TracingAuditSink,
};
use bms_billing::application::ReconciliationEngine;
use bms_billing::config::{AppConfig, DatabaseConfig};
use bms_billing::ports::{BillingStore, Clock, UserDirectory};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let http = Arc::new(ReqwestProviderClient::new(config.billing.http_timeout())?);
    let registry = ProviderRegistry::from_configs(&config.billing.providers(), http, clock.clone())?;
    if registry.is_empty() {
        tracing::warn!("No payment providers configured; every webhook will be rejected");
    }

    let store = build_store(&config.database, clock.clone()).await?;
    let directory: Arc<dyn UserDirectory> = Arc::new(InMemoryUserDirectory::new());

    let engine = ReconciliationEngine::new(Arc::new(registry), store.clone(), clock)
        .with_directory(directory.clone())
        .with_audit(Arc::new(TracingAuditSink));

    let state = BillingAppState {
        engine: Arc::new(engine),
        store,
        directory: Some(directory),
    };
    let validator = Arc::new(JwtSessionValidator::new(&config.auth));
    let app = billing_router(
        state,
        validator,
        config.server.request_timeout(),
        &config.server.cors_origins_list(),
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "bms-billing listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// `RUST_LOG` wins over the configured level. JSON output in production.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.is_production() {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn build_store(
    database: &DatabaseConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn BillingStore>, BoxError> {
    let Some(url) = database.url() else {
        tracing::warn!("No database configured; using the in-memory billing store");
        return Ok(Arc::new(InMemoryBillingStore::new().with_clock(clock)));
    };

    let pool = PgPoolOptions::new()
        .min_connections(database.min_connections)
        .max_connections(database.max_connections)
        .acquire_timeout(database.acquire_timeout())
        .connect(url)
        .await?;

    if database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    Ok(Arc::new(PostgresBillingStore::new(pool).with_clock(clock)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
