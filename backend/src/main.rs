//! Subscription Gateway server binary.

use std::sync::Arc;

use secrecy::ExposeSecret;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use subscription_gateway::adapters::http::{self, BillingAppState};
use subscription_gateway::adapters::{DLocalConfig, DLocalGateway, PostgresBillingRepository};
use subscription_gateway::config::{AppConfig, ConfigError};
use subscription_gateway::domain::foundation::DomainError;
use subscription_gateway::ports::{BillingRepository, GatewayError};

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migrations failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Database health check failed: {0}")]
    HealthCheck(DomainError),

    #[error("Gateway client setup failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        tracing::error!(%error, "Subscription gateway exited with error");
        eprintln!("subscription-gateway: {}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate().map_err(ConfigError::from)?;

    tracing::info!(
        environment = ?config.server.environment,
        database = %config.database.redacted_url(),
        gateway = %config.gateway.api_url,
        "Configuration loaded"
    );

    // 1. Database
    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Migrations applied");
    }
    let repository = PostgresBillingRepository::new(pool);
    repository.ping().await.map_err(StartupError::HealthCheck)?;

    // 2. Gateway client
    let gateway = DLocalGateway::new(
        DLocalConfig::new(
            config.gateway.x_login.clone(),
            config.gateway.x_trans_key.expose_secret().clone(),
        )
        .with_base_url(config.gateway.api_url.clone())
        .with_timeout(config.gateway.timeout()),
    )?;

    // 3. HTTP surface
    let state = BillingAppState::from_config(Arc::new(repository), Arc::new(gateway), &config);
    if state.signature_check.is_none() {
        tracing::warn!("No webhook secret configured; notification signatures are not checked");
    }
    let app = http::app(state, &config.server);

    let addr = config.server.socket_addr().map_err(ConfigError::from)?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Subscription gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// JSON logs in production, human-readable otherwise. `RUST_LOG` overrides
/// the configured level.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.server.is_production() {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => tracing::info!("Received Ctrl+C signal, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
