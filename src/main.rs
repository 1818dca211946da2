//! shiftflex-gateway server entry point.
//!
//! Wires the store, match service, notifier and optional sweeper, then
//! starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use shiftflex::api;
use shiftflex::app_state::AppState;
use shiftflex::config::{LogFormat, ShiftFlexConfig, StoreBackend};
use shiftflex::domain::EventBus;
use shiftflex::notify::{EmailConfig, EmailSender, LogEmailSender, Notifier, SmtpEmailSender};
use shiftflex::persistence::{MemoryStore, PostgresStore, SwapStore};
use shiftflex::service::{MatchService, ServiceSettings, Sweeper};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ShiftFlexConfig::from_env()?;
    init_tracing(config.log_format);
    tracing::info!(addr = %config.listen_addr, backend = ?config.store_backend, "starting shiftflex-gateway");

    // Storage
    let store: Arc<dyn SwapStore> = match config.store_backend {
        StoreBackend::Postgres => Arc::new(PostgresStore::connect(&config).await?),
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Service layer
    let event_bus = EventBus::new(config.event_bus_capacity);
    let match_service = Arc::new(MatchService::new(
        Arc::clone(&store),
        event_bus.clone(),
        ServiceSettings::from(&config),
    ));

    // Notifications
    let (sender, email_timeout): (Arc<dyn EmailSender>, Duration) = match EmailConfig::from_env() {
        Some(email) => {
            let timeout = Duration::from_millis(email.timeout_ms);
            tracing::info!(host = %email.smtp_host, port = email.smtp_port, "SMTP notifications enabled");
            (Arc::new(SmtpEmailSender::new(email)?), timeout)
        }
        None => {
            tracing::info!("SMTP_HOST not set; notifications are logged only");
            (Arc::new(LogEmailSender), config.store_call_timeout())
        }
    };
    let _notifier = Notifier::new(store, sender, email_timeout).spawn(event_bus.subscribe());

    // Periodic sweep
    let _sweeper = config
        .sweep_interval()
        .map(|interval| Sweeper::new(Arc::clone(&match_service), interval).spawn());

    // Router
    if config.admin_token.is_none() {
        tracing::info!("ADMIN_TOKEN not set; admin routes are disabled");
    }
    let app = api::build_app(
        AppState::new(match_service).with_admin_token(config.admin_token.clone()),
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
