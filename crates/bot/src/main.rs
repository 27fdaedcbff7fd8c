//! Token ledger chat bot.
//!
//! Serves chat updates and payment webhooks over HTTP, and resumes deposit
//! pollers left running by a previous process.

use std::sync::Arc;

use bot::config::FeatureSource;
use bot::limits::SWEEP_AFTER;
use bot::{
    notify, render, routes, AppState, BotConfig, CommandHandler, LoggingSender, MessageSender,
};
use database::Database;
use ledger::{DepositEngine, PollOutcome, RequestLifecycle, Settings, SqliteSettings};
use lookup_providers::{CallbackProvider, HttpJsonProvider, LookupProvider, Retrying};
use payment_gateway::{CashiConfig, CashiGateway};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BotConfig::from_env()?;
    info!(addr = %config.addr, features = config.features.len(), "Starting bot");

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    let ledger_config = Arc::new(config.ledger.clone());
    let settings = Settings::new(
        Arc::new(SqliteSettings::new(db.clone(), ledger_config.settings_ttl)),
        ledger_config,
    );

    let mut lifecycle = RequestLifecycle::new(db.clone(), settings.clone());
    for (feature, source) in &config.features {
        let provider: Arc<dyn LookupProvider> = match source {
            FeatureSource::Http(http) => Arc::new(
                Retrying::new(HttpJsonProvider::new(http.clone())?)
                    .with_attempts(config.provider_attempts),
            ),
            FeatureSource::Callback(callback) => Arc::new(CallbackProvider::new(callback.clone())?),
        };
        if !provider.is_ready().await {
            warn!(feature = %feature, provider = provider.name(), "Provider is missing its API key");
        }
        lifecycle = lifecycle.with_provider(feature, provider);
    }

    let cashi = CashiConfig::from_env()?;
    let webhook_secret = cashi.webhook_secret.clone();
    if webhook_secret.is_none() {
        warn!("CASHI_WEBHOOK_SECRET not set; deposits settle by polling only");
    }
    let deposits = DepositEngine::new(db.clone(), settings.clone(), Arc::new(CashiGateway::new(cashi)?));

    let sender = Arc::new(LoggingSender::default());
    let handler = Arc::new(
        CommandHandler::new(
            sender.clone(),
            db.clone(),
            settings,
            lifecycle,
            deposits.clone(),
            config.owner_ids.clone(),
        )
        .with_rate_limit(config.max_messages_per_minute),
    );

    // Deposits left pending by the previous run
    let resumed = deposits.resume_pending().await?;
    for deposit in &resumed.expired {
        if let Some(text) = render::poll_outcome(&PollOutcome::Expired, deposit) {
            if let Err(e) = sender.send_message(&deposit.user_id, &text).await {
                warn!(deposit_id = deposit.id, error = %e, "Could not send expiry notice");
            }
        }
    }
    for (deposit, poller) in resumed.polling {
        notify::watch_deposit(sender.clone(), deposit, poller);
    }

    let sweeper = handler.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_AFTER);
        loop {
            interval.tick().await;
            sweeper.sweep_limits();
        }
    });

    let app = routes::router().with_state(AppState::new(handler, webhook_secret));

    info!(addr = %config.addr, "Bot listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Bot stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
