//! Service entry point: configuration, wiring, HTTP server, expiry sweep.

use std::sync::Arc;
use std::time::Duration;

use secrecy::Secret;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use thinkbot::adapters::ai::{OpenAiConfig, OpenAiProvider};
use thinkbot::adapters::http::{app_router, AppState};
use thinkbot::adapters::line::{LinePushClient, LineSignatureVerifier};
use thinkbot::adapters::postgres::PostgresStore;
use thinkbot::application::handlers::{
    ExpirySweeper, StatisticsHandler, TurnHandler, TurnSettings,
};
use thinkbot::config::AppConfig;
use thinkbot::domain::catalog::CategoryCatalog;
use thinkbot::ports::{AIProvider, ConversationStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    config.validate()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Explicit dependency construction; no hidden singletons.
    let store: Arc<dyn ConversationStore> = Arc::new(PostgresStore::new(pool));
    let catalog = Arc::new(CategoryCatalog::builtin());

    let api_key = config
        .ai
        .openai_api_key
        .clone()
        .expect("validated configuration has an API key");
    let provider: Arc<dyn AIProvider> = Arc::new(OpenAiProvider::new(
        OpenAiConfig::new(api_key)
            .with_model(&config.ai.model)
            .with_timeout(config.ai.timeout())
            .with_max_retries(config.ai.max_retries),
    )?);

    let turn_handler = Arc::new(TurnHandler::new(
        store.clone(),
        provider.clone(),
        catalog.clone(),
        TurnSettings {
            default_model: config.ai.model.clone(),
            max_history: config.session.max_history,
        },
    ));
    let statistics = Arc::new(StatisticsHandler::new(store.clone(), catalog.clone()));

    let channel_access_token = Secret::new(
        config
            .line
            .channel_access_token
            .clone()
            .expect("validated configuration has a channel token"),
    );
    let channel_secret = Secret::new(
        config
            .line
            .channel_secret
            .clone()
            .expect("validated configuration has a channel secret"),
    );
    let push_client = Arc::new(LinePushClient::new(channel_access_token)?);
    let verifier = Arc::new(LineSignatureVerifier::new(channel_secret));

    // Background inactivity sweep, independent of the request path.
    let sweeper = ExpirySweeper::new(
        store.clone(),
        chrono::Duration::minutes(config.session.idle_timeout_minutes),
    );
    let sweep_interval = Duration::from_secs(config.session.sweep_interval_secs);
    tokio::spawn(async move {
        sweeper.run_periodic(sweep_interval).await;
    });

    let state = AppState {
        turn_handler,
        statistics,
        store,
        provider,
        push_client,
        verifier,
    };

    let addr = config.server.socket_addr()?;
    tracing::info!(%addr, "starting thinkbot");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app_router(state)).await?;

    Ok(())
}
