mod analysis;
mod config;
mod db;
mod errors;
mod export;
mod extract;
mod llm;
mod normalize;
mod prompts;
mod repo;
mod scrape;
mod session;
mod state;
mod telegram;
mod workflow;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, init_schema};
use crate::llm::OpenAiClient;
use crate::state::AppState;
use crate::telegram::TelegramClient;
use crate::workflow::Dispatcher;

/// Back-off after a failed long-poll cycle before retrying.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting HR assistant bot v{}", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite and the schema
    let pool = create_pool(&config.database_url).await?;
    init_schema(&pool).await?;
    info!("Database ready at {}", config.database_url);

    // Initialize the chat transport
    let telegram = TelegramClient::new(config.telegram_bot_token.clone());
    telegram
        .set_my_commands(&[("start", "Menu"), ("help", "Help")])
        .await?;
    info!("Chat commands registered");

    // Initialize the completion client
    let openai = OpenAiClient::new(config.openai_api_key.clone());
    info!("Completion client initialized (model: {})", llm::MODEL);

    let state = AppState {
        db: pool,
        llm: Arc::new(openai),
        chat: Arc::new(telegram.clone()),
        config,
    };

    let mut dispatcher = Dispatcher::new(state);

    // Long-poll loop. Updates are handled strictly in order, one at a time;
    // the offset advances past each batch so nothing is redelivered.
    info!("Polling for updates");
    let mut offset: i64 = 0;
    loop {
        match telegram.get_updates(offset).await {
            Ok(updates) => {
                for update in updates {
                    offset = update.update_id + 1;
                    dispatcher.handle_update(update).await;
                }
            }
            Err(e) => {
                warn!("Polling failed: {e}; retrying in {POLL_RETRY_DELAY:?}");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
            }
        }
    }
}
