use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub openai_api_key: String,
    pub database_url: String,
    pub cookies_path: String,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            telegram_bot_token: require_env("TELEGRAM_BOT_TOKEN")?,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://hr_assistant.db?mode=rwc".to_string()),
            cookies_path: std::env::var("COOKIES_PATH")
                .unwrap_or_else(|_| "cookies.json".to_string()),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
