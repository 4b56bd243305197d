use thiserror::Error;

use crate::extract::ExtractionError;
use crate::llm::LlmError;
use crate::scrape::ScrapeError;
use crate::telegram::TelegramError;

/// Application-level error type.
/// Every workflow failure is converted into a chat message at the dispatcher
/// boundary via `user_message()`; nothing here may kill the event loop.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TelegramError),

    #[error("Export error: {0}")]
    Export(String),

    #[error("{0}")]
    Precondition(String),
}

impl AppError {
    /// Text shown to the user when this error reaches the handler boundary.
    /// Extraction and LLM failures are surfaced verbatim so the user can react
    /// (wrong file, quota, etc.); store errors stay generic.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Extraction(e) => format!("❌ Could not process the document: {e}"),
            AppError::Llm(e) => format!("❌ AI request failed: {e}"),
            AppError::Scrape(e) => format!("❌ Could not fetch the page: {e}"),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                "❌ A storage error occurred. The action was not completed.".to_string()
            }
            AppError::Transport(e) => {
                tracing::error!("Transport error: {e}");
                "❌ Could not talk to the chat service.".to_string()
            }
            AppError::Export(msg) => {
                tracing::error!("Export error: {msg}");
                "❌ Could not build the export file.".to_string()
            }
            AppError::Precondition(msg) => format!("⚠️ {msg}"),
        }
    }
}
