use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::llm::CompletionService;
use crate::telegram::ChatApi;

/// Shared application state injected into the dispatcher at startup.
/// Both external services sit behind traits so tests can substitute fakes.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub llm: Arc<dyn CompletionService>,
    pub chat: Arc<dyn ChatApi>,
    pub config: Config,
}
