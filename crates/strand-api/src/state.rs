use std::sync::Arc;

use tracing::error;

use strand_db::Database;
use strand_llm::LlmClient;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub llm: LlmClient,
}

/// Run a store operation off the async runtime. rusqlite calls are
/// blocking, so every handler funnels its query work through here.
pub async fn with_db<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("task join error: {}", e))
        })?
}
