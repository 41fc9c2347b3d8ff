pub mod auth;
pub mod comments;
pub mod error;
pub mod likes;
pub mod middleware;
pub mod posts;
pub mod routes;

use std::sync::Arc;

use storeapi_db::Database;
use storeapi_security::TokenService;
use storeapi_worker::TaskQueue;
use tracing::error;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub tokens: TokenService,
    pub queue: TaskQueue,
    /// Public base URL, used to build links that go out by email.
    pub base_url: String,
}

/// Run a blocking database call off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("background task failed"))
        })?
        .map_err(ApiError::from)
}
