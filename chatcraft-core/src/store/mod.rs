//! Persistence store for users, chatbots, API keys and sessions.
//!
//! Services receive an explicitly constructed `Arc<dyn Store>` rather than
//! reaching for a global pool. Two implementations ship:
//! - [`PgStore`]: Postgres via sqlx
//! - [`MemoryStore`]: in-process tables, for local demos and tests

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::config::{DatabaseConfig, StoreBackend};
use crate::error::ChatcraftError;
use crate::models::{ApiKey, Chatbot, User, UserDetails, UserSession};

#[cfg(test)]
pub(crate) mod failing;
pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, ChatcraftError>;

/// Row counts reported by `GET /db-status`.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct TableCounts {
    pub users: i64,
    pub chatbots: i64,
    pub api_keys: i64,
    pub user_sessions: i64,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Connectivity probe; returns a short description of the backend.
    async fn ping(&self) -> StoreResult<String>;

    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn get_user(&self, id: &str) -> StoreResult<Option<User>>;
    /// All users, oldest first.
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    /// Oldest user (ties by id).
    async fn first_user(&self) -> StoreResult<Option<User>>;
    /// Apply a sparse update in one write. Returns `false` if no such user.
    async fn update_user_details(
        &self,
        id: &str,
        details: &UserDetails,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn insert_chatbot(&self, chatbot: &Chatbot) -> StoreResult<()>;
    async fn get_chatbot(&self, id: &str) -> StoreResult<Option<Chatbot>>;
    async fn list_chatbots(&self) -> StoreResult<Vec<Chatbot>>;
    async fn list_chatbots_for_owner(&self, owner_id: &str) -> StoreResult<Vec<Chatbot>>;

    async fn insert_api_key(
        &self,
        chatbot_id: &str,
        key_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<ApiKey>;
    /// Exact match on the stored key value.
    async fn find_api_key(&self, key_hash: &str) -> StoreResult<Option<ApiKey>>;
    async fn touch_api_key(&self, id: i64, now: DateTime<Utc>) -> StoreResult<()>;
    /// Returns `false` if no such key.
    async fn set_api_key_revoked(&self, id: i64, revoked: bool) -> StoreResult<bool>;
    async fn list_api_keys_for_chatbot(&self, chatbot_id: &str) -> StoreResult<Vec<ApiKey>>;

    async fn insert_session(&self, session: &UserSession) -> StoreResult<()>;
    async fn get_session(&self, id: &str) -> StoreResult<Option<UserSession>>;
    /// Active session with the latest `last_activity`, ties broken by highest id.
    async fn active_session(&self, user_id: &str) -> StoreResult<Option<UserSession>>;
    /// Overwrite the provided fields and bump `last_activity`.
    /// Returns `false` if no such session.
    async fn update_session(
        &self,
        id: &str,
        session_data: Option<&Value>,
        context_data: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn table_counts(&self) -> StoreResult<TableCounts>;
}

/// Build the store selected by `database.backend`.
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn Store>, ChatcraftError> {
    match config.backend {
        StoreBackend::Postgres => {
            let pool = crate::db::create_pool(config).await?;
            if config.run_migrations {
                crate::db::run_migrations(&pool).await?;
                tracing::info!("Database migrations applied");
            }
            Ok(Arc::new(PgStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
