//! `MemoryStore` wrapper whose operations can be switched to fail, for
//! exercising persistence-error paths.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{MemoryStore, Store, StoreResult, TableCounts};
use crate::error::ChatcraftError;
use crate::models::{ApiKey, Chatbot, User, UserDetails, UserSession};

#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    failing: Mutex<HashSet<&'static str>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call to `op` (a `Store` method name) fail.
    pub fn fail_on(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    fn check(&self, op: &'static str) -> StoreResult<()> {
        if self.failing.lock().unwrap().contains(op) {
            return Err(ChatcraftError::Other(format!("{op} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn ping(&self) -> StoreResult<String> {
        self.check("ping")?;
        self.inner.ping().await
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.check("insert_user")?;
        self.inner.insert_user(user).await
    }

    async fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        self.check("get_user")?;
        self.inner.get_user(id).await
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        self.check("list_users")?;
        self.inner.list_users().await
    }

    async fn first_user(&self) -> StoreResult<Option<User>> {
        self.check("first_user")?;
        self.inner.first_user().await
    }

    async fn update_user_details(
        &self,
        id: &str,
        details: &UserDetails,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.check("update_user_details")?;
        self.inner.update_user_details(id, details, now).await
    }

    async fn insert_chatbot(&self, chatbot: &Chatbot) -> StoreResult<()> {
        self.check("insert_chatbot")?;
        self.inner.insert_chatbot(chatbot).await
    }

    async fn get_chatbot(&self, id: &str) -> StoreResult<Option<Chatbot>> {
        self.check("get_chatbot")?;
        self.inner.get_chatbot(id).await
    }

    async fn list_chatbots(&self) -> StoreResult<Vec<Chatbot>> {
        self.check("list_chatbots")?;
        self.inner.list_chatbots().await
    }

    async fn list_chatbots_for_owner(&self, owner_id: &str) -> StoreResult<Vec<Chatbot>> {
        self.check("list_chatbots_for_owner")?;
        self.inner.list_chatbots_for_owner(owner_id).await
    }

    async fn insert_api_key(
        &self,
        chatbot_id: &str,
        key_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<ApiKey> {
        self.check("insert_api_key")?;
        self.inner.insert_api_key(chatbot_id, key_hash, now).await
    }

    async fn find_api_key(&self, key_hash: &str) -> StoreResult<Option<ApiKey>> {
        self.check("find_api_key")?;
        self.inner.find_api_key(key_hash).await
    }

    async fn touch_api_key(&self, id: i64, now: DateTime<Utc>) -> StoreResult<()> {
        self.check("touch_api_key")?;
        self.inner.touch_api_key(id, now).await
    }

    async fn set_api_key_revoked(&self, id: i64, revoked: bool) -> StoreResult<bool> {
        self.check("set_api_key_revoked")?;
        self.inner.set_api_key_revoked(id, revoked).await
    }

    async fn list_api_keys_for_chatbot(&self, chatbot_id: &str) -> StoreResult<Vec<ApiKey>> {
        self.check("list_api_keys_for_chatbot")?;
        self.inner.list_api_keys_for_chatbot(chatbot_id).await
    }

    async fn insert_session(&self, session: &UserSession) -> StoreResult<()> {
        self.check("insert_session")?;
        self.inner.insert_session(session).await
    }

    async fn get_session(&self, id: &str) -> StoreResult<Option<UserSession>> {
        self.check("get_session")?;
        self.inner.get_session(id).await
    }

    async fn active_session(&self, user_id: &str) -> StoreResult<Option<UserSession>> {
        self.check("active_session")?;
        self.inner.active_session(user_id).await
    }

    async fn update_session(
        &self,
        id: &str,
        session_data: Option<&Value>,
        context_data: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.check("update_session")?;
        self.inner
            .update_session(id, session_data, context_data, now)
            .await
    }

    async fn table_counts(&self) -> StoreResult<TableCounts> {
        self.check("table_counts")?;
        self.inner.table_counts().await
    }
}
