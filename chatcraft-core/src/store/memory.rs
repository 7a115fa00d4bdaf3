use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Store, StoreResult, TableCounts};
use crate::error::ChatcraftError;
use crate::models::{ApiKey, Chatbot, User, UserDetails, UserSession};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<String, User>,
    chatbots: BTreeMap<String, Chatbot>,
    api_keys: BTreeMap<i64, ApiKey>,
    sessions: BTreeMap<String, UserSession>,
    last_key_id: i64,
}

/// In-process store with the same constraints the Postgres schema enforces
/// (unique email, unique key value, foreign keys).
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn oldest_first<T>(rows: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, String)) {
    rows.sort_by_key(|r| key(r));
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<String> {
        Ok("in-memory store".to_string())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if t.users.contains_key(&user.id) {
            return Err(ChatcraftError::Constraint(format!(
                "user id '{}' already exists",
                user.id
            )));
        }
        if t.users.values().any(|u| u.email == user.email) {
            return Err(ChatcraftError::Constraint(format!(
                "email '{}' already registered",
                user.email
            )));
        }
        t.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.tables.read().await.users.values().cloned().collect();
        oldest_first(&mut users, |u| (u.created_at, u.id.clone()));
        Ok(users)
    }

    async fn first_user(&self) -> StoreResult<Option<User>> {
        Ok(self.list_users().await?.into_iter().next())
    }

    async fn update_user_details(
        &self,
        id: &str,
        details: &UserDetails,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        match t.users.get_mut(id) {
            Some(user) => {
                details.apply_to(user, now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_chatbot(&self, chatbot: &Chatbot) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&chatbot.owner_id) {
            return Err(ChatcraftError::Constraint(format!(
                "owner '{}' does not exist",
                chatbot.owner_id
            )));
        }
        if t.chatbots.contains_key(&chatbot.id) {
            return Err(ChatcraftError::Constraint(format!(
                "chatbot id '{}' already exists",
                chatbot.id
            )));
        }
        t.chatbots.insert(chatbot.id.clone(), chatbot.clone());
        Ok(())
    }

    async fn get_chatbot(&self, id: &str) -> StoreResult<Option<Chatbot>> {
        Ok(self.tables.read().await.chatbots.get(id).cloned())
    }

    async fn list_chatbots(&self) -> StoreResult<Vec<Chatbot>> {
        let mut bots: Vec<Chatbot> = self.tables.read().await.chatbots.values().cloned().collect();
        oldest_first(&mut bots, |c| (c.created_at, c.id.clone()));
        Ok(bots)
    }

    async fn list_chatbots_for_owner(&self, owner_id: &str) -> StoreResult<Vec<Chatbot>> {
        let mut bots = self.list_chatbots().await?;
        bots.retain(|c| c.owner_id == owner_id);
        Ok(bots)
    }

    async fn insert_api_key(
        &self,
        chatbot_id: &str,
        key_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<ApiKey> {
        let mut t = self.tables.write().await;
        if !t.chatbots.contains_key(chatbot_id) {
            return Err(ChatcraftError::Constraint(format!(
                "chatbot '{chatbot_id}' does not exist"
            )));
        }
        if t.api_keys.values().any(|k| k.key_hash == key_hash) {
            return Err(ChatcraftError::Constraint("duplicate key value".to_string()));
        }
        t.last_key_id += 1;
        let key = ApiKey {
            id: t.last_key_id,
            chatbot_id: chatbot_id.to_string(),
            key_hash: key_hash.to_string(),
            revoked: false,
            created_at: now,
            last_used: None,
        };
        t.api_keys.insert(key.id, key.clone());
        Ok(key)
    }

    async fn find_api_key(&self, key_hash: &str) -> StoreResult<Option<ApiKey>> {
        Ok(self
            .tables
            .read()
            .await
            .api_keys
            .values()
            .find(|k| k.key_hash == key_hash)
            .cloned())
    }

    async fn touch_api_key(&self, id: i64, now: DateTime<Utc>) -> StoreResult<()> {
        if let Some(key) = self.tables.write().await.api_keys.get_mut(&id) {
            key.last_used = Some(now);
        }
        Ok(())
    }

    async fn set_api_key_revoked(&self, id: i64, revoked: bool) -> StoreResult<bool> {
        match self.tables.write().await.api_keys.get_mut(&id) {
            Some(key) => {
                key.revoked = revoked;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_api_keys_for_chatbot(&self, chatbot_id: &str) -> StoreResult<Vec<ApiKey>> {
        Ok(self
            .tables
            .read()
            .await
            .api_keys
            .values()
            .filter(|k| k.chatbot_id == chatbot_id)
            .cloned()
            .collect())
    }

    async fn insert_session(&self, session: &UserSession) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&session.user_id) {
            return Err(ChatcraftError::Constraint(format!(
                "user '{}' does not exist",
                session.user_id
            )));
        }
        if t.sessions.contains_key(&session.id) {
            return Err(ChatcraftError::Constraint(format!(
                "session id '{}' already exists",
                session.id
            )));
        }
        t.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &str) -> StoreResult<Option<UserSession>> {
        Ok(self.tables.read().await.sessions.get(id).cloned())
    }

    async fn active_session(&self, user_id: &str) -> StoreResult<Option<UserSession>> {
        Ok(self
            .tables
            .read()
            .await
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.is_active)
            .max_by(|a, b| a.recency_key().cmp(&b.recency_key()))
            .cloned())
    }

    async fn update_session(
        &self,
        id: &str,
        session_data: Option<&Value>,
        context_data: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        let Some(session) = t.sessions.get_mut(id) else {
            return Ok(false);
        };
        if let Some(data) = session_data {
            session.session_data = Some(data.clone());
        }
        if let Some(ctx) = context_data {
            session.context_data = Some(ctx.to_string());
        }
        session.last_activity = now;
        Ok(true)
    }

    async fn table_counts(&self) -> StoreResult<TableCounts> {
        let t = self.tables.read().await;
        Ok(TableCounts {
            users: t.users.len() as i64,
            chatbots: t.chatbots.len() as i64,
            api_keys: t.api_keys.len() as i64,
            user_sessions: t.sessions.len() as i64,
        })
    }
}
