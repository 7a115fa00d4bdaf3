//! API-key authentication and per-user context assembly.
//!
//! `AuthService` is the only component with real contract surface:
//! - key validation with revocation and best-effort `last_used` stamping
//! - sparse profile merges
//! - the "most recent active session" rule shared by the read and write paths
//! - the context bundle handed to the LLM integration

use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use serde_json::Value;

use crate::error::{AuthFailure, ChatcraftError};
use crate::models::{ApiKey, Chatbot, User, UserContext, UserDetails, UserSession};
use crate::store::Store;

/// Maps a caller-supplied key to the value stored in `api_keys.key_hash`.
pub trait KeyDigest: Send + Sync {
    fn lookup_value(&self, raw_key: &str) -> String;
}

/// Keys are stored as issued and compared by exact equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl KeyDigest for ExactMatch {
    fn lookup_value(&self, raw_key: &str) -> String {
        raw_key.to_string()
    }
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    digest: Arc<dyn KeyDigest>,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_digest(store, Arc::new(ExactMatch))
    }

    pub fn with_digest(store: Arc<dyn Store>, digest: Arc<dyn KeyDigest>) -> Self {
        Self { store, digest }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Validate a raw API key and stamp its `last_used`.
    ///
    /// The stamp is not re-checked against a concurrent revocation, and a
    /// failed stamp does not fail validation.
    pub async fn validate_key(&self, raw_key: &str) -> Result<ApiKey, AuthFailure> {
        let lookup = self.digest.lookup_value(raw_key);
        let mut key = self
            .store
            .find_api_key(&lookup)
            .await?
            .ok_or(AuthFailure::NotFound)?;

        if key.revoked {
            tracing::info!(key_id = key.id, "Rejected revoked API key");
            return Err(AuthFailure::Revoked);
        }

        // Microseconds: what a TIMESTAMPTZ column keeps.
        let now = Utc::now().trunc_subsecs(6);
        match self.store.touch_api_key(key.id, now).await {
            Ok(()) => key.last_used = Some(now),
            Err(e) => tracing::warn!(key_id = key.id, error = %e, "Failed to update API key last_used"),
        }

        Ok(key)
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> Result<User, ChatcraftError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ChatcraftError::not_found("user", user_id))
    }

    pub async fn get_chatbot_by_id(&self, chatbot_id: &str) -> Result<Chatbot, ChatcraftError> {
        self.store
            .get_chatbot(chatbot_id)
            .await?
            .ok_or_else(|| ChatcraftError::not_found("chatbot", chatbot_id))
    }

    /// Sparse merge of profile fields. Returns `false` only when the write fails.
    pub async fn save_user_details(&self, user_id: &str, details: &UserDetails) -> bool {
        if details.is_empty() {
            return true;
        }
        match self
            .store
            .update_user_details(user_id, details, Utc::now())
            .await
        {
            Ok(found) => {
                if !found {
                    tracing::warn!(user_id, "User details update matched no user");
                }
                true
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "Error saving user details");
                false
            }
        }
    }

    /// Overwrite the active session's conversation context, creating a
    /// session when the user has none. Returns `false` only when a write fails.
    pub async fn update_conversation_context(&self, user_id: &str, context: &str) -> bool {
        match self.write_conversation_context(user_id, context).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(user_id, error = %e, "Error updating conversation context");
                false
            }
        }
    }

    async fn write_conversation_context(
        &self,
        user_id: &str,
        context: &str,
    ) -> Result<(), ChatcraftError> {
        match self.store.active_session(user_id).await? {
            Some(session) => {
                self.store
                    .update_session(&session.id, None, Some(context), Utc::now())
                    .await?;
            }
            None => {
                let session = UserSession::new(user_id, None, Some(context.to_string()));
                self.store.insert_session(&session).await?;
                tracing::debug!(user_id, session_id = %session.id, "Created user session");
            }
        }
        Ok(())
    }

    /// Context bundle for the LLM integration; `None` when the user does not exist.
    pub async fn get_user_context_for_llm(
        &self,
        user_id: &str,
    ) -> Result<Option<UserContext>, ChatcraftError> {
        let Some(user) = self.store.get_user(user_id).await? else {
            return Ok(None);
        };
        let active = self.store.active_session(user_id).await?;
        Ok(Some(UserContext::assemble(&user, active.as_ref(), Utc::now())))
    }

    /// Same as [`get_user_context_for_llm`](Self::get_user_context_for_llm) but
    /// rendered as JSON, with `{}` standing in for a missing user.
    pub async fn user_context_json(&self, user_id: &str) -> Result<Value, ChatcraftError> {
        Ok(match self.get_user_context_for_llm(user_id).await? {
            Some(ctx) => serde_json::to_value(ctx)
                .map_err(|e| ChatcraftError::Other(format!("context serialization: {e}")))?,
            None => Value::Object(Default::default()),
        })
    }

    pub async fn create_user_session(
        &self,
        user_id: &str,
        session_data: Option<Value>,
        context_data: Option<String>,
    ) -> Result<UserSession, ChatcraftError> {
        let session = UserSession::new(user_id, session_data, context_data);
        self.store.insert_session(&session).await?;
        Ok(session)
    }

    pub async fn update_user_session(
        &self,
        session_id: &str,
        session_data: Option<&Value>,
        context_data: Option<&str>,
    ) -> Result<UserSession, ChatcraftError> {
        let updated = self
            .store
            .update_session(session_id, session_data, context_data, Utc::now())
            .await?;
        if !updated {
            return Err(ChatcraftError::not_found("session", session_id));
        }
        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(|| ChatcraftError::not_found("session", session_id))
    }
}
