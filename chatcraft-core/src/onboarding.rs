//! Onboarding flows: users, chatbots and API keys.

use chrono::Utc;
use serde_json::{json, Value};

use crate::error::ChatcraftError;
use crate::models::{ApiKey, BusinessInfo, Chatbot, NewChatbot, NewUser, User};
use crate::store::Store;

pub const DEFAULT_TONE: &str = "friendly";
const API_KEY_PREFIX: &str = "ck_";

pub async fn create_user(store: &dyn Store, new: NewUser) -> Result<User, ChatcraftError> {
    let now = Utc::now();
    let user = User {
        id: new.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        email: new.email,
        hashed_password: new.hashed_password,
        first_name: None,
        last_name: None,
        company: None,
        role: None,
        preferences: None,
        profile_data: None,
        created_at: now,
        updated_at: now,
    };
    store.insert_user(&user).await?;
    tracing::info!(user_id = %user.id, "Created user");
    Ok(user)
}

pub async fn create_chatbot(store: &dyn Store, new: NewChatbot) -> Result<Chatbot, ChatcraftError> {
    if store.get_user(&new.owner_id).await?.is_none() {
        return Err(ChatcraftError::not_found("user", new.owner_id));
    }
    let now = Utc::now();
    let chatbot = Chatbot {
        id: new.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        name: new.name,
        owner_id: new.owner_id,
        llm_endpoint_url: new.llm_endpoint_url,
        chatbot_config: new.chatbot_config,
        created_at: now,
        updated_at: now,
    };
    store.insert_chatbot(&chatbot).await?;
    tracing::info!(chatbot_id = %chatbot.id, owner_id = %chatbot.owner_id, "Created chatbot");
    Ok(chatbot)
}

/// Business details submitted by the chatbot builder form.
#[derive(Debug, Clone, Default)]
pub struct ChatbotDraft {
    pub name: String,
    pub description: Option<String>,
    pub website_url: Option<String>,
    pub tone: Option<String>,
    pub faqs: Vec<Value>,
}

impl ChatbotDraft {
    /// Configuration map stored on the chatbot row.
    pub fn config(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "website_url": self.website_url,
            "tone": self.tone,
            "faqs": self.faqs,
            "bot_display_name": self.name,
        })
    }

    pub fn business_info(&self) -> BusinessInfo {
        BusinessInfo {
            name: self.name.clone(),
            description: self.description.clone().unwrap_or_default(),
            website_url: self.website_url.clone(),
            tone: self
                .tone
                .clone()
                .unwrap_or_else(|| DEFAULT_TONE.to_string()),
            faqs: self.faqs.clone(),
            bot_display_name: self.name.clone(),
        }
    }

    pub fn embed_script_url(&self) -> String {
        match self.website_url.as_deref() {
            Some(url) if !url.is_empty() => format!("{url}/widget.js"),
            _ => "/widget.js".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatedChatbot {
    pub chatbot: Chatbot,
    pub business_info: BusinessInfo,
    pub embed_script_url: String,
}

pub async fn create_chatbot_from_draft(
    store: &dyn Store,
    owner_id: &str,
    draft: ChatbotDraft,
) -> Result<CreatedChatbot, ChatcraftError> {
    let chatbot = create_chatbot(
        store,
        NewChatbot {
            id: None,
            name: draft.name.clone(),
            owner_id: owner_id.to_string(),
            llm_endpoint_url: None,
            chatbot_config: Some(draft.config()),
        },
    )
    .await?;
    Ok(CreatedChatbot {
        chatbot,
        business_info: draft.business_info(),
        embed_script_url: draft.embed_script_url(),
    })
}

/// Store a caller-chosen key value for a chatbot.
pub async fn register_api_key(
    store: &dyn Store,
    chatbot_id: &str,
    key_value: &str,
) -> Result<ApiKey, ChatcraftError> {
    if store.get_chatbot(chatbot_id).await?.is_none() {
        return Err(ChatcraftError::not_found("chatbot", chatbot_id));
    }
    let key = store.insert_api_key(chatbot_id, key_value, Utc::now()).await?;
    tracing::info!(key_id = key.id, chatbot_id, "Registered API key");
    Ok(key)
}

/// Generate and store a fresh key; the returned record carries the value.
pub async fn issue_api_key(store: &dyn Store, chatbot_id: &str) -> Result<ApiKey, ChatcraftError> {
    let value = format!("{API_KEY_PREFIX}{}", uuid::Uuid::new_v4().simple());
    register_api_key(store, chatbot_id, &value).await
}

pub async fn revoke_api_key(store: &dyn Store, key_id: i64) -> Result<(), ChatcraftError> {
    if !store.set_api_key_revoked(key_id, true).await? {
        return Err(ChatcraftError::not_found("api key", key_id.to_string()));
    }
    tracing::info!(key_id, "Revoked API key");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn store_with_user() -> MemoryStore {
        let store = MemoryStore::new();
        create_user(
            &store,
            NewUser {
                id: Some("u1".into()),
                email: "owner@example.com".into(),
                hashed_password: "x".into(),
            },
        )
        .await
        .unwrap();
        store
    }

    #[test]
    fn test_draft_defaults() {
        let draft = ChatbotDraft {
            name: "Cafe".into(),
            ..Default::default()
        };
        let info = draft.business_info();
        assert_eq!(info.tone, "friendly");
        assert_eq!(info.description, "");
        assert_eq!(info.bot_display_name, "Cafe");
        assert_eq!(draft.embed_script_url(), "/widget.js");

        let cfg = draft.config();
        assert!(cfg["tone"].is_null());
        assert_eq!(cfg["faqs"], json!([]));
    }

    #[test]
    fn test_embed_url_uses_website() {
        let draft = ChatbotDraft {
            name: "Cafe".into(),
            website_url: Some("https://cafe.example".into()),
            ..Default::default()
        };
        assert_eq!(draft.embed_script_url(), "https://cafe.example/widget.js");
    }

    #[tokio::test]
    async fn test_chatbot_for_missing_owner_fails() {
        let store = MemoryStore::new();
        let err = create_chatbot_from_draft(&store, "ghost", ChatbotDraft::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatcraftError::NotFound { kind: "user", .. }));
    }

    #[tokio::test]
    async fn test_draft_config_is_persisted() {
        let store = store_with_user().await;
        let created = create_chatbot_from_draft(
            &store,
            "u1",
            ChatbotDraft {
                name: "Cafe".into(),
                tone: Some("formal".into()),
                faqs: vec![json!({"q": "Open?", "a": "9-5"})],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let stored = store.get_chatbot(&created.chatbot.id).await.unwrap().unwrap();
        assert_eq!(stored.owner_id, "u1");
        assert_eq!(stored.config_str("tone"), Some("formal"));
        assert_eq!(stored.chatbot_config.unwrap()["faqs"][0]["a"], "9-5");
    }

    #[tokio::test]
    async fn test_issued_keys_are_unique_and_prefixed() {
        let store = store_with_user().await;
        let bot = create_chatbot_from_draft(&store, "u1", ChatbotDraft::default())
            .await
            .unwrap()
            .chatbot;
        let a = issue_api_key(&store, &bot.id).await.unwrap();
        let b = issue_api_key(&store, &bot.id).await.unwrap();
        assert!(a.key_hash.starts_with("ck_"));
        assert_eq!(a.key_hash.len(), 35);
        assert_ne!(a.key_hash, b.key_hash);
        assert!(!a.revoked);
    }

    #[tokio::test]
    async fn test_revoke_missing_key() {
        let store = MemoryStore::new();
        assert!(revoke_api_key(&store, 99).await.is_err());
    }
}
