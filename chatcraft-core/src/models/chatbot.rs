use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chatbot {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub llm_endpoint_url: Option<String>,
    pub chatbot_config: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chatbot {
    /// Stored configuration, or `{}` when unset.
    pub fn config_or_empty(&self) -> Value {
        self.chatbot_config
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()))
    }

    /// A string entry of the configuration map; `null` counts as absent.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.chatbot_config
            .as_ref()
            .and_then(|c| c.get(key))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct NewChatbot {
    pub id: Option<String>,
    pub name: String,
    pub owner_id: String,
    pub llm_endpoint_url: Option<String>,
    pub chatbot_config: Option<Value>,
}

/// Business profile echoed back by chatbot creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessInfo {
    pub name: String,
    pub description: String,
    pub website_url: Option<String>,
    pub tone: String,
    pub faqs: Vec<Value>,
    pub bot_display_name: String,
}
