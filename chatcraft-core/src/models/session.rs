use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSession {
    pub id: String,
    pub user_id: String,
    pub session_data: Option<Value>,
    pub context_data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
}

impl UserSession {
    pub fn new(
        user_id: impl Into<String>,
        session_data: Option<Value>,
        context_data: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            session_data: Some(session_data.unwrap_or_else(|| Value::Object(Default::default()))),
            context_data: Some(context_data.unwrap_or_default()),
            created_at: now,
            last_activity: now,
            is_active: true,
        }
    }

    /// Ordering key for picking the active session: latest activity, then highest id.
    pub fn recency_key(&self) -> (DateTime<Utc>, &str) {
        (self.last_activity, self.id.as_str())
    }
}
