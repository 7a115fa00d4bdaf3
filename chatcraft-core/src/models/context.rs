use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{User, UserSession};

/// Everything the downstream LLM integration gets to see about a user.
#[derive(Debug, Clone, Serialize)]
pub struct UserContext {
    pub user_id: String,
    pub user_profile: UserProfile,
    pub session_data: Value,
    pub conversation_context: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub preferences: Value,
    pub profile_data: Option<String>,
}

impl UserContext {
    pub fn assemble(user: &User, active: Option<&UserSession>, now: DateTime<Utc>) -> Self {
        let empty = || Value::Object(Default::default());
        Self {
            user_id: user.id.clone(),
            user_profile: UserProfile {
                email: user.email.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                company: user.company.clone(),
                role: user.role.clone(),
                preferences: user.preferences.clone().unwrap_or_else(empty),
                profile_data: user.profile_data.clone(),
            },
            session_data: active
                .and_then(|s| s.session_data.clone())
                .unwrap_or_else(empty),
            conversation_context: active
                .and_then(|s| s.context_data.clone())
                .unwrap_or_default(),
            timestamp: now,
        }
    }
}
