//! Demo fixture: one user, one chatbot and one API key.
//!
//! Safe to run repeatedly; rows that already exist are left untouched.

use chatcraft_core::models::{NewChatbot, NewUser};
use chatcraft_core::{onboarding, ChatcraftError, Store};

pub const SEED_USER_ID: &str = "u1";
pub const SEED_USER_EMAIL: &str = "test@example.com";
pub const SEED_CHATBOT_ID: &str = "c1";
pub const SEED_CHATBOT_NAME: &str = "My First Chatbot";
pub const SEED_LLM_ENDPOINT: &str = "http://localhost:8000";
pub const SEED_API_KEY: &str = "sample_api_key_123";

/// What the seed run actually inserted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub user_created: bool,
    pub chatbot_created: bool,
    pub api_key_created: bool,
}

pub async fn seed_demo_data(store: &dyn Store) -> Result<SeedReport, ChatcraftError> {
    let mut report = SeedReport::default();

    if store.get_user(SEED_USER_ID).await?.is_none() {
        onboarding::create_user(
            store,
            NewUser {
                id: Some(SEED_USER_ID.to_string()),
                email: SEED_USER_EMAIL.to_string(),
                hashed_password: "hashed_password".to_string(),
            },
        )
        .await?;
        report.user_created = true;
    }

    if store.get_chatbot(SEED_CHATBOT_ID).await?.is_none() {
        onboarding::create_chatbot(
            store,
            NewChatbot {
                id: Some(SEED_CHATBOT_ID.to_string()),
                name: SEED_CHATBOT_NAME.to_string(),
                owner_id: SEED_USER_ID.to_string(),
                llm_endpoint_url: Some(SEED_LLM_ENDPOINT.to_string()),
                chatbot_config: None,
            },
        )
        .await?;
        report.chatbot_created = true;
    }

    if store.find_api_key(SEED_API_KEY).await?.is_none() {
        onboarding::register_api_key(store, SEED_CHATBOT_ID, SEED_API_KEY).await?;
        report.api_key_created = true;
    }

    tracing::info!(?report, "Demo seed complete");
    Ok(report)
}
