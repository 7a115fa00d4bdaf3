//! Authenticated chatbot query pipeline.
//!
//! Order of checks is fixed: credential (401) → chatbot entitlement (403) →
//! chatbot exists (404) → message present (400) → profile/context writes
//! (500 on failure) → response assembly.
//!
//! All profile and context writes target the chatbot's owner, so every caller
//! of one chatbot shares a single user record and session.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chatcraft_core::models::{ApiKey, UserDetails};
use chatcraft_core::{AuthFailure, AuthService, ChatcraftError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Header carrying the raw API key.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("API key required")]
    MissingCredential,

    #[error("Invalid or revoked API key")]
    InvalidCredential,

    #[error("API key does not have access to this chatbot")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    /// Detail stays in the logs; callers only see the fixed message.
    #[error("{0}")]
    PersistenceFailure(&'static str),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredential | Self::InvalidCredential => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log a store error and replace it with an opaque failure.
    pub fn persistence(context: &'static str, err: ChatcraftError) -> Self {
        tracing::error!(error = %err, "{}", context);
        Self::PersistenceFailure(context)
    }

    pub fn into_parts(self) -> (StatusCode, Value) {
        let status = self.status();
        (
            status,
            serde_json::to_value(ErrorResponse::new(self.to_string()))
                .unwrap_or_else(|_| serde_json::json!({"status": "error"})),
        )
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_parts();
        (status, Json(body)).into_response()
    }
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiKeyInfo {
    pub key_id: i64,
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub chatbot_id: String,
    pub chatbot_name: String,
    pub user_message: String,
    pub user_context: Value,
    pub chatbot_config: Value,
    pub api_key_info: ApiKeyInfo,
    pub timestamp: DateTime<Utc>,
}

/// Parsed `{message, user_details?, context?}` body.
#[derive(Debug, Default)]
pub struct QueryRequest {
    pub message: String,
    pub user_details: Option<UserDetails>,
    pub context: Option<String>,
}

impl QueryRequest {
    /// Parse the raw request body regardless of its content type. An empty
    /// body reads as `{}`.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, GatewayError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Self::from_json(&Value::Object(Default::default()));
        }
        let body: Value = serde_json::from_slice(raw)
            .map_err(|e| GatewayError::BadRequest(format!("Invalid JSON body: {e}")))?;
        Self::from_json(&body)
    }

    pub fn from_json(body: &Value) -> Result<Self, GatewayError> {
        let message = match body.get("message") {
            Some(Value::String(m)) if !m.is_empty() => m.clone(),
            _ => return Err(GatewayError::BadRequest("Message is required".to_string())),
        };

        let user_details = match body.get("user_details") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) if map.is_empty() => None,
            Some(Value::Object(map)) => Some(
                UserDetails::from_map(map).map_err(|e| GatewayError::BadRequest(e.to_string()))?,
            ),
            Some(_) => {
                return Err(GatewayError::BadRequest(
                    "user_details must be an object".to_string(),
                ))
            }
        };

        let context = match body.get("context") {
            None | Some(Value::Null) => None,
            Some(Value::String(c)) if c.is_empty() => None,
            Some(Value::String(c)) => Some(c.clone()),
            Some(_) => return Err(GatewayError::BadRequest("context must be a string".to_string())),
        };

        Ok(Self {
            message,
            user_details,
            context,
        })
    }
}

/// Pull the raw API key out of the request headers.
pub fn credential_from_headers(headers: &HeaderMap) -> Result<&str, GatewayError> {
    let value = headers
        .get(API_KEY_HEADER)
        .ok_or(GatewayError::MissingCredential)?;
    let raw = value
        .to_str()
        .map_err(|_| GatewayError::InvalidCredential)?;
    if raw.is_empty() {
        return Err(GatewayError::MissingCredential);
    }
    Ok(raw)
}

pub async fn authenticate(auth: &AuthService, raw_key: &str) -> Result<ApiKey, GatewayError> {
    match auth.validate_key(raw_key).await {
        Ok(key) => Ok(key),
        Err(AuthFailure::NotFound) | Err(AuthFailure::Revoked) => {
            Err(GatewayError::InvalidCredential)
        }
        Err(AuthFailure::Store(e)) => Err(GatewayError::persistence("Failed to validate API key", e)),
    }
}

/// Run the full query pipeline for one request.
pub async fn run_query(
    auth: &AuthService,
    chatbot_id: &str,
    raw_key: Result<&str, GatewayError>,
    body: &[u8],
) -> Result<QueryResponse, GatewayError> {
    let api_key = authenticate(auth, raw_key?).await?;

    if api_key.chatbot_id != chatbot_id {
        tracing::info!(
            key_id = api_key.id,
            requested = chatbot_id,
            "API key used against another chatbot"
        );
        return Err(GatewayError::Forbidden);
    }

    let chatbot = match auth.get_chatbot_by_id(chatbot_id).await {
        Ok(c) => c,
        Err(ChatcraftError::NotFound { .. }) => return Err(GatewayError::NotFound("Chatbot")),
        Err(e) => return Err(GatewayError::persistence("Failed to load chatbot", e)),
    };

    let request = QueryRequest::from_bytes(body)?;
    let owner_id = chatbot.owner_id.as_str();

    if let Some(details) = &request.user_details {
        if !auth.save_user_details(owner_id, details).await {
            return Err(GatewayError::PersistenceFailure("Failed to save user details"));
        }
    }

    if let Some(context) = &request.context {
        if !auth.update_conversation_context(owner_id, context).await {
            return Err(GatewayError::PersistenceFailure("Failed to update context"));
        }
    }

    let user_context = auth
        .user_context_json(owner_id)
        .await
        .map_err(|e| GatewayError::persistence("Failed to load user context", e))?;

    Ok(QueryResponse {
        chatbot_id: chatbot.id.clone(),
        chatbot_name: chatbot.name.clone(),
        user_message: request.message,
        user_context,
        chatbot_config: chatbot.config_or_empty(),
        api_key_info: ApiKeyInfo {
            key_id: api_key.id,
            last_used: api_key.last_used,
        },
        timestamp: Utc::now(),
    })
}
