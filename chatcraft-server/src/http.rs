//! ChatCraft HTTP REST API
//!
//! Axum-based HTTP server for the chatbot backend.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function returning `(StatusCode, serde_json::Value)`. The inner
//! functions are directly testable without axum dispatch machinery.
//!
//! Endpoints:
//! - GET  /                          banner
//! - GET  /health                    liveness
//! - GET  /db-status                 row counts per table
//! - POST /chatbot/:id/query         authenticated query (X-API-Key)
//! - POST /chatbot/create            multipart chatbot builder form
//! - POST /chatbot/respond           generated reply for the widget
//! - GET  /users, /users/:id, /users/:id/chatbots
//! - POST /users/:id/details
//! - GET|POST /users/:id/context
//! - GET  /chatbots, /chatbots/:id, /chatbots/:id/api-keys

use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chatcraft_core::models::{UserDetails, UserSummary};
use chatcraft_core::onboarding::{self, ChatbotDraft};
use chatcraft_core::{
    build_prompt, AuthService, ChatcraftConfig, FallbackGenerationClient, Store,
    EMPTY_MESSAGE_REPLY,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::gateway::{self, GatewayError};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub auth: AuthService,
    pub generator: Arc<FallbackGenerationClient>,
    pub config: ChatcraftConfig,
}

impl HttpState {
    pub fn new(store: Arc<dyn Store>, config: ChatcraftConfig) -> Self {
        let generator = Arc::new(FallbackGenerationClient::from_config(&config.generation));
        Self {
            auth: AuthService::new(store),
            generator,
            config,
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.auth.store().as_ref()
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/db-status", get(db_status_handler))
        .route("/chatbot/create", post(create_chatbot_handler))
        .route("/chatbot/respond", post(respond_handler))
        .route("/chatbot/:chatbot_id/query", post(query_handler))
        .route("/users", get(list_users_handler))
        .route("/users/:user_id", get(get_user_handler))
        .route("/users/:user_id/details", post(save_details_handler))
        .route(
            "/users/:user_id/context",
            get(get_context_handler).post(update_context_handler),
        )
        .route("/users/:user_id/chatbots", get(user_chatbots_handler))
        .route("/chatbots", get(list_chatbots_handler))
        .route("/chatbots/:chatbot_id", get(get_chatbot_handler))
        .route("/chatbots/:chatbot_id/api-keys", get(chatbot_keys_handler))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: HttpState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = state.config.bind_addr();
    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("ChatCraft HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ContextUpdateParams {
    pub context_data: String,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub chatbot_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RespondResponse {
    pub reply: String,
}

/// Text fields of the chatbot builder form. Files are accepted and dropped.
#[derive(Debug, Default)]
pub struct ChatbotForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub website_url: Option<String>,
    pub tone: Option<String>,
    pub faqs: Option<String>,
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

pub fn root_inner() -> Value {
    json!({ "message": "Chatbot Backend is running" })
}

pub fn health_inner() -> Value {
    json!({ "status": "ok" })
}

/// Row counts per table; store failures are reported in the body, never as a status.
pub async fn db_status_inner(store: &dyn Store) -> (StatusCode, Value) {
    match store.table_counts().await {
        Ok(tables) => (
            StatusCode::OK,
            json!({
                "status": "connected",
                "tables": tables,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "db-status query failed");
            (
                StatusCode::OK,
                json!({
                    "status": "error",
                    "error": e.to_string(),
                }),
            )
        }
    }
}

pub async fn query_inner(
    auth: &AuthService,
    chatbot_id: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> (StatusCode, Value) {
    let raw_key = gateway::credential_from_headers(headers);
    match gateway::run_query(auth, chatbot_id, raw_key, body).await {
        Ok(resp) => (StatusCode::OK, json!(resp)),
        Err(e) => e.into_parts(),
    }
}

pub async fn save_details_inner(
    auth: &AuthService,
    user_id: &str,
    body: &Value,
) -> (StatusCode, Value) {
    let Some(map) = body.as_object() else {
        return GatewayError::BadRequest("Details must be a JSON object".to_string()).into_parts();
    };
    let details = match UserDetails::from_map(map) {
        Ok(d) => d,
        Err(e) => return GatewayError::BadRequest(e.to_string()).into_parts(),
    };
    if !auth.save_user_details(user_id, &details).await {
        return GatewayError::PersistenceFailure("Failed to save user details").into_parts();
    }
    (
        StatusCode::OK,
        json!({ "message": "User details saved successfully" }),
    )
}

pub async fn get_context_inner(auth: &AuthService, user_id: &str) -> (StatusCode, Value) {
    match auth.user_context_json(user_id).await {
        Ok(ctx) => (StatusCode::OK, ctx),
        Err(e) => GatewayError::persistence("Failed to load user context", e).into_parts(),
    }
}

pub async fn update_context_inner(
    auth: &AuthService,
    user_id: &str,
    context: &str,
) -> (StatusCode, Value) {
    if !auth.update_conversation_context(user_id, context).await {
        return GatewayError::PersistenceFailure("Failed to update context").into_parts();
    }
    (
        StatusCode::OK,
        json!({ "message": "Context updated successfully" }),
    )
}

pub async fn list_users_inner(store: &dyn Store) -> (StatusCode, Value) {
    match store.list_users().await {
        Ok(users) => {
            let rows: Vec<UserSummary> = users.iter().map(UserSummary::from).collect();
            (StatusCode::OK, json!(rows))
        }
        Err(e) => GatewayError::persistence("Failed to list users", e).into_parts(),
    }
}

pub async fn get_user_inner(store: &dyn Store, user_id: &str) -> (StatusCode, Value) {
    match store.get_user(user_id).await {
        Ok(Some(user)) => (StatusCode::OK, json!(user)),
        Ok(None) => GatewayError::NotFound("User").into_parts(),
        Err(e) => GatewayError::persistence("Failed to load user", e).into_parts(),
    }
}

pub async fn list_chatbots_inner(store: &dyn Store, owner_id: Option<&str>) -> (StatusCode, Value) {
    let result = match owner_id {
        Some(owner) => store.list_chatbots_for_owner(owner).await,
        None => store.list_chatbots().await,
    };
    match result {
        Ok(bots) => (StatusCode::OK, json!(bots)),
        Err(e) => GatewayError::persistence("Failed to list chatbots", e).into_parts(),
    }
}

pub async fn get_chatbot_inner(store: &dyn Store, chatbot_id: &str) -> (StatusCode, Value) {
    match store.get_chatbot(chatbot_id).await {
        Ok(Some(bot)) => (StatusCode::OK, json!(bot)),
        Ok(None) => GatewayError::NotFound("Chatbot").into_parts(),
        Err(e) => GatewayError::persistence("Failed to load chatbot", e).into_parts(),
    }
}

pub async fn chatbot_keys_inner(store: &dyn Store, chatbot_id: &str) -> (StatusCode, Value) {
    match store.list_api_keys_for_chatbot(chatbot_id).await {
        Ok(keys) => (StatusCode::OK, json!(keys)),
        Err(e) => GatewayError::persistence("Failed to list API keys", e).into_parts(),
    }
}

/// Create a chatbot owned by the oldest user from the builder form fields.
pub async fn create_chatbot_inner(store: &dyn Store, form: ChatbotForm) -> (StatusCode, Value) {
    let Some(name) = form.name else {
        return GatewayError::UnsupportedMediaType(
            "Only multipart/form-data supported for now".to_string(),
        )
        .into_parts();
    };

    let faqs = match form.faqs.as_deref().map(str::trim) {
        None | Some("") => Vec::new(),
        Some(raw) => match serde_json::from_str::<Vec<Value>>(raw) {
            Ok(list) => list,
            Err(e) => {
                return GatewayError::BadRequest(format!("faqs must be a JSON array: {e}"))
                    .into_parts()
            }
        },
    };

    let owner = match store.first_user().await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return GatewayError::BadRequest("No user exists to own the chatbot".to_string())
                .into_parts()
        }
        Err(e) => return GatewayError::persistence("Failed to resolve chatbot owner", e).into_parts(),
    };

    let draft = ChatbotDraft {
        name,
        description: form.description,
        website_url: form.website_url,
        tone: form.tone,
        faqs,
    };

    match onboarding::create_chatbot_from_draft(store, &owner.id, draft).await {
        Ok(created) => (
            StatusCode::OK,
            json!({
                "chatbot_id": created.chatbot.id,
                "embed_script_url": created.embed_script_url,
                "created_at": created.chatbot.created_at,
                "config": created.business_info,
            }),
        ),
        Err(e) => GatewayError::persistence("Failed to create chatbot", e).into_parts(),
    }
}

/// Generated reply for the embeddable widget. Generation failures never
/// change the status; they turn into a canned reply.
pub async fn respond_inner(state: &HttpState, req: RespondRequest) -> (StatusCode, Value) {
    let chatbot = match state.store().get_chatbot(&req.chatbot_id).await {
        Ok(Some(c)) => c,
        Ok(None) => return GatewayError::NotFound("Chatbot").into_parts(),
        Err(e) => return GatewayError::persistence("Failed to load chatbot", e).into_parts(),
    };

    let text = req.message.trim();
    if text.is_empty() {
        return (
            StatusCode::OK,
            json!(RespondResponse {
                reply: EMPTY_MESSAGE_REPLY.to_string()
            }),
        );
    }

    let prompt = build_prompt(&chatbot, text);
    let reply = state.generator.reply(&prompt).await;
    (StatusCode::OK, json!(RespondResponse { reply }))
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn root_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(root_inner()))
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(health_inner()))
}

pub async fn db_status_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = db_status_inner(state.store()).await;
    (status, Json(body))
}

pub async fn query_handler(
    State(state): State<Arc<HttpState>>,
    Path(chatbot_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    // Raw bytes: the credential is checked before the body is parsed, and
    // the body is JSON whatever its content type says.
    let (status, body) = query_inner(&state.auth, &chatbot_id, &headers, &body).await;
    (status, Json(body))
}

pub async fn save_details_handler(
    State(state): State<Arc<HttpState>>,
    Path(user_id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let (status, body) = save_details_inner(&state.auth, &user_id, &body).await;
    (status, Json(body))
}

pub async fn get_context_handler(
    State(state): State<Arc<HttpState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = get_context_inner(&state.auth, &user_id).await;
    (status, Json(body))
}

pub async fn update_context_handler(
    State(state): State<Arc<HttpState>>,
    Path(user_id): Path<String>,
    Query(params): Query<ContextUpdateParams>,
) -> impl IntoResponse {
    let (status, body) = update_context_inner(&state.auth, &user_id, &params.context_data).await;
    (status, Json(body))
}

pub async fn list_users_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = list_users_inner(state.store()).await;
    (status, Json(body))
}

pub async fn get_user_handler(
    State(state): State<Arc<HttpState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = get_user_inner(state.store(), &user_id).await;
    (status, Json(body))
}

pub async fn user_chatbots_handler(
    State(state): State<Arc<HttpState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = list_chatbots_inner(state.store(), Some(&user_id)).await;
    (status, Json(body))
}

pub async fn list_chatbots_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = list_chatbots_inner(state.store(), None).await;
    (status, Json(body))
}

pub async fn get_chatbot_handler(
    State(state): State<Arc<HttpState>>,
    Path(chatbot_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = get_chatbot_inner(state.store(), &chatbot_id).await;
    (status, Json(body))
}

pub async fn chatbot_keys_handler(
    State(state): State<Arc<HttpState>>,
    Path(chatbot_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = chatbot_keys_inner(state.store(), &chatbot_id).await;
    (status, Json(body))
}

pub async fn create_chatbot_handler(
    State(state): State<Arc<HttpState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> impl IntoResponse {
    let form = match multipart {
        Ok(m) => read_chatbot_form(m).await,
        Err(_) => Err(GatewayError::UnsupportedMediaType(
            "Only multipart/form-data supported for now".to_string(),
        )),
    };
    let (status, body) = match form {
        Ok(form) => create_chatbot_inner(state.store(), form).await,
        Err(e) => e.into_parts(),
    };
    (status, Json(body))
}

pub async fn respond_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<RespondRequest>,
) -> impl IntoResponse {
    let (status, body) = respond_inner(&state, req).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// Collect the builder form's text fields.
pub async fn read_chatbot_form(mut multipart: Multipart) -> Result<ChatbotForm, GatewayError> {
    let malformed = |e: axum::extract::multipart::MultipartError| {
        GatewayError::BadRequest(format!("Malformed multipart body: {e}"))
    };

    let mut form = ChatbotForm::default();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let field_name = field.name().unwrap_or_default().to_string();
        let slot = match field_name.as_str() {
            "name" => &mut form.name,
            "description" => &mut form.description,
            "website_url" => &mut form.website_url,
            "tone" => &mut form.tone,
            "faqs" => &mut form.faqs,
            _ => {
                // knowledge_files and anything else: drain and ignore
                field.bytes().await.map_err(malformed)?;
                continue;
            }
        };
        *slot = Some(field.text().await.map_err(malformed)?);
    }
    Ok(form)
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
