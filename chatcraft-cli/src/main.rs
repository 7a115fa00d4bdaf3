//! chatcraft-cli: smoke-test client for the ChatCraft HTTP API
//!
//! # Subcommands
//! - `status`                                           show health and row counts
//! - `query <chatbot> <message> --api-key <key> [...]`  authenticated query
//! - `respond <chatbot> <message>`                      generated widget reply
//! - `context <user>`                                   aggregated user context

use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "chatcraft-cli",
    version,
    about = "Smoke-test client for the ChatCraft chatbot backend"
)]
struct Cli {
    /// ChatCraft HTTP server URL (overrides CHATCRAFT_HTTP_URL env var)
    #[arg(long, env = "CHATCRAFT_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show server health and table counts
    Status,

    /// Send an authenticated query to a chatbot
    Query {
        chatbot_id: String,
        message: String,

        /// Value sent in the X-API-Key header
        #[arg(long, env = "CHATCRAFT_API_KEY")]
        api_key: String,

        /// Conversation context to store with the query
        #[arg(long)]
        context: Option<String>,

        /// User details as a JSON object, e.g. '{"company":"Acme"}'
        #[arg(long)]
        details: Option<String>,
    },

    /// Ask a chatbot for a generated reply
    Respond { chatbot_id: String, message: String },

    /// Print the aggregated context for a user
    Context { user_id: String },
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DbStatus {
    pub status: String,
    pub tables: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondReply {
    pub reply: String,
}

// ============================================================================
// Request building
// ============================================================================

/// Build the `/chatbot/{id}/query` body from CLI flags.
pub fn build_query_body(
    message: &str,
    context: Option<&str>,
    details: Option<&str>,
) -> anyhow::Result<Value> {
    let mut body = json!({ "message": message });
    if let Some(ctx) = context {
        body["context"] = json!(ctx);
    }
    if let Some(raw) = details {
        let parsed: Value = serde_json::from_str(raw)
            .map_err(|e| anyhow::anyhow!("--details is not valid JSON: {}", e))?;
        if !parsed.is_object() {
            anyhow::bail!("--details must be a JSON object");
        }
        body["user_details"] = parsed;
    }
    Ok(body)
}

/// One-line summary of a `/db-status` payload.
pub fn format_db_status(status: &DbStatus) -> String {
    match (&status.tables, &status.error) {
        (Some(tables), _) => {
            let count = |name: &str| tables[name].as_i64().unwrap_or(0);
            format!(
                "{}: users={} chatbots={} api_keys={} user_sessions={}",
                status.status,
                count("users"),
                count("chatbots"),
                count("api_keys"),
                count("user_sessions")
            )
        }
        (None, Some(err)) => format!("{}: {}", status.status, err),
        (None, None) => status.status.clone(),
    }
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send a request and return the JSON body, exiting on transport or HTTP errors.
fn send_json(req: reqwest::blocking::RequestBuilder, url: &str) -> anyhow::Result<Value> {
    let resp = match req.send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("chatcraft-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("chatcraft-cli: server returned {}: {}", status, body);
        std::process::exit(1);
    }

    Ok(resp.json()?)
}

fn do_status(server: &str) -> anyhow::Result<()> {
    let http = client(10)?;

    let url = format!("{}/health", server);
    let health = send_json(http.get(&url), &url)?;
    println!(
        "ChatCraft server: {}",
        health["status"].as_str().unwrap_or("unknown")
    );

    let url = format!("{}/db-status", server);
    let db: DbStatus = serde_json::from_value(send_json(http.get(&url), &url)?)?;
    println!("Database:         {}", format_db_status(&db));
    Ok(())
}

fn do_query(
    server: &str,
    chatbot_id: &str,
    message: &str,
    api_key: &str,
    context: Option<&str>,
    details: Option<&str>,
) -> anyhow::Result<()> {
    let body = build_query_body(message, context, details)?;
    let url = format!("{}/chatbot/{}/query", server, chatbot_id);
    let req = client(30)?
        .post(&url)
        .header("X-API-Key", api_key)
        .json(&body);
    let resp = send_json(req, &url)?;
    println!("{}", serde_json::to_string_pretty(&resp)?);
    Ok(())
}

fn do_respond(server: &str, chatbot_id: &str, message: &str) -> anyhow::Result<()> {
    let url = format!("{}/chatbot/respond", server);
    let req = client(60)?
        .post(&url)
        .json(&json!({ "chatbot_id": chatbot_id, "message": message }));
    let reply: RespondReply = serde_json::from_value(send_json(req, &url)?)?;
    println!("{}", reply.reply);
    Ok(())
}

fn do_context(server: &str, user_id: &str) -> anyhow::Result<()> {
    let url = format!("{}/users/{}/context", server, user_id);
    let ctx = send_json(client(10)?.get(&url), &url)?;
    if ctx.as_object().map_or(true, |m| m.is_empty()) {
        eprintln!("No context for user: {}", user_id);
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&ctx)?);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Status => do_status(&server),
        Commands::Query {
            chatbot_id,
            message,
            api_key,
            context,
            details,
        } => do_query(
            &server,
            &chatbot_id,
            &message,
            &api_key,
            context.as_deref(),
            details.as_deref(),
        ),
        Commands::Respond { chatbot_id, message } => do_respond(&server, &chatbot_id, &message),
        Commands::Context { user_id } => do_context(&server, &user_id),
    };

    if let Err(e) = result {
        eprintln!("chatcraft-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
