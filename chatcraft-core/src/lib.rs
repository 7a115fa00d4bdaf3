pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod models;
pub mod onboarding;
pub mod store;

pub use auth::{AuthService, ExactMatch, KeyDigest};
pub use config::{ChatcraftConfig, StoreBackend};
pub use error::{AuthFailure, ChatcraftError};
pub use generation::{
    build_prompt, FallbackGenerationClient, GeminiGenerationClient, GenerationBackend,
    GenerationError, APOLOGY_REPLY, EMPTY_MESSAGE_REPLY,
};
pub use store::{open_store, MemoryStore, PgStore, Store, TableCounts};
