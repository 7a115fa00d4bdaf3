use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatcraftError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid field '{field}': expected {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Other error: {0}")]
    Other(String),
}

impl ChatcraftError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Why an API key did not authenticate.
#[derive(Error, Debug)]
pub enum AuthFailure {
    #[error("API key not found")]
    NotFound,

    #[error("API key has been revoked")]
    Revoked,

    #[error("API key lookup failed: {0}")]
    Store(#[from] ChatcraftError),
}
