// ABOUTME: defines the application-wide error type shared across all haven modules.
// ABOUTME: external failures convert into variants here so callers match one enum.

#[derive(Debug, thiserror::Error)]
pub enum HavenError {
    #[error("config error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("integration error: {0}")]
    Integration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<haven_consent::ConsentError> for HavenError {
    fn from(err: haven_consent::ConsentError) -> Self {
        HavenError::Config(err.to_string())
    }
}
