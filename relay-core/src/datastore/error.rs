use thiserror::Error;

/// Storage-tier failures. Kept distinct from [`crate::error::SubmissionError`]
/// so callers can decide their own propagation policy (e.g. a Redis failure
/// after a successful DB write is logged, not fatal).
#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("builder {0} not found")]
    BuilderNotFound(String),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
