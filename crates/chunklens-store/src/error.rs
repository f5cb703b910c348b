#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid timestamp {0:?}")]
    Timestamp(String),

    #[error("store lock poisoned: {0}")]
    Lock(String),
}
