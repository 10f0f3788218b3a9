// Error taxonomy for the unlock engine and its persistence collaborator

use thiserror::Error;

pub type Result<T> = std::result::Result<T, UnlockError>;

#[derive(Debug, Error)]
pub enum UnlockError {
    /// A configured row (champion, prototype, reward, zone, collectible) is missing
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// Capture counter would leave the [0, MAX_CAPTURES] range
    #[error("{name} cannot go from {current} to {result} captures (delta {delta})")]
    CaptureOutOfRange {
        name: String,
        current: i64,
        delta: i64,
        result: i64,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UnlockError {
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        UnlockError::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    /// True for configuration/data errors the caller should report as 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, UnlockError::NotFound { .. })
    }
}
