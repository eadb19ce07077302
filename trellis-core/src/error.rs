//! Error types for the tracking engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ObserveError>;

#[derive(Debug, Error)]
pub enum ObserveError {
    #[error("field not found: {key}")]
    MissingField { key: String },

    #[error("expected an object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("expected an array, found {found}")]
    NotAnArray { found: &'static str },

    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Raised by a subscriber's read function.
    #[error("read failed: {0}")]
    Read(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ObserveError {
    #[must_use]
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read(message.into())
    }

    pub(crate) fn missing_field(key: &str) -> Self {
        Self::MissingField {
            key: key.to_string(),
        }
    }
}
