use thiserror::Error;

use crate::{classify::FailureCategory, persist::PersistError};

/// Errors a caller of the batch pipeline can see.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("all {attempted} poster generations failed{}", exhausted_hint(.primary))]
    BatchExhausted {
        attempted: usize,
        primary: Option<FailureCategory>,
    },

    #[error("failed to save poster: {0}")]
    Persistence(#[from] PersistError),
}

fn exhausted_hint(primary: &Option<FailureCategory>) -> String {
    match primary {
        Some(category) => format!(": {}", category.describe()),
        None => String::new(),
    }
}

/// Errors from the JSON/PNG file stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid name: {0:?}")]
    InvalidName(String),
}

/// Names become file stems, so keep them to a safe character set.
pub fn validate_name(name: &str) -> Result<&str, StoreError> {
    let trimmed = name.trim();
    let ok = !trimmed.is_empty()
        && trimmed.len() <= 64
        && trimmed.chars().all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ' '));
    if ok { Ok(trimmed) } else { Err(StoreError::InvalidName(name.to_string())) }
}
