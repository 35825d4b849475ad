//! Error types shared across the voice session crates

use thiserror::Error;

/// Reasons an upstream payload could not be normalized.
///
/// Every variant is a malformed event: the payload is dropped and the call
/// state is left untouched.
#[derive(Error, Debug)]
pub enum EventError {
    #[error("Event payload is not a JSON object")]
    NotAnObject,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown speaker role: {0}")]
    InvalidRole(String),

    #[error("Finality field {0} is not a boolean")]
    InvalidFinality(&'static str),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EventError>;
