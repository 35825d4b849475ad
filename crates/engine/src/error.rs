//! Session error types

use thiserror::Error;
use voice_session_core::EventError;

use crate::state::TransitionError;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Voice calls are not configured: {0}")]
    ConfigurationMissing(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Malformed event: {0}")]
    MalformedEvent(#[from] EventError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SessionError {
    /// Check if the error leaves the session untouched
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::Transition(_) | Self::MalformedEvent(_))
    }
}
