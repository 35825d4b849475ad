//! Voice transport seam
//!
//! The engine never talks to a provider SDK directly. It issues start/stop
//! requests through [`VoiceTransport`] and learns the outcome later from
//! upstream lifecycle events.

use thiserror::Error;

/// Parameters handed to the transport when a call is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartRequest<'a> {
    /// Engine-assigned id of the new call session
    pub session_id: &'a str,
    /// Provider client credential
    pub public_key: &'a str,
    /// Hosted assistant to connect to
    pub assistant_id: &'a str,
}

/// Synchronous transport failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport rejected the request: {0}")]
    Rejected(String),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// Fire-and-forget control of the underlying voice transport
pub trait VoiceTransport {
    /// Begin connecting. Success only means the request was issued;
    /// the call is live once `call-start` arrives.
    fn start(&mut self, request: &StartRequest<'_>) -> Result<(), TransportError>;

    /// Request hang-up. Completion arrives as `call-end`.
    fn stop(&mut self);
}

impl<T: VoiceTransport + ?Sized> VoiceTransport for Box<T> {
    fn start(&mut self, request: &StartRequest<'_>) -> Result<(), TransportError> {
        (**self).start(request)
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}
