//! Core types for the voice session engine
//!
//! This crate provides the types every other crate speaks:
//! - Speaker roles and emitted transcript messages
//! - Normalized upstream transport events
//! - Error types

pub mod conversation;
pub mod error;
pub mod event;

pub use conversation::{Role, TranscriptMessage};
pub use error::{EventError, Result};
pub use event::{normalize_finality, TranscriptEvent, UpstreamEvent};
