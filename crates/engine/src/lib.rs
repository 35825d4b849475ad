//! Voice session engine
//!
//! Turns a live voice transport stream (partial speech-to-text updates,
//! speaker boundaries, call lifecycle signals) into a de-duplicated sequence
//! of completed turns for a text chat surface.
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌──────────────┐   ┌─────────────┐
//! │  Upstream  │──▶│ Transcript  │──▶│     Turn     │──▶│  Dispatch   │──▶ callbacks
//! │   events   │   │   Buffer    │   │  Reconciler  │   │   Bridge    │
//! └────────────┘   └─────────────┘   └──────────────┘   └─────────────┘
//!        │                 ▲                 ▲                 ▲
//!        └──────▶ Call Session State Machine (gates and resets) ─┘
//! ```
//!
//! Everything runs synchronously on the caller's stack. Start/stop requests
//! to the transport are fire-and-forget; their outcome arrives later as
//! upstream events.

pub mod buffer;
pub mod dispatch;
pub mod error;
pub mod reconciler;
pub mod session;
pub mod state;
pub mod transport;

pub use buffer::TranscriptBuffer;
pub use dispatch::{CallEndCallback, DispatchBridge, TextCallback, TurnCallbacks};
pub use error::SessionError;
pub use reconciler::{Reconciliation, SuppressReason, TurnReconciler};
pub use session::{CallEngine, ToggleAction};
pub use state::{transition, CallState, CallStatus, Effect, LifecycleInput, Transition, TransitionError};
pub use transport::{StartRequest, TransportError, VoiceTransport};

pub use voice_session_config::{Credentials, Settings};
pub use voice_session_core::{Role, TranscriptEvent, TranscriptMessage, UpstreamEvent};
