//! Call session state machine
//!
//! The lifecycle is a tagged state plus a pure [`transition`] function.
//! Transport callbacks and user controls are both just [`LifecycleInput`]s;
//! the function returns the next state and the [`Effect`]s the session must
//! run, and touches nothing itself.
//!
//! ```text
//!   Idle ──Start──▶ Connecting ──CallStarted──▶ Connected ◀─┐ SpeechStarted/
//!    ▲                 │    │                     │   │     │ SpeechEnded
//!    │             Failed  CallEnded          Failed  └─────┘
//!  Ended/Error ◀───────┴────┴─────────────────────┴── CallEnded
//!       │
//!       └──Start──▶ Connecting
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use voice_session_core::Role;

/// Coarse call status exposed to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    Ended,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Idle => "idle",
            CallStatus::Connecting => "connecting",
            CallStatus::Connected => "connected",
            CallStatus::Ended => "ended",
            CallStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full call state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CallState {
    /// No call has been placed yet
    #[default]
    Idle,
    /// Transport start issued, waiting for `call-start`
    Connecting {
        /// User asked to hang up before the call connected
        stop_requested: bool,
    },
    /// Call is live
    Connected {
        /// A speaker is currently talking
        speaking: bool,
        /// Hang-up issued, waiting for `call-end`
        stop_requested: bool,
    },
    /// Call finished normally
    Ended,
    /// Call aborted by a transport failure
    Error { message: String },
}

impl CallState {
    pub fn status(&self) -> CallStatus {
        match self {
            CallState::Idle => CallStatus::Idle,
            CallState::Connecting { .. } => CallStatus::Connecting,
            CallState::Connected { .. } => CallStatus::Connected,
            CallState::Ended => CallStatus::Ended,
            CallState::Error { .. } => CallStatus::Error,
        }
    }

    /// A call is in flight (connecting or connected)
    pub fn is_active(&self) -> bool {
        matches!(self, CallState::Connecting { .. } | CallState::Connected { .. })
    }

    /// Transcript events are only reconciled on a live call
    pub fn accepts_transcripts(&self) -> bool {
        matches!(self, CallState::Connected { .. })
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self, CallState::Connected { speaking: true, .. })
    }
}

/// Inputs that drive the lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleInput {
    /// User requested a call
    Start,
    /// User requested hang-up
    Stop,
    /// Transport reported `call-start`
    CallStarted,
    /// Transport reported `call-end`
    CallEnded,
    /// A speaker started talking
    SpeechStarted { role: Role },
    /// A speaker stopped talking; `None` covers every role
    SpeechEnded { role: Option<Role> },
    /// Transport failure
    Failed { message: String },
}

impl LifecycleInput {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleInput::Start => "start",
            LifecycleInput::Stop => "stop",
            LifecycleInput::CallStarted => "call-start",
            LifecycleInput::CallEnded => "call-end",
            LifecycleInput::SpeechStarted { .. } => "speech-start",
            LifecycleInput::SpeechEnded { .. } => "speech-end",
            LifecycleInput::Failed { .. } => "error",
        }
    }
}

/// Work the session performs after a transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Fresh session id, empty buffers, dedup guard and log
    BeginSession,
    /// Clear buffers and dedup guard without emitting partials
    ResetSession,
    /// Ask the transport to connect
    StartTransport,
    /// Ask the transport to hang up
    StopTransport,
    /// Drop the in-progress text of one role
    ClearBuffer(Role),
    /// Secondary completion for one role, or all when `None`
    FlushPending(Option<Role>),
    /// Hand the full transcript to `on_call_end`, then clear it
    DeliverTranscript,
    /// Clear the transcript without delivering it
    DiscardTranscript,
    /// Expose a failure message
    ReportError(String),
}

/// Result of a successful transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: CallState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: CallState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }
}

/// Rejected transitions
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A call is already {0}")]
    AlreadyActive(CallStatus),

    #[error("Invalid transition from {from} on {input}")]
    Invalid {
        from: CallStatus,
        input: &'static str,
    },
}

/// Compute the next state for `input`
pub fn transition(state: &CallState, input: &LifecycleInput) -> Result<Transition, TransitionError> {
    use CallState::*;
    use LifecycleInput as In;

    let transition = match (state, input) {
        (Idle | Ended | Error { .. }, In::Start) => Transition::to(
            Connecting {
                stop_requested: false,
            },
            vec![Effect::BeginSession, Effect::StartTransport],
        ),
        (Connecting { .. } | Connected { .. }, In::Start) => {
            return Err(TransitionError::AlreadyActive(state.status()));
        },

        (Connecting { .. }, In::Stop) => Transition::to(
            Connecting {
                stop_requested: true,
            },
            vec![Effect::StopTransport],
        ),
        (Connected { speaking, .. }, In::Stop) => Transition::to(
            Connected {
                speaking: *speaking,
                stop_requested: true,
            },
            vec![Effect::StopTransport],
        ),

        // Transport connected after a hang-up was requested: hang up again
        (
            Connecting {
                stop_requested: true,
            },
            In::CallStarted,
        ) => Transition::to(
            Connecting {
                stop_requested: true,
            },
            vec![Effect::StopTransport],
        ),
        (
            Connecting {
                stop_requested: false,
            },
            In::CallStarted,
        ) => Transition::to(
            Connected {
                speaking: false,
                stop_requested: false,
            },
            vec![Effect::ResetSession],
        ),

        (Connected { stop_requested, .. }, In::SpeechStarted { role }) => Transition::to(
            Connected {
                speaking: true,
                stop_requested: *stop_requested,
            },
            vec![Effect::ClearBuffer(*role)],
        ),
        (Connected { stop_requested, .. }, In::SpeechEnded { role }) => Transition::to(
            Connected {
                speaking: false,
                stop_requested: *stop_requested,
            },
            vec![Effect::FlushPending(*role)],
        ),

        (Connecting { .. } | Connected { .. }, In::CallEnded) => Transition::to(
            Ended,
            vec![Effect::ResetSession, Effect::DeliverTranscript],
        ),
        (Connecting { .. } | Connected { .. }, In::Failed { message }) => Transition::to(
            Error {
                message: message.clone(),
            },
            vec![
                Effect::ResetSession,
                Effect::DiscardTranscript,
                Effect::ReportError(message.clone()),
            ],
        ),

        _ => {
            return Err(TransitionError::Invalid {
                from: state.status(),
                input: input.name(),
            });
        },
    };

    Ok(transition)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> CallState {
        CallState::Connected {
            speaking: false,
            stop_requested: false,
        }
    }

    fn apply(state: &CallState, input: LifecycleInput) -> Transition {
        transition(state, &input).unwrap()
    }

    #[test]
    fn test_start_from_resting_states() {
        let resting = [
            CallState::Idle,
            CallState::Ended,
            CallState::Error {
                message: "boom".into(),
            },
        ];

        for state in resting {
            let t = apply(&state, LifecycleInput::Start);
            assert_eq!(t.next.status(), CallStatus::Connecting);
            assert_eq!(t.effects, vec![Effect::BeginSession, Effect::StartTransport]);
        }
    }

    #[test]
    fn test_start_rejected_while_active() {
        let err = transition(&connected(), &LifecycleInput::Start).unwrap_err();
        assert_eq!(err, TransitionError::AlreadyActive(CallStatus::Connected));

        let connecting = CallState::Connecting {
            stop_requested: false,
        };
        assert!(transition(&connecting, &LifecycleInput::Start).is_err());
    }

    #[test]
    fn test_call_started_connects_and_resets() {
        let t = apply(
            &CallState::Connecting {
                stop_requested: false,
            },
            LifecycleInput::CallStarted,
        );
        assert_eq!(t.next, connected());
        assert_eq!(t.effects, vec![Effect::ResetSession]);
    }

    #[test]
    fn test_call_started_after_stop_reissues_stop() {
        let stopping = CallState::Connecting {
            stop_requested: true,
        };
        let t = apply(&stopping, LifecycleInput::CallStarted);
        assert_eq!(t.next, stopping);
        assert_eq!(t.effects, vec![Effect::StopTransport]);

        let t = apply(&t.next, LifecycleInput::CallEnded);
        assert_eq!(t.next, CallState::Ended);
    }

    #[test]
    fn test_speaking_flag() {
        let t = apply(
            &connected(),
            LifecycleInput::SpeechStarted { role: Role::Agent },
        );
        assert!(t.next.is_speaking());
        assert_eq!(t.effects, vec![Effect::ClearBuffer(Role::Agent)]);

        let t = apply(&t.next, LifecycleInput::SpeechEnded { role: None });
        assert!(!t.next.is_speaking());
        assert_eq!(t.effects, vec![Effect::FlushPending(None)]);
    }

    #[test]
    fn test_stop_keeps_call_until_acknowledged() {
        let t = apply(&connected(), LifecycleInput::Stop);
        assert_eq!(t.next.status(), CallStatus::Connected);
        assert_eq!(t.effects, vec![Effect::StopTransport]);

        let t = apply(&t.next, LifecycleInput::CallEnded);
        assert_eq!(t.next, CallState::Ended);
        assert_eq!(
            t.effects,
            vec![Effect::ResetSession, Effect::DeliverTranscript]
        );
    }

    #[test]
    fn test_failure_from_connecting() {
        let t = apply(
            &CallState::Connecting {
                stop_requested: false,
            },
            LifecycleInput::Failed {
                message: "ws closed".into(),
            },
        );
        assert_eq!(t.next.status(), CallStatus::Error);
        assert!(!t.next.is_active());
        assert!(!t.effects.contains(&Effect::DeliverTranscript));
        assert!(t.effects.contains(&Effect::ReportError("ws closed".into())));
    }

    #[test]
    fn test_invalid_transitions() {
        let cases = [
            (CallState::Idle, LifecycleInput::Stop),
            (CallState::Idle, LifecycleInput::CallEnded),
            (CallState::Ended, LifecycleInput::CallStarted),
            (connected(), LifecycleInput::CallStarted),
            (
                CallState::Connecting {
                    stop_requested: false,
                },
                LifecycleInput::SpeechEnded { role: None },
            ),
            (
                CallState::Error {
                    message: "x".into(),
                },
                LifecycleInput::Failed {
                    message: "y".into(),
                },
            ),
        ];

        for (state, input) in cases {
            assert!(
                matches!(
                    transition(&state, &input),
                    Err(TransitionError::Invalid { .. })
                ),
                "{:?} on {:?} should be invalid",
                state,
                input
            );
        }
    }

    #[test]
    fn test_transcripts_gated_on_connected() {
        assert!(connected().accepts_transcripts());
        assert!(!CallState::Idle.accepts_transcripts());
        assert!(!CallState::Connecting {
            stop_requested: false
        }
        .accepts_transcripts());
    }
}
