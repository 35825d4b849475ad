//! Call engine
//!
//! Explicitly owned session object. It is the only thing that mutates the
//! call state, the reconciler and the transcript log; every upstream event
//! and user control is applied synchronously on the caller's stack.

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use voice_session_config::{Credentials, Settings};
use voice_session_core::{Role, TranscriptEvent, TranscriptMessage, UpstreamEvent};

use crate::dispatch::{DispatchBridge, TurnCallbacks};
use crate::error::SessionError;
use crate::reconciler::{Reconciliation, TurnReconciler};
use crate::state::{transition, CallState, CallStatus, Effect, LifecycleInput};
use crate::transport::{StartRequest, VoiceTransport};

const MISSING_CREDENTIALS: &str = "transport public key and assistant id are required";

/// What a [`CallEngine::toggle`] call asked the transport to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    StartRequested,
    StopRequested,
}

/// Voice call session: lifecycle, reconciliation and dispatch
#[derive(Debug)]
pub struct CallEngine<T: VoiceTransport> {
    credentials: Option<Credentials>,
    transport: T,
    state: CallState,
    session_id: Option<String>,
    reconciler: TurnReconciler,
    dispatch: DispatchBridge,
    last_error: Option<String>,
}

impl<T: VoiceTransport> CallEngine<T> {
    /// Create an engine; `None` credentials disable the control surface
    pub fn new(credentials: Option<Credentials>, transport: T, callbacks: TurnCallbacks) -> Self {
        Self {
            credentials,
            transport,
            state: CallState::Idle,
            session_id: None,
            reconciler: TurnReconciler::new(),
            dispatch: DispatchBridge::new(callbacks),
            last_error: None,
        }
    }

    /// Create an engine from loaded settings
    pub fn from_settings(settings: &Settings, transport: T, callbacks: TurnCallbacks) -> Self {
        let credentials = match settings.credentials() {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                info!(reason = %e, "Voice calls disabled");
                None
            },
        };
        Self::new(credentials, transport, callbacks)
    }

    /// Start a call when idle, hang up when active
    pub fn toggle(&mut self) -> Result<ToggleAction, SessionError> {
        if self.state.is_active() {
            self.stop()?;
            Ok(ToggleAction::StopRequested)
        } else {
            self.start()?;
            Ok(ToggleAction::StartRequested)
        }
    }

    /// Place a new call.
    ///
    /// Without credentials nothing happens beyond the returned error: the
    /// engine never enters `Connecting`.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.credentials.is_none() {
            warn!("Call start refused: {}", MISSING_CREDENTIALS);
            return Err(SessionError::ConfigurationMissing(MISSING_CREDENTIALS.to_string()));
        }
        self.apply(LifecycleInput::Start)
    }

    /// Request hang-up; the call ends when the transport reports `call-end`
    pub fn stop(&mut self) -> Result<(), SessionError> {
        self.apply(LifecycleInput::Stop)
    }

    /// Parse and apply a raw upstream payload.
    ///
    /// Malformed payloads are logged and dropped without touching state.
    pub fn handle_json(&mut self, raw: &str) -> Result<(), SessionError> {
        match UpstreamEvent::from_json(raw) {
            Ok(event) => {
                self.handle_event(event);
                Ok(())
            },
            Err(e) => {
                warn!(session_id = self.session_label(), error = %e, "Dropping malformed event");
                metrics::counter!("voice_session_malformed_events_total").increment(1);
                Err(SessionError::MalformedEvent(e))
            },
        }
    }

    /// Apply a normalized upstream event
    pub fn handle_event(&mut self, event: UpstreamEvent) {
        let input = match event {
            UpstreamEvent::CallStart => LifecycleInput::CallStarted,
            UpstreamEvent::CallEnd => LifecycleInput::CallEnded,
            UpstreamEvent::SpeechStart { role } => LifecycleInput::SpeechStarted {
                role: role.unwrap_or(Role::Agent),
            },
            UpstreamEvent::SpeechEnd { role } => LifecycleInput::SpeechEnded { role },
            UpstreamEvent::Error { message } => LifecycleInput::Failed { message },
            UpstreamEvent::Transcript(transcript) => {
                self.handle_transcript(transcript);
                return;
            },
            UpstreamEvent::Ignored { kind } => {
                debug!(kind = %kind, "Ignoring upstream event");
                return;
            },
        };

        if let Err(e) = self.apply(input) {
            warn!(
                session_id = self.session_label(),
                status = %self.status(),
                error = %e,
                "Ignoring lifecycle event"
            );
        }
    }

    /// Stop an active call and hand the transport back
    pub fn teardown(mut self) -> T {
        if self.state.is_active() {
            info!(session_id = self.session_label(), "Tearing down active call");
            self.transport.stop();
        }
        self.transport
    }

    pub fn state(&self) -> &CallState {
        &self.state
    }

    pub fn status(&self) -> CallStatus {
        self.state.status()
    }

    /// Check if calls can be placed at all
    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == CallStatus::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.status() == CallStatus::Connecting
    }

    pub fn is_speaking(&self) -> bool {
        self.state.is_speaking()
    }

    /// Message of the failure that ended the last call
    pub fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Completed turns of the current call
    pub fn transcript(&self) -> &[TranscriptMessage] {
        self.dispatch.transcript()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn handle_transcript(&mut self, event: TranscriptEvent) {
        if !self.state.accepts_transcripts() {
            debug!(
                status = %self.status(),
                role = %event.role,
                "Dropping transcript outside a live call"
            );
            return;
        }

        // A re-sent final of an already completed turn is not live text
        let resent = event.is_final
            && self.reconciler.last_emitted(event.role) == Some(event.text.trim());
        if !resent {
            self.dispatch.partial(event.role, &event.text);
        }
        let outcome = self.reconciler.reconcile(&event);
        self.dispatch_outcome(outcome);
    }

    fn dispatch_outcome(&mut self, outcome: Reconciliation) {
        match outcome {
            Reconciliation::Partial { role, changed } => {
                debug!(role = %role, changed, "Partial transcript");
            },
            Reconciliation::Completed { role, text } => {
                let message = self.dispatch.complete(role, text);
                info!(
                    session_id = self.session_id.as_deref().unwrap_or("-"),
                    role = %role,
                    sequence = message.sequence,
                    "Turn completed"
                );
                metrics::counter!("voice_session_turns_completed_total", "role" => role.as_str())
                    .increment(1);
            },
            Reconciliation::Suppressed { role, reason } => {
                debug!(role = %role, reason = ?reason, "Final transcript suppressed");
                metrics::counter!("voice_session_turns_suppressed_total", "role" => role.as_str())
                    .increment(1);
            },
        }
    }

    fn apply(&mut self, input: LifecycleInput) -> Result<(), SessionError> {
        let step = transition(&self.state, &input)?;
        let previous = std::mem::replace(&mut self.state, step.next);

        if previous.status() != self.state.status() {
            info!(
                session_id = self.session_label(),
                from = %previous.status(),
                to = %self.state.status(),
                input = input.name(),
                "Call status changed"
            );
        }

        for effect in step.effects {
            self.run_effect(effect)?;
        }
        Ok(())
    }

    fn run_effect(&mut self, effect: Effect) -> Result<(), SessionError> {
        match effect {
            Effect::BeginSession => {
                self.session_id = Some(Uuid::new_v4().to_string());
                self.last_error = None;
                self.reconciler.reset();
                self.dispatch.discard();
            },
            Effect::ResetSession => {
                self.reconciler.reset();
                self.dispatch.reset_partials();
            },
            Effect::StartTransport => self.start_transport()?,
            Effect::StopTransport => {
                debug!(session_id = self.session_label(), "Requesting transport stop");
                self.transport.stop();
            },
            Effect::ClearBuffer(role) => {
                self.reconciler.clear_buffer(role);
                self.dispatch.reset_partial(role);
            },
            Effect::FlushPending(role) => {
                let roles = match role {
                    Some(role) => vec![role],
                    None => Role::ALL.to_vec(),
                };
                for role in roles {
                    if let Some(outcome) = self.reconciler.flush_role(role) {
                        self.dispatch_outcome(outcome);
                    }
                }
            },
            Effect::DeliverTranscript => {
                let turns = self.dispatch.end_call();
                info!(session_id = self.session_label(), turns, "Call ended");
                metrics::counter!("voice_session_calls_total", "outcome" => "ended").increment(1);
            },
            Effect::DiscardTranscript => self.dispatch.discard(),
            Effect::ReportError(message) => {
                error!(session_id = self.session_label(), error = %message, "Call failed");
                metrics::counter!("voice_session_calls_total", "outcome" => "error").increment(1);
                self.last_error = Some(message);
            },
        }
        Ok(())
    }

    /// A synchronous start failure is treated like an upstream error event
    fn start_transport(&mut self) -> Result<(), SessionError> {
        let (Some(credentials), Some(session_id)) = (&self.credentials, &self.session_id) else {
            return Err(SessionError::ConfigurationMissing(MISSING_CREDENTIALS.to_string()));
        };

        let request = StartRequest {
            session_id,
            public_key: &credentials.public_key,
            assistant_id: &credentials.assistant_id,
        };

        if let Err(e) = self.transport.start(&request) {
            self.apply(LifecycleInput::Failed {
                message: e.to_string(),
            })?;
            return Err(e.into());
        }
        Ok(())
    }

    fn session_label(&self) -> &str {
        self.session_id.as_deref().unwrap_or("-")
    }
}
