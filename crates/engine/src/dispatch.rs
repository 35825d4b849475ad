//! Turn dispatch bridge
//!
//! The only place callbacks fire. Owns the ordered transcript log of the
//! current call.

use std::collections::HashMap;

use voice_session_core::{Role, TranscriptMessage};

/// Callback receiving utterance text
pub type TextCallback = Box<dyn FnMut(&str) + Send>;

/// Callback receiving the full call transcript
pub type CallEndCallback = Box<dyn FnMut(&[TranscriptMessage]) + Send>;

/// Callback contract consumed by the chat surface; every slot is optional
#[derive(Default)]
pub struct TurnCallbacks {
    on_user_message: Option<TextCallback>,
    on_agent_message: Option<TextCallback>,
    on_user_turn_complete: Option<TextCallback>,
    on_agent_turn_complete: Option<TextCallback>,
    on_call_end: Option<CallEndCallback>,
}

impl TurnCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live user transcript, once per distinct content
    pub fn on_user_message(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_user_message = Some(Box::new(f));
        self
    }

    /// Live agent transcript, once per distinct content
    pub fn on_agent_message(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_agent_message = Some(Box::new(f));
        self
    }

    pub fn on_user_turn_complete(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_user_turn_complete = Some(Box::new(f));
        self
    }

    pub fn on_agent_turn_complete(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_agent_turn_complete = Some(Box::new(f));
        self
    }

    /// Full ordered transcript, once per ended call
    pub fn on_call_end(
        mut self,
        f: impl FnMut(&[TranscriptMessage]) + Send + 'static,
    ) -> Self {
        self.on_call_end = Some(Box::new(f));
        self
    }

    fn message_slot(&mut self, role: Role) -> Option<&mut TextCallback> {
        match role {
            Role::User => self.on_user_message.as_mut(),
            Role::Agent => self.on_agent_message.as_mut(),
        }
    }

    fn complete_slot(&mut self, role: Role) -> Option<&mut TextCallback> {
        match role {
            Role::User => self.on_user_turn_complete.as_mut(),
            Role::Agent => self.on_agent_turn_complete.as_mut(),
        }
    }
}

impl std::fmt::Debug for TurnCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnCallbacks")
            .field("on_user_message", &self.on_user_message.is_some())
            .field("on_agent_message", &self.on_agent_message.is_some())
            .field("on_user_turn_complete", &self.on_user_turn_complete.is_some())
            .field("on_agent_turn_complete", &self.on_agent_turn_complete.is_some())
            .field("on_call_end", &self.on_call_end.is_some())
            .finish()
    }
}

/// Fans reconciled output out to callbacks and keeps the call transcript
#[derive(Debug)]
pub struct DispatchBridge {
    callbacks: TurnCallbacks,
    log: Vec<TranscriptMessage>,
    /// Last live text forwarded per role
    last_partial: HashMap<Role, String>,
}

impl DispatchBridge {
    pub fn new(callbacks: TurnCallbacks) -> Self {
        Self {
            callbacks,
            log: Vec::new(),
            last_partial: HashMap::new(),
        }
    }

    /// Forward live buffer content.
    ///
    /// Empty text and a repeat of the last forwarded text for the role are
    /// skipped. Returns whether the callback slot was reached.
    pub fn partial(&mut self, role: Role, text: &str) -> bool {
        if text.trim().is_empty() || self.last_partial.get(&role).map(String::as_str) == Some(text) {
            return false;
        }

        self.last_partial.insert(role, text.to_string());
        if let Some(callback) = self.callbacks.message_slot(role) {
            callback(text);
        }
        true
    }

    /// Append a completed turn and notify the role's completion callback
    pub fn complete(&mut self, role: Role, text: String) -> &TranscriptMessage {
        let sequence = self.log.len() as u64 + 1;
        self.last_partial.remove(&role);

        if let Some(callback) = self.callbacks.complete_slot(role) {
            callback(&text);
        }

        self.log.push(TranscriptMessage::new(role, text, sequence));
        &self.log[self.log.len() - 1]
    }

    /// Deliver the transcript to `on_call_end` and clear it.
    ///
    /// Returns the number of turns delivered.
    pub fn end_call(&mut self) -> usize {
        let delivered = self.log.len();
        if let Some(callback) = self.callbacks.on_call_end.as_mut() {
            callback(&self.log);
        }
        self.discard();
        delivered
    }

    /// Clear the transcript and live-text memory without notifying anyone
    pub fn discard(&mut self) {
        self.log.clear();
        self.last_partial.clear();
    }

    /// Forget forwarded live text for one role, so a new utterance that
    /// starts with the same words is shown again
    pub fn reset_partial(&mut self, role: Role) {
        self.last_partial.remove(&role);
    }

    pub fn reset_partials(&mut self) {
        self.last_partial.clear();
    }

    pub fn transcript(&self) -> &[TranscriptMessage] {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Calls = Arc<Mutex<Vec<String>>>;

    fn recorder() -> (Calls, impl FnMut(&str) + Send + 'static) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        (calls, move |text: &str| sink.lock().push(text.to_string()))
    }

    #[test]
    fn test_partial_fires_once_per_distinct_content() {
        let (user, on_user) = recorder();
        let mut bridge = DispatchBridge::new(TurnCallbacks::new().on_user_message(on_user));

        assert!(bridge.partial(Role::User, "book"));
        assert!(!bridge.partial(Role::User, "book"));
        assert!(bridge.partial(Role::User, "book a"));
        assert!(!bridge.partial(Role::User, "  "));

        assert_eq!(*user.lock(), vec!["book", "book a"]);
    }

    #[test]
    fn test_complete_assigns_sequence_and_routes_by_role() {
        let (user, on_user) = recorder();
        let (agent, on_agent) = recorder();
        let mut bridge = DispatchBridge::new(
            TurnCallbacks::new()
                .on_user_turn_complete(on_user)
                .on_agent_turn_complete(on_agent),
        );

        assert_eq!(bridge.complete(Role::Agent, "Hi, how can I help?".into()).sequence, 1);
        assert_eq!(bridge.complete(Role::User, "Book a flight".into()).sequence, 2);

        assert_eq!(*agent.lock(), vec!["Hi, how can I help?"]);
        assert_eq!(*user.lock(), vec!["Book a flight"]);
        assert_eq!(bridge.transcript().len(), 2);
    }

    #[test]
    fn test_completion_resets_partial_memory() {
        let (live, on_live) = recorder();
        let mut bridge = DispatchBridge::new(TurnCallbacks::new().on_user_message(on_live));

        bridge.partial(Role::User, "yes");
        bridge.complete(Role::User, "yes".into());
        bridge.partial(Role::User, "yes");

        assert_eq!(*live.lock(), vec!["yes", "yes"]);
    }

    #[test]
    fn test_end_call_delivers_ordered_log_once() {
        let delivered: Arc<Mutex<Vec<Vec<TranscriptMessage>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        let mut bridge = DispatchBridge::new(
            TurnCallbacks::new().on_call_end(move |log| sink.lock().push(log.to_vec())),
        );

        bridge.complete(Role::Agent, "Hello".into());
        bridge.complete(Role::User, "Hi".into());
        assert_eq!(bridge.end_call(), 2);

        let delivered = delivered.lock();
        assert_eq!(delivered.len(), 1);
        let contents: Vec<_> = delivered[0].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["Hello", "Hi"]);
        assert!(bridge.transcript().is_empty());
    }

    #[test]
    fn test_missing_callbacks_are_noops() {
        let mut bridge = DispatchBridge::new(TurnCallbacks::new());
        assert!(bridge.partial(Role::Agent, "Hel"));
        bridge.complete(Role::Agent, "Hello".into());
        assert_eq!(bridge.end_call(), 1);
    }
}
