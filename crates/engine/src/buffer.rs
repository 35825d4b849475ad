//! Per-role transcript buffer
//!
//! Holds the latest in-progress utterance for each speaker. Upstream sends
//! cumulative text, so every update replaces what was stored.

use std::collections::HashMap;

use voice_session_core::Role;

/// One live pending-text slot per role
#[derive(Debug, Default, Clone)]
pub struct TranscriptBuffer {
    pending: HashMap<Role, String>,
}

impl TranscriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending text for `role`.
    ///
    /// Returns `true` when the stored content changed. Empty text is stored
    /// like any other value and reads back as nothing pending.
    pub fn update(&mut self, role: Role, text: &str) -> bool {
        let previous = self.pending.get(&role).map(String::as_str).unwrap_or("");
        if previous == text {
            return false;
        }

        self.pending.insert(role, text.to_string());
        true
    }

    /// Trimmed pending text for `role`, if any
    pub fn pending(&self, role: Role) -> Option<&str> {
        self.pending
            .get(&role)
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
    }

    /// Roles holding non-empty pending text, in [`Role::ALL`] order
    pub fn pending_roles(&self) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| self.pending(*role).is_some())
            .collect()
    }

    /// Clear one role, returning what was pending
    pub fn clear(&mut self, role: Role) -> Option<String> {
        self.pending.remove(&role).filter(|text| !text.trim().is_empty())
    }

    pub fn clear_all(&mut self) {
        self.pending.clear();
    }

    /// Check if no role has pending text
    pub fn is_empty(&self) -> bool {
        self.pending_roles().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_overwrites_cumulative_text() {
        let mut buffer = TranscriptBuffer::new();

        assert!(buffer.update(Role::User, "book"));
        assert!(buffer.update(Role::User, "book a flight"));
        assert_eq!(buffer.pending(Role::User), Some("book a flight"));
        assert_eq!(buffer.pending(Role::Agent), None);
    }

    #[test]
    fn test_identical_update_reports_no_change() {
        let mut buffer = TranscriptBuffer::new();

        assert!(buffer.update(Role::Agent, "Hello"));
        assert!(!buffer.update(Role::Agent, "Hello"));
        assert!(buffer.update(Role::Agent, "Hello "));
    }

    #[test]
    fn test_empty_text_is_noop_utterance() {
        let mut buffer = TranscriptBuffer::new();

        assert!(!buffer.update(Role::User, ""));
        assert!(buffer.is_empty());

        buffer.update(Role::User, "   ");
        assert_eq!(buffer.pending(Role::User), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clear_single_and_all() {
        let mut buffer = TranscriptBuffer::new();
        buffer.update(Role::User, "yes please");
        buffer.update(Role::Agent, "Great");

        assert_eq!(buffer.pending_roles(), vec![Role::User, Role::Agent]);
        assert_eq!(buffer.clear(Role::User), Some("yes please".to_string()));
        assert_eq!(buffer.pending_roles(), vec![Role::Agent]);

        buffer.clear_all();
        assert!(buffer.is_empty());
        assert_eq!(buffer.clear(Role::Agent), None);
    }
}
