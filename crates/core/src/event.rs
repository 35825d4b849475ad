//! Upstream voice transport events
//!
//! Voice providers deliver loosely shaped JSON events. This module is the
//! adapter boundary: it turns each payload into a typed [`UpstreamEvent`]
//! and collapses the provider-specific finality fields into one boolean, so
//! downstream reconciliation never has to know which spelling was used.
//!
//! Accepted shapes:
//!
//! ```text
//! {"type": "call-start"}
//! {"type": "speech-end", "role": "assistant"}
//! {"type": "message", "message": {"type": "transcript", "role": "user",
//!                                 "transcript": "book a flight", "isFinal": true}}
//! {"type": "message", "role": "user", "transcript": "book", "final": false}
//! {"type": "error", "error": {"message": "socket closed"}}
//! ```

use serde_json::{Map, Value};

use crate::conversation::Role;
use crate::error::EventError;

/// Boolean finality spellings seen across providers
const FINALITY_FIELDS: [&str; 3] = ["final", "isFinal", "is_final"];

/// String finality field (`"final"` / `"partial"`)
const TRANSCRIPT_TYPE_FIELD: &str = "transcriptType";

const DEFAULT_ERROR_MESSAGE: &str = "unknown transport error";

/// A normalized transcript update for one speaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    pub role: Role,
    /// Cumulative text of the current utterance (not a delta)
    pub text: String,
    /// Upstream will not revise this text any further
    pub is_final: bool,
}

impl TranscriptEvent {
    pub fn new(role: Role, text: impl Into<String>, is_final: bool) -> Self {
        Self {
            role,
            text: text.into(),
            is_final,
        }
    }

    pub fn partial(role: Role, text: impl Into<String>) -> Self {
        Self::new(role, text, false)
    }

    pub fn final_text(role: Role, text: impl Into<String>) -> Self {
        Self::new(role, text, true)
    }
}

/// Normalized event set delivered by the voice transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// Transport connected and the call is live
    CallStart,
    /// Call finished (remote hangup or acknowledged stop)
    CallEnd,
    /// A speaker started talking; providers that omit the role mean the agent
    SpeechStart { role: Option<Role> },
    /// A speaker stopped talking; `None` means every role
    SpeechEnd { role: Option<Role> },
    /// Speech-to-text update
    Transcript(TranscriptEvent),
    /// Transport failure
    Error { message: String },
    /// Well-formed event this engine has no use for
    Ignored { kind: String },
}

impl UpstreamEvent {
    /// Parse a raw JSON payload
    pub fn from_json(raw: &str) -> Result<Self, EventError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value)
    }

    /// Normalize an already decoded JSON payload
    pub fn from_value(value: &Value) -> Result<Self, EventError> {
        let obj = value.as_object().ok_or(EventError::NotAnObject)?;
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingField("type"))?;

        match kind {
            "call-start" => Ok(Self::CallStart),
            "call-end" => Ok(Self::CallEnd),
            "speech-start" => Ok(Self::SpeechStart {
                role: optional_role(obj)?,
            }),
            "speech-end" => Ok(Self::SpeechEnd {
                role: optional_role(obj)?,
            }),
            "message" => parse_message(obj),
            "transcript" => parse_transcript(obj).map(Self::Transcript),
            "error" => Ok(Self::Error {
                message: error_message(obj),
            }),
            other => Ok(Self::Ignored {
                kind: other.to_string(),
            }),
        }
    }

    /// Short name used in logs
    pub fn kind(&self) -> &str {
        match self {
            Self::CallStart => "call-start",
            Self::CallEnd => "call-end",
            Self::SpeechStart { .. } => "speech-start",
            Self::SpeechEnd { .. } => "speech-end",
            Self::Transcript(_) => "transcript",
            Self::Error { .. } => "error",
            Self::Ignored { kind } => kind,
        }
    }
}

/// Collapse every known finality spelling into one boolean.
///
/// Any boolean field set to `true` marks the event final. `null` counts as
/// absent; absence of every field means the update is partial.
pub fn normalize_finality(payload: &Map<String, Value>) -> Result<bool, EventError> {
    let mut is_final = false;

    for field in FINALITY_FIELDS {
        match payload.get(field) {
            None | Some(Value::Null) => {},
            Some(Value::Bool(flag)) => is_final |= *flag,
            Some(_) => return Err(EventError::InvalidFinality(field)),
        }
    }

    match payload.get(TRANSCRIPT_TYPE_FIELD) {
        None | Some(Value::Null) => {},
        Some(Value::String(s)) if s == "final" => is_final = true,
        Some(Value::String(s)) if s == "partial" => {},
        Some(_) => return Err(EventError::InvalidFinality(TRANSCRIPT_TYPE_FIELD)),
    }

    Ok(is_final)
}

fn parse_message(obj: &Map<String, Value>) -> Result<UpstreamEvent, EventError> {
    // Nested form carries its own type; flat form may tag it as messageType
    let (payload, message_type) = match obj.get("message") {
        Some(Value::Object(inner)) => (inner, inner.get("type").and_then(Value::as_str)),
        _ => (obj, obj.get("messageType").and_then(Value::as_str)),
    };

    match message_type {
        Some("transcript") | None => parse_transcript(payload).map(UpstreamEvent::Transcript),
        Some(other) => Ok(UpstreamEvent::Ignored {
            kind: format!("message:{}", other),
        }),
    }
}

fn parse_transcript(payload: &Map<String, Value>) -> Result<TranscriptEvent, EventError> {
    let role = match payload.get("role") {
        Some(Value::String(raw)) => {
            Role::parse(raw).ok_or_else(|| EventError::InvalidRole(raw.clone()))?
        },
        Some(other) => return Err(EventError::InvalidRole(other.to_string())),
        None => return Err(EventError::MissingField("role")),
    };

    let text = payload
        .get("transcript")
        .or_else(|| payload.get("text"))
        .and_then(Value::as_str)
        .ok_or(EventError::MissingField("transcript"))?;

    Ok(TranscriptEvent {
        role,
        text: text.to_string(),
        is_final: normalize_finality(payload)?,
    })
}

fn optional_role(obj: &Map<String, Value>) -> Result<Option<Role>, EventError> {
    match obj.get("role") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => Role::parse(raw)
            .map(Some)
            .ok_or_else(|| EventError::InvalidRole(raw.clone())),
        Some(other) => Err(EventError::InvalidRole(other.to_string())),
    }
}

fn error_message(obj: &Map<String, Value>) -> String {
    let extract = |value: &Value| match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(inner) => inner
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    };

    obj.get("message")
        .and_then(extract)
        .or_else(|| obj.get("error").and_then(extract))
        .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<UpstreamEvent, EventError> {
        UpstreamEvent::from_value(&value)
    }

    #[test]
    fn test_lifecycle_events() {
        assert_eq!(parse(json!({"type": "call-start"})).unwrap(), UpstreamEvent::CallStart);
        assert_eq!(parse(json!({"type": "call-end"})).unwrap(), UpstreamEvent::CallEnd);
        assert_eq!(
            parse(json!({"type": "speech-start"})).unwrap(),
            UpstreamEvent::SpeechStart { role: None }
        );
        assert_eq!(
            parse(json!({"type": "speech-end", "role": "assistant"})).unwrap(),
            UpstreamEvent::SpeechEnd {
                role: Some(Role::Agent)
            }
        );
    }

    #[test]
    fn test_finality_spellings() {
        for field in ["final", "isFinal", "is_final"] {
            let event = parse(json!({
                "type": "message",
                "message": {"type": "transcript", "role": "user", "transcript": "hi", field: true}
            }))
            .unwrap();
            assert_eq!(
                event,
                UpstreamEvent::Transcript(TranscriptEvent::final_text(Role::User, "hi")),
                "field {} should mark final",
                field
            );
        }
    }

    #[test]
    fn test_transcript_type_field() {
        let event = parse(json!({
            "type": "message",
            "message": {"type": "transcript", "role": "assistant",
                        "transcript": "Hello there", "transcriptType": "final"}
        }))
        .unwrap();
        assert_eq!(
            event,
            UpstreamEvent::Transcript(TranscriptEvent::final_text(Role::Agent, "Hello there"))
        );

        let partial = parse(json!({
            "type": "message",
            "message": {"type": "transcript", "role": "user",
                        "transcript": "Hel", "transcriptType": "partial"}
        }))
        .unwrap();
        assert_eq!(
            partial,
            UpstreamEvent::Transcript(TranscriptEvent::partial(Role::User, "Hel"))
        );
    }

    #[test]
    fn test_missing_finality_is_partial() {
        let event = parse(json!({
            "type": "message", "role": "user", "transcript": "book"
        }))
        .unwrap();
        assert_eq!(
            event,
            UpstreamEvent::Transcript(TranscriptEvent::partial(Role::User, "book"))
        );

        let mut payload = Map::new();
        payload.insert("isFinal".into(), Value::Null);
        assert!(!normalize_finality(&payload).unwrap());
    }

    #[test]
    fn test_invalid_finality_is_malformed() {
        let err = parse(json!({
            "type": "message", "role": "user", "transcript": "book", "is_final": "yes"
        }))
        .unwrap_err();
        assert!(matches!(err, EventError::InvalidFinality("is_final")));
    }

    #[test]
    fn test_non_transcript_message_ignored() {
        let event = parse(json!({
            "type": "message", "message": {"type": "function-call", "name": "lookup"}
        }))
        .unwrap();
        assert_eq!(
            event,
            UpstreamEvent::Ignored {
                kind: "message:function-call".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(parse(json!([1, 2])), Err(EventError::NotAnObject)));
        assert!(matches!(
            parse(json!({"role": "user"})),
            Err(EventError::MissingField("type"))
        ));
        assert!(matches!(
            parse(json!({"type": "message", "transcript": "hi"})),
            Err(EventError::MissingField("role"))
        ));
        assert!(matches!(
            parse(json!({"type": "message", "role": "narrator", "transcript": "hi"})),
            Err(EventError::InvalidRole(_))
        ));
        assert!(matches!(
            parse(json!({"type": "message", "role": "user"})),
            Err(EventError::MissingField("transcript"))
        ));
        assert!(matches!(
            UpstreamEvent::from_json("{not json"),
            Err(EventError::Json(_))
        ));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            parse(json!({"type": "error", "error": {"message": "socket closed"}})).unwrap(),
            UpstreamEvent::Error {
                message: "socket closed".to_string()
            }
        );
        assert_eq!(
            parse(json!({"type": "error", "message": "quota exceeded"})).unwrap(),
            UpstreamEvent::Error {
                message: "quota exceeded".to_string()
            }
        );
        assert_eq!(
            parse(json!({"type": "error"})).unwrap(),
            UpstreamEvent::Error {
                message: DEFAULT_ERROR_MESSAGE.to_string()
            }
        );
    }

    #[test]
    fn test_unknown_type_ignored() {
        let event = parse(json!({"type": "volume-level", "volume": 0.4})).unwrap();
        assert_eq!(event.kind(), "volume-level");
    }
}
