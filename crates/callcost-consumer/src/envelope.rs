//! Queue message envelope
//!
//! Every delivery is a JSON object of the form:
//! ```text
//! { "type": "new_incoming_call" | "refund_call", "body": { ... } }
//! ```

use callcost_core::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Closed set of event types this service understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    NewIncomingCall,
    RefundCall,
}

impl EventType {
    pub const ALL: [EventType; 2] = [EventType::NewIncomingCall, EventType::RefundCall];

    /// Wire tag
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::NewIncomingCall => "new_incoming_call",
            EventType::RefundCall => "refund_call",
        }
    }

    /// Parse a wire tag; tags are matched exactly
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event_type| event_type.as_str() == tag)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw envelope; the tag is kept as a string so unknown types can be reported
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub body: Value,
}

impl Envelope {
    /// Decode an envelope from delivery bytes
    pub fn decode(payload: &[u8]) -> Result<Self, AppError> {
        serde_json::from_slice(payload)
            .map_err(|e| AppError::Validation(format!("malformed envelope: {}", e)))
    }

    /// Resolve the tag against the closed event set
    pub fn resolve_type(&self) -> Result<EventType, AppError> {
        EventType::parse(&self.event_type)
            .ok_or_else(|| AppError::UnknownEventType(self.event_type.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_envelope() {
        let raw = br#"{"type":"refund_call","body":{"call_id":"c1","reason":"dup"}}"#;
        let envelope = Envelope::decode(raw).unwrap();
        assert_eq!(envelope.resolve_type().unwrap(), EventType::RefundCall);
        assert_eq!(envelope.body["call_id"], "c1");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let envelope = Envelope::decode(br#"{"type":"hangup","body":{}}"#).unwrap();
        let err = envelope.resolve_type().unwrap_err();
        assert!(matches!(err, AppError::UnknownEventType(ref tag) if tag == "hangup"));
    }

    #[test]
    fn test_tags_are_case_sensitive() {
        assert_eq!(EventType::parse("new_incoming_call"), Some(EventType::NewIncomingCall));
        assert_eq!(EventType::parse("NEW_INCOMING_CALL"), None);
    }

    #[test]
    fn test_malformed_envelope_is_validation_error() {
        assert!(Envelope::decode(b"not json").unwrap_err().is_validation());
        assert!(Envelope::decode(br#"{"body":{}}"#).unwrap_err().is_validation());
    }

    #[test]
    fn test_missing_body_defaults_to_null() {
        let envelope = Envelope::decode(br#"{"type":"refund_call"}"#).unwrap();
        assert!(envelope.body.is_null());
    }
}
