//! Inbound queue events
//!
//! Payloads are deserialized as-is from the message body and then validated
//! into domain events. An unparsable `start_timestamp` is a hard validation
//! failure; it is never defaulted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;

/// `new_incoming_call` message body
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct IncomingCallPayload {
    #[validate(length(min = 1, message = "call_id must not be empty"))]
    pub call_id: String,

    pub caller: String,

    pub receiver: String,

    #[validate(range(min = 0, message = "duration_in_seconds must not be negative"))]
    pub duration_in_seconds: i64,

    /// RFC 3339 date-time
    pub start_timestamp: String,
}

/// `refund_call` message body
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RefundCallPayload {
    #[validate(length(min = 1, message = "call_id must not be empty"))]
    pub call_id: String,

    pub reason: String,
}

/// Validated incoming-call event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIncomingCall {
    pub call_id: String,
    pub caller: String,
    pub receiver: String,
    pub duration_in_seconds: i64,
    pub start_timestamp: DateTime<Utc>,
}

/// Validated refund event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundCall {
    pub call_id: String,
    pub reason: String,
}

impl NewIncomingCall {
    /// Reject events the store must never see
    pub fn validate(&self) -> Result<(), AppError> {
        if self.call_id.trim().is_empty() {
            return Err(AppError::MissingField("call_id".to_string()));
        }
        if self.duration_in_seconds < 0 {
            return Err(AppError::InvalidInput(format!(
                "duration_in_seconds must not be negative, got {}",
                self.duration_in_seconds
            )));
        }
        Ok(())
    }
}

impl RefundCall {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.call_id.trim().is_empty() {
            return Err(AppError::MissingField("call_id".to_string()));
        }
        Ok(())
    }
}

impl TryFrom<IncomingCallPayload> for NewIncomingCall {
    type Error = AppError;

    fn try_from(payload: IncomingCallPayload) -> Result<Self, Self::Error> {
        payload.validate()?;

        let start_timestamp = DateTime::parse_from_rfc3339(payload.start_timestamp.trim())
            .map_err(|e| {
                AppError::Validation(format!(
                    "invalid start_timestamp '{}': {}",
                    payload.start_timestamp, e
                ))
            })?
            .with_timezone(&Utc);

        Ok(Self {
            call_id: payload.call_id,
            caller: payload.caller,
            receiver: payload.receiver,
            duration_in_seconds: payload.duration_in_seconds,
            start_timestamp,
        })
    }
}

impl TryFrom<RefundCallPayload> for RefundCall {
    type Error = AppError;

    fn try_from(payload: RefundCallPayload) -> Result<Self, Self::Error> {
        payload.validate()?;

        Ok(Self {
            call_id: payload.call_id,
            reason: payload.reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn payload(start: &str) -> IncomingCallPayload {
        IncomingCallPayload {
            call_id: "123e4567-e89b-12d3-a456-426614174000".to_string(),
            caller: "+5491100000000".to_string(),
            receiver: "+5491111111111".to_string(),
            duration_in_seconds: 120,
            start_timestamp: start.to_string(),
        }
    }

    #[test]
    fn test_valid_payload_converts() {
        let call = NewIncomingCall::try_from(payload("2025-03-01T12:00:00-03:00")).unwrap();
        assert_eq!(
            call.start_timestamp,
            Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0).unwrap()
        );
        assert_eq!(call.duration_in_seconds, 120);
    }

    #[test]
    fn test_invalid_timestamp_is_hard_failure() {
        let err = NewIncomingCall::try_from(payload("yesterday at noon")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("start_timestamp"));
    }

    #[test]
    fn test_negative_duration_rejected() {
        let mut p = payload("2025-03-01T12:00:00Z");
        p.duration_in_seconds = -1;
        let err = NewIncomingCall::try_from(p).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_empty_call_id_rejected() {
        let mut p = payload("2025-03-01T12:00:00Z");
        p.call_id = String::new();
        assert!(NewIncomingCall::try_from(p).is_err());

        let refund = RefundCallPayload {
            call_id: String::new(),
            reason: "dup".to_string(),
        };
        assert!(RefundCall::try_from(refund).is_err());
    }

    #[test]
    fn test_payload_deserializes_from_wire_json() {
        let raw = r#"{
            "call_id": "c1",
            "caller": "100",
            "receiver": "200",
            "duration_in_seconds": 30,
            "start_timestamp": "2025-03-01T12:00:00Z"
        }"#;
        let p: IncomingCallPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(p.call_id, "c1");
        assert!(NewIncomingCall::try_from(p).is_ok());
    }

    #[test]
    fn test_domain_validate() {
        let call = NewIncomingCall {
            call_id: " ".to_string(),
            caller: String::new(),
            receiver: String::new(),
            duration_in_seconds: 0,
            start_timestamp: Utc::now(),
        };
        assert!(matches!(call.validate(), Err(AppError::MissingField(_))));
    }
}
