//! Call model
//!
//! The durable billing record for one phone call and its lifecycle status.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::event::{NewIncomingCall, RefundCall};

/// Call lifecycle status
///
/// Stored as upper-snake strings in the `calls.status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    /// Row exists with call data, cost not resolved yet
    Pending,
    /// Quote obtained
    CostFetched,
    /// Transient quote failure, recoverable by an external backfill
    CostFetchFailed,
    /// The cost dependency rejected the call itself
    Invalid,
    /// Refund arrived before the call data
    RefundPartially,
    /// Refund recorded on a fully known call
    Refunded,
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CallStatus {
    /// Every status, in lifecycle order
    pub const ALL: [CallStatus; 6] = [
        CallStatus::Pending,
        CallStatus::CostFetched,
        CallStatus::CostFetchFailed,
        CallStatus::Invalid,
        CallStatus::RefundPartially,
        CallStatus::Refunded,
    ];

    /// Column representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Pending => "PENDING",
            CallStatus::CostFetched => "COST_FETCHED",
            CallStatus::CostFetchFailed => "COST_FETCH_FAILED",
            CallStatus::Invalid => "INVALID",
            CallStatus::RefundPartially => "REFUND_PARTIALLY",
            CallStatus::Refunded => "REFUNDED",
        }
    }

    /// Parse from the column representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Some(CallStatus::Pending),
            "COST_FETCHED" => Some(CallStatus::CostFetched),
            "COST_FETCH_FAILED" => Some(CallStatus::CostFetchFailed),
            "INVALID" => Some(CallStatus::Invalid),
            "REFUND_PARTIALLY" => Some(CallStatus::RefundPartially),
            "REFUNDED" => Some(CallStatus::Refunded),
            _ => None,
        }
    }

    /// Terminal with respect to billing: no cost transition may overwrite it
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::Refunded | CallStatus::Invalid)
    }

    /// Whether a refund has been recorded on the row
    #[inline]
    pub fn is_refund(&self) -> bool {
        matches!(self, CallStatus::Refunded | CallStatus::RefundPartially)
    }

    /// Whether a late quote outcome may still be written over this status.
    ///
    /// Refund and invalidity always win over a quote result.
    #[inline]
    pub fn accepts_quote_outcome(&self) -> bool {
        !self.is_terminal() && !self.is_refund()
    }

    /// Statuses a quote outcome must never overwrite
    pub fn quote_guarded() -> impl Iterator<Item = CallStatus> {
        Self::ALL
            .into_iter()
            .filter(|status| !status.accepts_quote_outcome())
    }
}

/// Durable call record
///
/// Descriptive fields are optional because a row created by an early refund
/// holds only the refund fields until the incoming-call event arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// Unique call identifier (primary key)
    pub call_id: String,

    /// Calling party
    pub caller: Option<String>,

    /// Called party
    pub receiver: Option<String>,

    /// Call duration in seconds
    pub duration_in_seconds: Option<i64>,

    /// Call start timestamp
    pub start_timestamp: Option<DateTime<Utc>>,

    /// Quoted cost, only after a successful quote fetch
    pub cost: Option<Decimal>,

    /// ISO 4217 currency of the quoted cost
    pub currency: Option<String>,

    /// Whether a refund has been applied
    pub refunded: bool,

    /// Reason given with the refund
    pub refund_reason: Option<String>,

    /// Lifecycle status
    pub status: CallStatus,

    /// Timestamp of the last status transition
    pub processed_at: DateTime<Utc>,
}

impl Call {
    /// New `PENDING` row built from an incoming-call event
    pub fn pending(call: &NewIncomingCall) -> Self {
        Self {
            call_id: call.call_id.clone(),
            caller: Some(call.caller.clone()),
            receiver: Some(call.receiver.clone()),
            duration_in_seconds: Some(call.duration_in_seconds),
            start_timestamp: Some(call.start_timestamp),
            cost: None,
            currency: None,
            refunded: false,
            refund_reason: None,
            status: CallStatus::Pending,
            processed_at: Utc::now(),
        }
    }

    /// New `REFUND_PARTIALLY` row holding only the refund fields
    pub fn partial_refund(refund: &RefundCall) -> Self {
        Self {
            call_id: refund.call_id.clone(),
            caller: None,
            receiver: None,
            duration_in_seconds: None,
            start_timestamp: None,
            cost: None,
            currency: None,
            refunded: true,
            refund_reason: Some(refund.reason.clone()),
            status: CallStatus::RefundPartially,
            processed_at: Utc::now(),
        }
    }

    /// Check if the call's own descriptive data is known
    #[inline]
    pub fn has_call_data(&self) -> bool {
        self.caller.is_some() && self.receiver.is_some() && self.start_timestamp.is_some()
    }
}
