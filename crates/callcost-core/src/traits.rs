//! Ports consumed by the lifecycle engine
//!
//! Defines abstractions for the call store and the external quote dependency.
//! Each backing store or transport provides its own implementation, injected
//! at construction.

use crate::error::{AppError, QuoteError};
use crate::models::{Call, CallStatus, NewIncomingCall, Quote};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Result of an insert-if-absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was created
    Inserted,
    /// A row with the same call id already existed; nothing was written
    AlreadyExists,
}

/// Call store
///
/// Every mutating operation must be a single atomic conditional write.
/// The quote-outcome writes (`update_cost`, `mark_fetch_failed`,
/// `mark_invalid`) are no-ops when the current status is `REFUNDED`,
/// `INVALID` or `REFUND_PARTIALLY`, and report whether a row changed.
#[async_trait]
pub trait CallRepository: Send + Sync {
    /// Current status, `None` when no row exists
    async fn get_status(&self, call_id: &str) -> Result<Option<CallStatus>, AppError>;

    /// Full row, `None` when no row exists
    async fn get_call(&self, call_id: &str) -> Result<Option<Call>, AppError>;

    /// Insert a `PENDING` row unless one already exists
    async fn insert_if_absent(&self, call: &Call) -> Result<InsertOutcome, AppError>;

    /// Record a quote and move to `COST_FETCHED`
    async fn update_cost(
        &self,
        call_id: &str,
        cost: Decimal,
        currency: &str,
    ) -> Result<bool, AppError>;

    /// Move to `COST_FETCH_FAILED`
    async fn mark_fetch_failed(&self, call_id: &str) -> Result<bool, AppError>;

    /// Move to `INVALID`
    async fn mark_invalid(&self, call_id: &str) -> Result<bool, AppError>;

    /// Upsert the refund fields and unset the cost.
    ///
    /// Creates a `REFUND_PARTIALLY` row when none exists, otherwise moves a
    /// row with call data to `REFUNDED`. Always allowed. Returns the status
    /// the row ends up in.
    async fn apply_refund(&self, call_id: &str, reason: &str) -> Result<CallStatus, AppError>;

    /// Complete a `REFUND_PARTIALLY` row with the call data and move it to
    /// `REFUNDED`. No-op for any other status.
    async fn fill_missing_data(&self, call: &NewIncomingCall) -> Result<bool, AppError>;
}

/// External cost lookup
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetch the cost of a call.
    ///
    /// Failures carry a [`crate::QuoteErrorKind`] so callers can tell a
    /// rejected call from a degraded dependency.
    async fn get_quote(&self, call_id: &str) -> Result<Quote, QuoteError>;
}
