//! In-memory call store
//!
//! Applies the same guards as the PostgreSQL repository under a single lock,
//! so each operation is atomic. Used by tests and for local runs without a
//! database.

use async_trait::async_trait;
use callcost_core::{
    models::{Call, CallStatus, NewIncomingCall},
    traits::{CallRepository, InsertOutcome},
    AppResult,
};
use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// Lock-guarded map keyed by call id
#[derive(Debug, Default)]
pub struct InMemoryCallRepository {
    calls: RwLock<HashMap<String, Call>>,
}

impl InMemoryCallRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows
    pub fn len(&self) -> usize {
        self.calls.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.read().is_empty()
    }

    /// Seed a row as-is, bypassing the lifecycle guards
    pub fn seed(&self, call: Call) {
        self.calls.write().insert(call.call_id.clone(), call);
    }

    fn set_quote_outcome(
        &self,
        call_id: &str,
        status: CallStatus,
        quote: Option<(Decimal, &str)>,
    ) -> bool {
        let mut calls = self.calls.write();
        let Some(call) = calls.get_mut(call_id) else {
            return false;
        };

        if !call.status.accepts_quote_outcome() {
            warn!(call_id = %call_id, current = %call.status, target = %status, "Guarded update skipped");
            return false;
        }

        if let Some((cost, currency)) = quote {
            call.cost = Some(cost);
            call.currency = Some(currency.to_string());
        }
        call.status = status;
        call.processed_at = Utc::now();
        true
    }
}

#[async_trait]
impl CallRepository for InMemoryCallRepository {
    async fn get_status(&self, call_id: &str) -> AppResult<Option<CallStatus>> {
        Ok(self.calls.read().get(call_id).map(|call| call.status))
    }

    async fn get_call(&self, call_id: &str) -> AppResult<Option<Call>> {
        Ok(self.calls.read().get(call_id).cloned())
    }

    #[instrument(skip(self, call), fields(call_id = %call.call_id))]
    async fn insert_if_absent(&self, call: &Call) -> AppResult<InsertOutcome> {
        let mut calls = self.calls.write();
        if calls.contains_key(&call.call_id) {
            return Ok(InsertOutcome::AlreadyExists);
        }

        debug!("Inserting call with status {}", call.status);
        let mut row = call.clone();
        row.processed_at = Utc::now();
        calls.insert(row.call_id.clone(), row);
        Ok(InsertOutcome::Inserted)
    }

    async fn update_cost(&self, call_id: &str, cost: Decimal, currency: &str) -> AppResult<bool> {
        Ok(self.set_quote_outcome(call_id, CallStatus::CostFetched, Some((cost, currency))))
    }

    async fn mark_fetch_failed(&self, call_id: &str) -> AppResult<bool> {
        Ok(self.set_quote_outcome(call_id, CallStatus::CostFetchFailed, None))
    }

    async fn mark_invalid(&self, call_id: &str) -> AppResult<bool> {
        Ok(self.set_quote_outcome(call_id, CallStatus::Invalid, None))
    }

    #[instrument(skip(self, reason))]
    async fn apply_refund(&self, call_id: &str, reason: &str) -> AppResult<CallStatus> {
        let mut calls = self.calls.write();
        let call = calls.entry(call_id.to_string()).or_insert_with(|| {
            debug!("No call yet, recording refund only");
            Call {
                call_id: call_id.to_string(),
                caller: None,
                receiver: None,
                duration_in_seconds: None,
                start_timestamp: None,
                cost: None,
                currency: None,
                refunded: true,
                refund_reason: None,
                status: CallStatus::RefundPartially,
                processed_at: Utc::now(),
            }
        });

        call.refunded = true;
        call.refund_reason = Some(reason.to_string());
        call.cost = None;
        call.currency = None;
        call.status = if call.has_call_data() {
            CallStatus::Refunded
        } else {
            CallStatus::RefundPartially
        };
        call.processed_at = Utc::now();

        Ok(call.status)
    }

    #[instrument(skip(self, incoming), fields(call_id = %incoming.call_id))]
    async fn fill_missing_data(&self, incoming: &NewIncomingCall) -> AppResult<bool> {
        let mut calls = self.calls.write();
        let Some(call) = calls.get_mut(&incoming.call_id) else {
            return Ok(false);
        };

        if call.status != CallStatus::RefundPartially {
            return Ok(false);
        }

        call.caller = Some(incoming.caller.clone());
        call.receiver = Some(incoming.receiver.clone());
        call.duration_in_seconds = Some(incoming.duration_in_seconds);
        call.start_timestamp = Some(incoming.start_timestamp);
        call.status = CallStatus::Refunded;
        call.processed_at = Utc::now();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn incoming(call_id: &str) -> NewIncomingCall {
        NewIncomingCall {
            call_id: call_id.to_string(),
            caller: "100".to_string(),
            receiver: "200".to_string(),
            duration_in_seconds: 30,
            start_timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_insert_if_absent_is_idempotent() {
        let repo = InMemoryCallRepository::new();
        let call = Call::pending(&incoming("c1"));

        assert_eq!(repo.insert_if_absent(&call).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(
            repo.insert_if_absent(&call).await.unwrap(),
            InsertOutcome::AlreadyExists
        );
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_quote_writes_follow_pending() {
        let repo = InMemoryCallRepository::new();
        repo.insert_if_absent(&Call::pending(&incoming("c1"))).await.unwrap();

        assert!(repo.update_cost("c1", dec!(7.5), "EUR").await.unwrap());
        let call = repo.get_call("c1").await.unwrap().unwrap();
        assert_eq!(call.status, CallStatus::CostFetched);
        assert_eq!(call.cost, Some(dec!(7.5)));
        assert_eq!(call.currency.as_deref(), Some("EUR"));
    }

    #[tokio::test]
    async fn test_guard_blocks_quote_writes_after_refund() {
        let repo = InMemoryCallRepository::new();
        repo.insert_if_absent(&Call::pending(&incoming("c1"))).await.unwrap();
        assert_eq!(
            repo.apply_refund("c1", "dup").await.unwrap(),
            CallStatus::Refunded
        );

        assert!(!repo.update_cost("c1", dec!(1), "USD").await.unwrap());
        assert!(!repo.mark_fetch_failed("c1").await.unwrap());
        assert!(!repo.mark_invalid("c1").await.unwrap());

        let call = repo.get_call("c1").await.unwrap().unwrap();
        assert_eq!(call.status, CallStatus::Refunded);
        assert!(call.cost.is_none());
    }

    #[tokio::test]
    async fn test_guard_blocks_quote_writes_after_invalid() {
        let repo = InMemoryCallRepository::new();
        repo.insert_if_absent(&Call::pending(&incoming("c1"))).await.unwrap();
        assert!(repo.mark_invalid("c1").await.unwrap());

        assert!(!repo.update_cost("c1", dec!(1), "USD").await.unwrap());
        assert!(!repo.mark_fetch_failed("c1").await.unwrap());
        assert_eq!(repo.get_status("c1").await.unwrap(), Some(CallStatus::Invalid));
    }

    #[tokio::test]
    async fn test_refund_unsets_cost() {
        let repo = InMemoryCallRepository::new();
        repo.insert_if_absent(&Call::pending(&incoming("c1"))).await.unwrap();
        repo.update_cost("c1", dec!(3.2), "ARS").await.unwrap();

        repo.apply_refund("c1", "customer complaint").await.unwrap();

        let call = repo.get_call("c1").await.unwrap().unwrap();
        assert_eq!(call.status, CallStatus::Refunded);
        assert!(call.refunded);
        assert!(call.cost.is_none());
        assert!(call.currency.is_none());
        assert_eq!(call.refund_reason.as_deref(), Some("customer complaint"));
    }

    #[tokio::test]
    async fn test_early_refund_then_fill() {
        let repo = InMemoryCallRepository::new();

        assert_eq!(
            repo.apply_refund("c3", "dup").await.unwrap(),
            CallStatus::RefundPartially
        );
        // A repeated early refund stays partial
        assert_eq!(
            repo.apply_refund("c3", "dup").await.unwrap(),
            CallStatus::RefundPartially
        );
        assert!(!repo.update_cost("c3", dec!(1), "USD").await.unwrap());

        assert!(repo.fill_missing_data(&incoming("c3")).await.unwrap());
        assert!(!repo.fill_missing_data(&incoming("c3")).await.unwrap());

        let call = repo.get_call("c3").await.unwrap().unwrap();
        assert_eq!(call.status, CallStatus::Refunded);
        assert_eq!(call.duration_in_seconds, Some(30));
        assert_eq!(call.refund_reason.as_deref(), Some("dup"));
    }

    #[tokio::test]
    async fn test_fill_requires_partial_refund() {
        let repo = InMemoryCallRepository::new();
        assert!(!repo.fill_missing_data(&incoming("missing")).await.unwrap());

        repo.insert_if_absent(&Call::pending(&incoming("c1"))).await.unwrap();
        assert!(!repo.fill_missing_data(&incoming("c1")).await.unwrap());
        assert_eq!(repo.get_status("c1").await.unwrap(), Some(CallStatus::Pending));
    }

    #[tokio::test]
    async fn test_missing_row_reads_none() {
        let repo = InMemoryCallRepository::new();
        assert!(repo.is_empty());
        assert_eq!(repo.get_status("nope").await.unwrap(), None);
        assert!(!repo.mark_fetch_failed("nope").await.unwrap());
    }
}
