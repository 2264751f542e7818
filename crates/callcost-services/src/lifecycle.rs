//! Call lifecycle engine
//!
//! Reconciles incoming-call and refund events, which may arrive in any order
//! or more than once, into one row per call:
//! - Duplicate incoming calls are discarded without touching the store
//! - A refund always wins over any cost outcome
//! - An early refund is completed when the call data arrives
//! - Quote outcomes are written with guarded updates, so a refund landing
//!   during the lookup is never overwritten

use callcost_core::{
    models::{Call, CallStatus, NewIncomingCall, RefundCall},
    traits::{CallRepository, InsertOutcome, QuoteProvider},
    AppError, AppResult, QuoteErrorKind,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of processing a `new_incoming_call` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IncomingCallOutcome {
    /// Quote stored, call is `COST_FETCHED`
    CostFetched { cost: Decimal, currency: String },
    /// The cost dependency rejected the call, call is `INVALID`
    Invalid { reason: String },
    /// Quote lookup failed transiently, call is `COST_FETCH_FAILED`
    CostFetchFailed { reason: String },
    /// An early refund was completed with the call data, call is `REFUNDED`
    RefundCompleted,
    /// The call was already known; nothing was written
    Duplicate { status: CallStatus },
    /// A concurrent transition won over the quote outcome
    Superseded { status: CallStatus },
}

/// Result of processing a `refund_call` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundOutcome {
    /// Refund applied to a known call
    Refunded,
    /// Refund stored ahead of the call data
    RefundRecordedEarly,
}

/// Call lifecycle engine
pub struct CallLifecycleEngine<R: CallRepository, Q: QuoteProvider> {
    repo: Arc<R>,
    quotes: Arc<Q>,
}

impl<R: CallRepository, Q: QuoteProvider> CallLifecycleEngine<R, Q> {
    /// Create a new engine
    pub fn new(repo: Arc<R>, quotes: Arc<Q>) -> Self {
        Self { repo, quotes }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Process a `new_incoming_call` event
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The event fails validation (nothing is written)
    /// - A store operation fails
    ///
    /// Quote failures are not errors; they are recorded on the call and
    /// reported through the outcome.
    #[instrument(skip(self, call), fields(call_id = %call.call_id))]
    pub async fn handle_incoming_call(
        &self,
        call: NewIncomingCall,
    ) -> AppResult<IncomingCallOutcome> {
        call.validate()?;

        match self.repo.get_status(&call.call_id).await? {
            Some(CallStatus::RefundPartially) => return self.complete_refund(&call).await,
            Some(status) => {
                info!(status = %status, "Duplicate incoming call discarded");
                return Ok(IncomingCallOutcome::Duplicate { status });
            }
            None => {}
        }

        match self.repo.insert_if_absent(&Call::pending(&call)).await? {
            InsertOutcome::Inserted => debug!("Call stored as PENDING"),
            InsertOutcome::AlreadyExists => {
                // Another writer created the row between the read and the insert
                let status = self.current_status(&call.call_id).await?;
                if status == CallStatus::RefundPartially {
                    return self.complete_refund(&call).await;
                }
                info!(status = %status, "Duplicate incoming call discarded");
                return Ok(IncomingCallOutcome::Duplicate { status });
            }
        }

        self.resolve_cost(&call.call_id).await
    }

    /// Process a `refund_call` event
    ///
    /// Always allowed: creates a partial row for an unseen call, otherwise
    /// marks the call refunded and unsets its cost.
    #[instrument(skip(self, refund), fields(call_id = %refund.call_id))]
    pub async fn handle_refund(&self, refund: RefundCall) -> AppResult<RefundOutcome> {
        refund.validate()?;

        let status = self
            .repo
            .apply_refund(&refund.call_id, &refund.reason)
            .await?;

        match status {
            CallStatus::Refunded => {
                info!(reason = %refund.reason, "Call refunded");
                Ok(RefundOutcome::Refunded)
            }
            CallStatus::RefundPartially => {
                info!(reason = %refund.reason, "Refund recorded before call data");
                Ok(RefundOutcome::RefundRecordedEarly)
            }
            other => Err(AppError::Database(format!(
                "Refund left call {} in unexpected status {}",
                refund.call_id, other
            ))),
        }
    }

    async fn complete_refund(&self, call: &NewIncomingCall) -> AppResult<IncomingCallOutcome> {
        if self.repo.fill_missing_data(call).await? {
            info!("Early refund completed with call data");
            return Ok(IncomingCallOutcome::RefundCompleted);
        }

        let status = self.current_status(&call.call_id).await?;
        info!(status = %status, "Partial refund already completed");
        Ok(IncomingCallOutcome::Duplicate { status })
    }

    /// Fetch the quote and record its outcome with a guarded write
    async fn resolve_cost(&self, call_id: &str) -> AppResult<IncomingCallOutcome> {
        let (written, outcome) = match self.quotes.get_quote(call_id).await {
            Ok(quote) => {
                let written = self
                    .repo
                    .update_cost(call_id, quote.cost, &quote.currency)
                    .await?;
                (
                    written,
                    IncomingCallOutcome::CostFetched {
                        cost: quote.cost,
                        currency: quote.currency,
                    },
                )
            }
            Err(err) => match err.kind() {
                QuoteErrorKind::Permanent => {
                    warn!(code = err.error_code(), "Call rejected by cost API: {}", err);
                    let written = self.repo.mark_invalid(call_id).await?;
                    (
                        written,
                        IncomingCallOutcome::Invalid {
                            reason: err.to_string(),
                        },
                    )
                }
                QuoteErrorKind::Transient => {
                    warn!(code = err.error_code(), "Cost fetch failed: {}", err);
                    let written = self.repo.mark_fetch_failed(call_id).await?;
                    (
                        written,
                        IncomingCallOutcome::CostFetchFailed {
                            reason: err.to_string(),
                        },
                    )
                }
            },
        };

        if written {
            info!(outcome = ?outcome, "Incoming call processed");
            return Ok(outcome);
        }

        let status = self.current_status(call_id).await?;
        info!(status = %status, "Quote outcome superseded by a concurrent transition");
        Ok(IncomingCallOutcome::Superseded { status })
    }

    async fn current_status(&self, call_id: &str) -> AppResult<CallStatus> {
        self.repo.get_status(call_id).await?.ok_or_else(|| {
            AppError::Database(format!("Call {} disappeared from the store", call_id))
        })
    }
}
