//! Event handlers
//!
//! One handler per event type. Each decodes its body into a validated
//! domain event and hands it to the lifecycle engine.

use async_trait::async_trait;
use callcost_core::{
    models::{IncomingCallPayload, NewIncomingCall, RefundCall, RefundCallPayload},
    traits::{CallRepository, QuoteProvider},
    AppError, AppResult,
};
use callcost_services::CallLifecycleEngine;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::envelope::EventType;

/// Handler registered in the routing table for one event type
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, body: Value) -> AppResult<()>;
}

/// Decode an event body; shape errors are validation failures
fn decode_body<T: DeserializeOwned>(event_type: EventType, body: Value) -> AppResult<T> {
    serde_json::from_value(body)
        .map_err(|e| AppError::Validation(format!("invalid {} body: {}", event_type, e)))
}

/// Handles `new_incoming_call`
pub struct IncomingCallHandler<R: CallRepository, Q: QuoteProvider> {
    engine: Arc<CallLifecycleEngine<R, Q>>,
}

impl<R: CallRepository, Q: QuoteProvider> IncomingCallHandler<R, Q> {
    pub fn new(engine: Arc<CallLifecycleEngine<R, Q>>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl<R: CallRepository, Q: QuoteProvider> EventHandler for IncomingCallHandler<R, Q> {
    #[instrument(skip(self, body))]
    async fn handle(&self, body: Value) -> AppResult<()> {
        let payload: IncomingCallPayload = decode_body(EventType::NewIncomingCall, body)?;
        let call = NewIncomingCall::try_from(payload)?;
        let call_id = call.call_id.clone();

        let outcome = self.engine.handle_incoming_call(call).await?;
        info!(call_id = %call_id, outcome = ?outcome, "new_incoming_call handled");
        Ok(())
    }
}

/// Handles `refund_call`
pub struct RefundCallHandler<R: CallRepository, Q: QuoteProvider> {
    engine: Arc<CallLifecycleEngine<R, Q>>,
}

impl<R: CallRepository, Q: QuoteProvider> RefundCallHandler<R, Q> {
    pub fn new(engine: Arc<CallLifecycleEngine<R, Q>>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl<R: CallRepository, Q: QuoteProvider> EventHandler for RefundCallHandler<R, Q> {
    #[instrument(skip(self, body))]
    async fn handle(&self, body: Value) -> AppResult<()> {
        let payload: RefundCallPayload = decode_body(EventType::RefundCall, body)?;
        let refund = RefundCall::try_from(payload)?;
        let call_id = refund.call_id.clone();

        let outcome = self.engine.handle_refund(refund).await?;
        info!(call_id = %call_id, outcome = ?outcome, "refund_call handled");
        Ok(())
    }
}
