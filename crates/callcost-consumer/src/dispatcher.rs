//! Event dispatcher
//!
//! Routes decoded envelopes through a table built once at startup. A
//! dispatch never retries: the result only decides how the delivery is
//! logged.

use callcost_core::{
    traits::{CallRepository, QuoteProvider},
    AppError, AppResult,
};
use callcost_services::CallLifecycleEngine;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::envelope::{Envelope, EventType};
use crate::handlers::{EventHandler, IncomingCallHandler, RefundCallHandler};

/// How a delivery ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// Handler completed
    Handled(EventType),
    /// Rejected before reaching the store (malformed, invalid or unknown)
    Dropped,
    /// Store or internal failure while handling
    Failed,
}

/// Routing table from event type to handler
#[derive(Default)]
pub struct Dispatcher {
    routes: HashMap<EventType, Arc<dyn EventHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for an event type, replacing any previous one
    pub fn register(mut self, event_type: EventType, handler: Arc<dyn EventHandler>) -> Self {
        self.routes.insert(event_type, handler);
        self
    }

    /// Routing table wired to the lifecycle engine
    pub fn for_engine<R, Q>(engine: Arc<CallLifecycleEngine<R, Q>>) -> Self
    where
        R: CallRepository + 'static,
        Q: QuoteProvider + 'static,
    {
        Self::new()
            .register(
                EventType::NewIncomingCall,
                Arc::new(IncomingCallHandler::new(engine.clone())),
            )
            .register(EventType::RefundCall, Arc::new(RefundCallHandler::new(engine)))
    }

    pub fn handles(&self, event_type: EventType) -> bool {
        self.routes.contains_key(&event_type)
    }

    /// Decode and route one delivery
    pub async fn dispatch(&self, payload: &[u8]) -> AppResult<EventType> {
        let envelope = Envelope::decode(payload)?;
        let event_type = envelope.resolve_type()?;

        let handler = self.routes.get(&event_type).ok_or_else(|| {
            AppError::Internal(format!("no handler registered for {}", event_type))
        })?;

        debug!(event_type = %event_type, "Dispatching event");
        handler.handle(envelope.body).await?;
        Ok(event_type)
    }

    /// Dispatch one delivery and log any failure
    pub async fn process(&self, payload: &[u8]) -> DispatchStatus {
        match self.dispatch(payload).await {
            Ok(event_type) => DispatchStatus::Handled(event_type),
            Err(err) if err.is_validation() => {
                warn!(code = err.error_code(), "Dropping message: {}", err);
                DispatchStatus::Dropped
            }
            Err(err) => {
                error!(code = err.error_code(), "Failed to process message: {}", err);
                DispatchStatus::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingHandler {
        calls: AtomicU32,
        fail_with: Option<AppError>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _body: Value) -> AppResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    #[tokio::test]
    async fn test_routes_by_type() {
        let incoming = Arc::new(CountingHandler::default());
        let refund = Arc::new(CountingHandler::default());
        let dispatcher = Dispatcher::new()
            .register(EventType::NewIncomingCall, incoming.clone())
            .register(EventType::RefundCall, refund.clone());

        let status = dispatcher
            .process(br#"{"type":"refund_call","body":{}}"#)
            .await;

        assert_eq!(status, DispatchStatus::Handled(EventType::RefundCall));
        assert_eq!(refund.calls.load(Ordering::SeqCst), 1);
        assert_eq!(incoming.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_type_is_dropped() {
        let handler = Arc::new(CountingHandler::default());
        let dispatcher = Dispatcher::new().register(EventType::NewIncomingCall, handler.clone());

        let err = dispatcher
            .dispatch(br#"{"type":"call_hangup","body":{}}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownEventType(_)));

        let status = dispatcher.process(br#"{"type":"call_hangup"}"#).await;
        assert_eq!(status, DispatchStatus::Dropped);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unregistered_type_fails() {
        let dispatcher = Dispatcher::new();
        assert!(!dispatcher.handles(EventType::RefundCall));

        let status = dispatcher.process(br#"{"type":"refund_call","body":{}}"#).await;
        assert_eq!(status, DispatchStatus::Failed);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_as_failed() {
        let handler = Arc::new(CountingHandler {
            calls: AtomicU32::new(0),
            fail_with: Some(AppError::Database("connection reset".to_string())),
        });
        let dispatcher = Dispatcher::new().register(EventType::NewIncomingCall, handler.clone());

        let status = dispatcher
            .process(br#"{"type":"new_incoming_call","body":{}}"#)
            .await;
        assert_eq!(status, DispatchStatus::Failed);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_garbage_payload_is_dropped() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.process(b"\x00\x01").await, DispatchStatus::Dropped);
    }
}
