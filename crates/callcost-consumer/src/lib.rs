//! Event intake for the call cost processor
//!
//! This crate turns queue deliveries into lifecycle engine calls.
//!
//! # Architecture
//!
//! ```text
//!  RabbitMQ queue
//!         |
//!         v
//!  QueueConsumer (lapin, auto-ack)
//!         |
//!         v
//!  Dispatcher (envelope decode + routing table)
//!         |
//!         v
//!  EventHandler (new_incoming_call | refund_call)
//!         |
//!         v
//!  CallLifecycleEngine
//! ```
//!
//! Deliveries are processed one at a time, in order. A failed event is
//! logged and dropped; nothing is retried or dead-lettered.

pub mod dispatcher;
pub mod envelope;
pub mod handlers;
pub mod queue;

pub use dispatcher::{DispatchStatus, Dispatcher};
pub use envelope::{Envelope, EventType};
pub use handlers::{EventHandler, IncomingCallHandler, RefundCallHandler};
pub use queue::{process_stream, DeliveryStats, QueueConsumer};
