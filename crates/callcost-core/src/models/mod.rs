//! Domain models for the call cost processor
//!
//! This module contains the durable call record, the inbound queue events,
//! and the quote returned by the cost dependency.

pub mod call;
pub mod event;
pub mod quote;

pub use call::{Call, CallStatus};
pub use event::{IncomingCallPayload, NewIncomingCall, RefundCall, RefundCallPayload};
pub use quote::Quote;
