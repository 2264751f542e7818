//! Business logic services for the call cost processor
//!
//! The lifecycle engine owns every status transition of a call. It is
//! generic over the store and the quote dependency:
//! - Dependencies are injected as `Arc`s at construction
//! - All operations are instrumented with tracing
//! - Quote failures are business outcomes; only validation and store
//!   failures surface as `AppError`

pub mod lifecycle;

pub use lifecycle::{CallLifecycleEngine, IncomingCallOutcome, RefundOutcome};
