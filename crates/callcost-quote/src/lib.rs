//! Call Cost Processor Quote Gateway
//!
//! Wraps the external cost API behind the `QuoteProvider` port:
//!
//! - `HttpQuoteClient`: one HTTP attempt, classified into transient or permanent failures
//! - `RetryPolicy`: exponential backoff for transient failures, bounded by total elapsed time
//! - `CircuitBreaker`: fails fast after repeated transient outcomes
//! - `QuoteGateway`: the composition of the three

pub mod circuit_breaker;
pub mod client;
pub mod gateway;
pub mod retry;

pub use circuit_breaker::{BreakerSettings, CircuitBreaker, CircuitState};
pub use client::{HttpQuoteClient, QuoteFetcher};
pub use gateway::{QuoteGateway, COST_API_COMPONENT};
pub use retry::{ExponentialBackoff, RetryPolicy};
