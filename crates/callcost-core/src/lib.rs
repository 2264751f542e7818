//! Call Cost Processor Core Library
//!
//! This crate provides the foundational types, ports, and error handling
//! shared by every other crate in the workspace. It includes:
//!
//! - Domain models (Call, CallStatus, inbound events, Quote)
//! - Ports for the call store and the quote dependency
//! - Unified error handling for event processing and quote lookups
//! - Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use error::{AppError, QuoteError, QuoteErrorKind};

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
