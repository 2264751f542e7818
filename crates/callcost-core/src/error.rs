//! Unified error handling for the call cost processor
//!
//! Two error families live here:
//!
//! - [`AppError`]: failures of event processing itself (bad payloads, store
//!   failures, bootstrap problems). These are surfaced to the dispatcher.
//! - [`QuoteError`]: failures of the external cost lookup. These are business
//!   outcomes that the lifecycle engine records as a call status.

use thiserror::Error;

/// Main application error type
///
/// Only validation and persistence errors are failures of event processing.
/// Quote failures never appear here; see [`QuoteError`].
#[derive(Error, Debug, Clone)]
pub enum AppError {
    // ==================== Database Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    // ==================== Dispatch Errors ====================
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // ==================== Infrastructure Errors ====================
    #[error("Messaging error: {0}")]
    Messaging(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns a stable error code for structured logs
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::MissingField(_) => "missing_field",
            AppError::UnknownEventType(_) => "unknown_event_type",
            AppError::Serialization(_) => "serialization_error",
            AppError::Messaging(_) => "messaging_error",
            AppError::Config(_) => "config_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// True when the inbound message itself was defective.
    ///
    /// Such messages are dropped without touching the store.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_)
                | AppError::InvalidInput(_)
                | AppError::MissingField(_)
                | AppError::UnknownEventType(_)
                | AppError::Serialization(_)
        )
    }

    /// True when the store failed while applying a transition
    pub fn is_store_error(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Pool(_))
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Coarse classification of a quote failure
///
/// This is the only thing the lifecycle engine branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteErrorKind {
    /// Expected to resolve on its own; the call is marked `COST_FETCH_FAILED`
    Transient,
    /// The dependency rejected the call; the call is marked `INVALID`
    Permanent,
}

/// Errors returned by the quote gateway
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteError {
    // ==================== Permanent ====================
    #[error("Call not found by cost API: {detail}")]
    NotFound { detail: String },

    #[error("Call rejected by cost API: status {status}: {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    // ==================== Transient ====================
    #[error("Cost API server error: status {status}: {detail}")]
    Server { status: u16, detail: String },

    #[error("Timeout: request took longer than {0}ms")]
    Timeout(u64),

    #[error("Connection error: {0}")]
    Transport(String),

    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    #[error("Cost API failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<QuoteError>,
    },
}

impl QuoteError {
    /// Classify the failure as transient or permanent
    pub fn kind(&self) -> QuoteErrorKind {
        match self {
            QuoteError::NotFound { .. }
            | QuoteError::Rejected { .. }
            | QuoteError::InvalidResponse(_) => QuoteErrorKind::Permanent,
            QuoteError::Server { .. }
            | QuoteError::Timeout(_)
            | QuoteError::Transport(_)
            | QuoteError::CircuitOpen { .. }
            | QuoteError::RetriesExhausted { .. } => QuoteErrorKind::Transient,
        }
    }

    #[inline]
    pub fn is_transient(&self) -> bool {
        self.kind() == QuoteErrorKind::Transient
    }

    #[inline]
    pub fn is_permanent(&self) -> bool {
        self.kind() == QuoteErrorKind::Permanent
    }

    /// Returns a stable error code for structured logs
    pub fn error_code(&self) -> &'static str {
        match self {
            QuoteError::NotFound { .. } => "quote_not_found",
            QuoteError::Rejected { .. } => "quote_rejected",
            QuoteError::InvalidResponse(_) => "quote_invalid_response",
            QuoteError::Server { .. } => "quote_server_error",
            QuoteError::Timeout(_) => "quote_timeout",
            QuoteError::Transport(_) => "quote_transport_error",
            QuoteError::CircuitOpen { .. } => "quote_circuit_open",
            QuoteError::RetriesExhausted { .. } => "quote_retries_exhausted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_error_kinds() {
        assert_eq!(
            QuoteError::NotFound {
                detail: "x".to_string()
            }
            .kind(),
            QuoteErrorKind::Permanent
        );
        assert!(QuoteError::InvalidResponse("bad".to_string()).is_permanent());
        assert!(QuoteError::Rejected {
            status: 422,
            detail: String::new()
        }
        .is_permanent());

        assert!(QuoteError::Timeout(2000).is_transient());
        assert!(QuoteError::Transport("refused".to_string()).is_transient());
        assert!(QuoteError::CircuitOpen {
            component: "cost_api".to_string()
        }
        .is_transient());
        assert!(QuoteError::RetriesExhausted {
            attempts: 3,
            last: Box::new(QuoteError::Server {
                status: 503,
                detail: String::new()
            }),
        }
        .is_transient());
    }

    #[test]
    fn test_retries_exhausted_message_includes_last_error() {
        let err = QuoteError::RetriesExhausted {
            attempts: 4,
            last: Box::new(QuoteError::Server {
                status: 500,
                detail: "Algo explotó (internal_server_error)".to_string(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("4 attempts"));
        assert!(msg.contains("internal_server_error"));
    }

    #[test]
    fn test_app_error_classification() {
        assert!(AppError::Validation("x".to_string()).is_validation());
        assert!(AppError::UnknownEventType("x".to_string()).is_validation());
        assert!(!AppError::Database("x".to_string()).is_validation());
        assert!(AppError::Database("x".to_string()).is_store_error());
        assert!(AppError::Pool("x".to_string()).is_store_error());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::UnknownEventType("x".to_string()).error_code(),
            "unknown_event_type"
        );
        assert_eq!(QuoteError::Timeout(10).error_code(), "quote_timeout");
    }
}
