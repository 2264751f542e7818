//! Call Cost Processor Database Layer
//!
//! This crate provides the call store behind the `CallRepository` port:
//!
//! - Connection pool management with sqlx
//! - `PgCallRepository`, where every transition is one guarded SQL statement
//! - `InMemoryCallRepository`, a lock-guarded map with the same guards

pub mod memory;
pub mod pool;
pub mod repositories;

pub use memory::InMemoryCallRepository;
pub use pool::create_pool;
pub use repositories::*;

// Re-export commonly used types
pub use callcost_core::{AppError, AppResult};
pub use sqlx::PgPool;
