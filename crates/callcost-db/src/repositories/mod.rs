//! Repository implementations
//!
//! Concrete implementations of the store ports defined in callcost-core,
//! using sqlx for PostgreSQL access.

pub mod call_repo;

pub use call_repo::PgCallRepository;
