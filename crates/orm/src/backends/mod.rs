//! Query collaborator backends
//!
//! The engine depends only on [`QueryExecutor`]. Two implementations ship
//! with the crate: an in-memory executor and a sqlx PostgreSQL executor.

pub mod core;
pub mod memory;
pub mod postgres;

// Re-export core traits and types
pub use self::core::*;
pub use memory::MemoryExecutor;
pub use postgres::{PostgresConfig, PostgresExecutor};
