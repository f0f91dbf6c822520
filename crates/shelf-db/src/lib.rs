//! shelf-db: SQLite persistence for the photo catalog.
//!
//! Provides the connection lifecycle (pooling, bounded startup retry and the
//! shared [`pool::DbHandle`]), embedded migrations, the [`models::Photo`]
//! row type and the photo queries.

pub mod error;
pub mod functions;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;

pub use pool::{DbHandle, DbPool, PooledConnection, RetryPolicy};
