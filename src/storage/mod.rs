//! SQLite persistence: connection pool, schema, and row-level access.

pub mod conversation;
pub mod db;
pub mod employees;
pub mod models;
pub mod surveys;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
