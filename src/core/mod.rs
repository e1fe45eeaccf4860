//! Configuration, error types, logging, and shared domain enums.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use error::{AppError, AppResult};
