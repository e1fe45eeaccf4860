//! HR onboarding-survey platform.
//!
//! A REST backend (employees, surveys, responses, analytics/export) paired
//! with a Telegram bot that walks an employee through a survey. The heart of
//! the crate is [`conversation`]: a persistent per-chat state machine that
//! tracks survey progress across messages and finalizes each response
//! exactly once.

pub mod api;
pub mod cli;
pub mod conversation;
pub mod core;
pub mod i18n;
pub mod storage;
pub mod telegram;

pub use crate::core::error::{AppError, AppResult};
