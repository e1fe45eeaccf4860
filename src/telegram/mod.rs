//! Telegram transport: bot setup, dispatch, rendering, and notifications.

pub mod bot;
pub mod dispatch;
pub mod keyboards;
pub mod notifications;
pub mod render;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use dispatch::{schema, HandlerDeps, HandlerError};
pub use notifications::NotificationService;

use teloxide::types::InlineKeyboardButton;

/// Shorthand for an inline callback button.
pub fn cb<T: Into<String>>(text: T, data: &str) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text.into(), data.to_string())
}
