//! Bot instance creation and command registration.

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Я умею:")]
pub enum Command {
    #[command(description = "показать главное меню")]
    Start,
    #[command(description = "справка по опросам")]
    Help,
    #[command(description = "отменить текущий опрос")]
    Cancel,
}

/// Creates a Bot instance with a request timeout.
pub fn create_bot() -> anyhow::Result<Bot> {
    let token = config::BOT_TOKEN.clone();
    if token.is_empty() {
        anyhow::bail!("BOT_TOKEN is not set");
    }

    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    Ok(Bot::with_client(token, client))
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "показать главное меню"),
        BotCommand::new("help", "справка по опросам"),
        BotCommand::new("cancel", "отменить текущий опрос"),
    ])
    .await?;

    Ok(())
}
