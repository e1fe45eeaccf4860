//! Dispatcher schema and handler chain builders.

use std::sync::Arc;

use fluent_templates::fluent_bundle::FluentArgs;
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{MaybeInaccessibleMessage, MessageId, User, UserId};
use unic_langid::LanguageIdentifier;

use crate::conversation::{ConversationEngine, SurveyTrigger};
use crate::core::error::AppResult;
use crate::i18n;
use crate::storage::conversation::ConversationKey;
use crate::storage::db::{get_connection, DbPool};
use crate::storage::models::Employee;
use crate::storage::surveys::SqliteSurveyStore;
use crate::storage::{employees, surveys};
use crate::telegram::bot::Command;
use crate::telegram::notifications::NotificationService;
use crate::telegram::{keyboards, render};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The engine variant wired up in production.
pub type BotEngine = ConversationEngine<SqliteSurveyStore, NotificationService>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub engine: Arc<BotEngine>,
    pub bot_id: UserId,
}

impl HandlerDeps {
    pub fn new(db_pool: Arc<DbPool>, engine: Arc<BotEngine>, bot_id: UserId) -> Self {
        Self { db_pool, engine, bot_id }
    }

    fn key(&self, chat_id: ChatId, telegram_user_id: i64) -> ConversationKey {
        ConversationKey::new(chat_id.0, telegram_user_id, self.bot_id.0 as i64)
    }
}

/// Creates the main dispatcher schema for the Telegram bot.
///
/// The same schema is used in production and in integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_callback = deps.clone();
    let deps_messages = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(callback_handler(deps_callback))
        .branch(message_handler(deps_messages))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter_command::<Command>()
        .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                let Some(user) = msg.from.clone() else {
                    return Ok(());
                };

                let result = match cmd {
                    Command::Start => handle_start(&bot, &deps, &user, msg.chat.id).await,
                    Command::Help => handle_help(&bot, &deps, &user, msg.chat.id).await,
                    Command::Cancel => handle_cancel(&bot, &deps, &user, msg.chat.id).await,
                };
                if let Err(err) = result {
                    log::error!("command handler failed for chat {}: {}", msg.chat.id.0, err);
                }
                Ok(())
            }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            if let Err(err) = handle_callback(&bot, &deps, &q).await {
                log::error!("callback handler failed for user {}: {}", q.from.id.0, err);
            }
            Ok(())
        }
    })
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
        let deps = deps.clone();
        async move {
            if let Err(err) = handle_text_message(&bot, &deps, &msg).await {
                log::error!("message handler failed for chat {}: {}", msg.chat.id.0, err);
            }
            Ok(())
        }
    })
}

/// Looks up the employee, provisioning a record and prompting for a language
/// on first contact. `None` means the language prompt was just shown and the
/// caller should stop.
async fn ensure_employee(
    bot: &Bot,
    deps: &HandlerDeps,
    user: &User,
    chat_id: ChatId,
) -> AppResult<Option<Employee>> {
    let telegram_id = user.id.0 as i64;
    {
        let conn = get_connection(&deps.db_pool)?;
        if let Some(existing) = employees::get_by_telegram_id(&conn, telegram_id)? {
            return Ok(Some(existing));
        }
    }

    let language = user
        .language_code
        .as_deref()
        .and_then(i18n::is_language_supported)
        .unwrap_or("ru")
        .to_string();

    {
        let conn = get_connection(&deps.db_pool)?;
        employees::create(
            &conn,
            &employees::NewEmployee {
                telegram_id,
                telegram_username: user.username.clone(),
                first_name: Some(user.first_name.clone()),
                last_name: user.last_name.clone(),
                start_date: chrono::Utc::now().date_naive(),
                branch: None,
                department: None,
                position: None,
                language,
            },
        )?;
    }
    log::info!("provisioned employee for telegram user {}", telegram_id);

    bot.send_message(chat_id, i18n::t(&i18n::lang_from_code("ru"), "menu-language-prompt"))
        .reply_markup(keyboards::language_keyboard())
        .await?;
    Ok(None)
}

fn main_menu_text(lang: &LanguageIdentifier, employee: &Employee, pending: usize) -> String {
    let mut args = FluentArgs::new();
    args.set("name", employee.display_name());

    let mut text = i18n::t_args(lang, "menu-greeting", &args);
    text.push('\n');
    text.push_str(&i18n::t(lang, "menu-intro"));
    text.push_str("\n\n");
    if pending > 0 {
        let mut count_args = FluentArgs::new();
        count_args.set("count", pending);
        text.push_str(&i18n::t_args(lang, "menu-pending-surveys", &count_args));
    } else {
        text.push_str(&i18n::t(lang, "menu-no-surveys"));
    }
    text
}

async fn show_main_menu(
    bot: &Bot,
    deps: &HandlerDeps,
    employee: &Employee,
    chat_id: ChatId,
    edit: Option<MessageId>,
) -> AppResult<()> {
    let pending = {
        let conn = get_connection(&deps.db_pool)?;
        surveys::open_responses_with_surveys(&conn, employee.id)?.len()
    };

    let lang = i18n::lang_from_code(&employee.language);
    let text = main_menu_text(&lang, employee, pending);
    let keyboard = keyboards::main_menu_keyboard(&lang);

    match edit {
        Some(message_id) => {
            bot.edit_message_text(chat_id, message_id, text).reply_markup(keyboard).await?;
        }
        None => {
            bot.send_message(chat_id, text).reply_markup(keyboard).await?;
        }
    }
    Ok(())
}

async fn show_survey_list(
    bot: &Bot,
    deps: &HandlerDeps,
    employee: &Employee,
    chat_id: ChatId,
    edit: Option<MessageId>,
) -> AppResult<()> {
    let open = {
        let conn = get_connection(&deps.db_pool)?;
        surveys::open_responses_with_surveys(&conn, employee.id)?
    };

    let lang = i18n::lang_from_code(&employee.language);
    let (text, keyboard) = if open.is_empty() {
        (i18n::t(&lang, "menu-no-surveys"), keyboards::back_keyboard(&lang))
    } else {
        (i18n::t(&lang, "survey-select"), keyboards::survey_list_keyboard(&lang, &open))
    };

    match edit {
        Some(message_id) => {
            bot.edit_message_text(chat_id, message_id, text).reply_markup(keyboard).await?;
        }
        None => {
            bot.send_message(chat_id, text).reply_markup(keyboard).await?;
        }
    }
    Ok(())
}

async fn show_help(
    bot: &Bot,
    employee: &Employee,
    chat_id: ChatId,
    edit: Option<MessageId>,
) -> AppResult<()> {
    let lang = i18n::lang_from_code(&employee.language);
    let text = i18n::t(&lang, "menu-help-text");
    let keyboard = keyboards::back_keyboard(&lang);

    match edit {
        Some(message_id) => {
            bot.edit_message_text(chat_id, message_id, text).reply_markup(keyboard).await?;
        }
        None => {
            bot.send_message(chat_id, text).reply_markup(keyboard).await?;
        }
    }
    Ok(())
}

/// Feeds one trigger to the engine and renders the outcome.
async fn run_engine(
    bot: &Bot,
    deps: &HandlerDeps,
    employee: &Employee,
    chat_id: ChatId,
    edit: Option<MessageId>,
    trigger: SurveyTrigger,
) -> AppResult<()> {
    let key = deps.key(chat_id, employee.telegram_id);
    match deps.engine.handle(key, employee, trigger).await {
        Ok(reply) => {
            render::send_reply(bot, chat_id, edit, &reply).await?;
        }
        Err(err) => {
            log::error!("engine failure for chat {}: {}", chat_id.0, err);
            let lang = i18n::lang_from_code(&employee.language);
            bot.send_message(chat_id, i18n::t(&lang, "error-try-later")).await?;
        }
    }
    Ok(())
}

async fn handle_start(bot: &Bot, deps: &HandlerDeps, user: &User, chat_id: ChatId) -> AppResult<()> {
    let Some(employee) = ensure_employee(bot, deps, user, chat_id).await? else {
        return Ok(());
    };
    show_main_menu(bot, deps, &employee, chat_id, None).await
}

async fn handle_help(bot: &Bot, deps: &HandlerDeps, user: &User, chat_id: ChatId) -> AppResult<()> {
    let Some(employee) = ensure_employee(bot, deps, user, chat_id).await? else {
        return Ok(());
    };
    show_help(bot, &employee, chat_id, None).await
}

async fn handle_cancel(bot: &Bot, deps: &HandlerDeps, user: &User, chat_id: ChatId) -> AppResult<()> {
    let Some(employee) = ensure_employee(bot, deps, user, chat_id).await? else {
        return Ok(());
    };
    run_engine(bot, deps, &employee, chat_id, None, SurveyTrigger::Cancel).await
}

async fn handle_callback(bot: &Bot, deps: &HandlerDeps, q: &CallbackQuery) -> AppResult<()> {
    // Always acknowledge so the client stops its spinner.
    if let Err(err) = bot.answer_callback_query(q.id.clone()).await {
        log::debug!("answer_callback_query failed: {}", err);
    }

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let message_id = match message {
        MaybeInaccessibleMessage::Regular(msg) => Some(msg.id),
        MaybeInaccessibleMessage::Inaccessible(_) => None,
    };

    if let Some(code) = data.strip_prefix("lang_") {
        return handle_language_choice(bot, deps, &q.from, chat_id, code).await;
    }

    let Some(employee) = ensure_employee(bot, deps, &q.from, chat_id).await? else {
        return Ok(());
    };

    let trigger = match data {
        "my_surveys" => return show_survey_list(bot, deps, &employee, chat_id, message_id).await,
        "help" => return show_help(bot, &employee, chat_id, message_id).await,
        "back_to_menu" => return show_main_menu(bot, deps, &employee, chat_id, message_id).await,
        "submit_options" => SurveyTrigger::Submit,
        "cancel_survey" => SurveyTrigger::CancelPrompt,
        "confirm_cancel" => SurveyTrigger::Cancel,
        "resume_survey" => SurveyTrigger::Resume,
        _ => {
            if let Some(id) = parse_id(data, "start_survey_") {
                SurveyTrigger::Start { survey_id: id }
            } else if let Some(id) = parse_id(data, "option_") {
                SurveyTrigger::Select { option_id: id }
            } else if let Some(id) = parse_id(data, "toggle_option_") {
                SurveyTrigger::Toggle { option_id: id }
            } else {
                log::warn!("unknown callback payload '{}' from user {}", data, q.from.id.0);
                return Ok(());
            }
        }
    };

    run_engine(bot, deps, &employee, chat_id, message_id, trigger).await
}

fn parse_id(data: &str, prefix: &str) -> Option<i64> {
    data.strip_prefix(prefix)?.parse().ok()
}

async fn handle_language_choice(
    bot: &Bot,
    deps: &HandlerDeps,
    user: &User,
    chat_id: ChatId,
    code: &str,
) -> AppResult<()> {
    let Some(code) = i18n::is_language_supported(code) else {
        log::warn!("unsupported language '{}' from user {}", code, user.id.0);
        return Ok(());
    };

    let telegram_id = user.id.0 as i64;
    let employee = {
        let conn = get_connection(&deps.db_pool)?;
        employees::set_language(&conn, telegram_id, code)?;
        employees::get_by_telegram_id(&conn, telegram_id)?
    };
    let Some(employee) = employee else {
        return Ok(());
    };

    let lang = i18n::lang_from_code(code);
    let mut args = FluentArgs::new();
    args.set("language", i18n::language_name(code));
    bot.send_message(chat_id, i18n::t_args(&lang, "menu-language-saved", &args)).await?;

    show_main_menu(bot, deps, &employee, chat_id, None).await
}

async fn handle_text_message(bot: &Bot, deps: &HandlerDeps, msg: &Message) -> AppResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if text.starts_with('/') {
        return Ok(());
    }
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };

    let Some(employee) = ensure_employee(bot, deps, &user, msg.chat.id).await? else {
        return Ok(());
    };

    // Free text only matters while a survey expects it.
    let key = deps.key(msg.chat.id, employee.telegram_id);
    let state = deps.engine.current_state(&key).await?;
    if !state.is_in_survey() {
        log::debug!("ignoring text from idle chat {}", msg.chat.id.0);
        return Ok(());
    }

    run_engine(bot, deps, &employee, msg.chat.id, None, SurveyTrigger::Text(text.to_string())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn callback_payload_ids_parse() {
        assert_eq!(parse_id("start_survey_12", "start_survey_"), Some(12));
        assert_eq!(parse_id("toggle_option_7", "toggle_option_"), Some(7));
        assert_eq!(parse_id("option_abc", "option_"), None);
        assert_eq!(parse_id("submit_options", "option_"), None);
    }
}
