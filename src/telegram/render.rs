//! Turns engine directives into Telegram messages.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId};
use unic_langid::LanguageIdentifier;

use crate::conversation::{EngineReply, RenderDirective};
use crate::core::types::QuestionType;
use crate::i18n;
use crate::storage::models::Question;
use crate::telegram::keyboards;

fn question_text(lang: &LanguageIdentifier, question: &Question) -> String {
    let mut text = format!("❓ {}", question.question_text);
    match question.question_type {
        QuestionType::Text => {
            text.push_str("\n\n");
            text.push_str(&i18n::t(lang, "question-enter-answer"));
        }
        QuestionType::MultipleChoice => {
            text.push_str("\n\n");
            text.push_str(&i18n::t(lang, "question-select-multiple"));
        }
        QuestionType::SingleChoice => {}
    }
    text
}

/// Sends (or edits) the message a directive asks for.
///
/// Rejections always go out as a fresh message so the live question keyboard
/// stays usable; everything else edits the pressed message when one is given.
pub async fn send_reply(
    bot: &Bot,
    chat_id: ChatId,
    edit: Option<MessageId>,
    reply: &EngineReply,
) -> ResponseResult<()> {
    let lang = i18n::lang_from_code(&reply.language);

    let (text, keyboard, allow_edit): (String, Option<InlineKeyboardMarkup>, bool) = match &reply.directive {
        RenderDirective::Question { question, selected } => (
            question_text(&lang, question),
            Some(keyboards::question_keyboard(&lang, question, selected)),
            true,
        ),
        RenderDirective::CancelConfirm => (
            i18n::t(&lang, "survey-cancel-confirm"),
            Some(keyboards::cancel_confirm_keyboard(&lang)),
            true,
        ),
        RenderDirective::Completed => {
            (i18n::t(&lang, "survey-completed"), Some(keyboards::back_keyboard(&lang)), true)
        }
        RenderDirective::Cancelled => {
            (i18n::t(&lang, "survey-cancelled"), Some(keyboards::back_keyboard(&lang)), true)
        }
        RenderDirective::Error(kind) => (i18n::t(&lang, kind.message_key()), None, false),
    };

    if allow_edit {
        if let Some(message_id) = edit {
            let mut request = bot.edit_message_text(chat_id, message_id, &text);
            if let Some(kb) = keyboard.clone() {
                request = request.reply_markup(kb);
            }
            match request.await {
                Ok(_) => return Ok(()),
                Err(err) => {
                    // Message too old or unchanged; fall through to a new message.
                    log::debug!("edit failed for chat {}: {}, sending instead", chat_id.0, err);
                }
            }
        }
    }

    let mut request = bot.send_message(chat_id, text);
    if let Some(kb) = keyboard {
        request = request.reply_markup(kb);
    }
    request.await?;
    Ok(())
}
