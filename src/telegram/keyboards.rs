//! Inline keyboard builders for the survey flow and the main menu.

use teloxide::types::InlineKeyboardMarkup;
use unic_langid::LanguageIdentifier;

use crate::core::types::{QuestionType, ResponseStatus};
use crate::i18n;
use crate::storage::models::{Question, Survey, SurveyResponse};
use crate::telegram::cb;

/// Keyboard shown under a question. Text questions get only the cancel row.
pub fn question_keyboard(lang: &LanguageIdentifier, question: &Question, selected: &[i64]) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();

    match question.question_type {
        QuestionType::Text => {}
        QuestionType::SingleChoice => {
            for option in &question.options {
                rows.push(vec![cb(option.option_text.clone(), &format!("option_{}", option.id))]);
            }
        }
        QuestionType::MultipleChoice => {
            for option in &question.options {
                let mark = if selected.contains(&option.id) { "☑" } else { "☐" };
                rows.push(vec![cb(
                    format!("{} {}", mark, option.option_text),
                    &format!("toggle_option_{}", option.id),
                )]);
            }
            rows.push(vec![cb(i18n::t(lang, "question-submit-button"), "submit_options")]);
        }
    }

    rows.push(vec![cb(i18n::t(lang, "survey-cancel-button"), "cancel_survey")]);
    InlineKeyboardMarkup::new(rows)
}

/// "Really cancel?" confirmation keyboard.
pub fn cancel_confirm_keyboard(lang: &LanguageIdentifier) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![cb(i18n::t(lang, "survey-confirm-cancel-button"), "confirm_cancel")],
        vec![cb(i18n::t(lang, "survey-resume-button"), "resume_survey")],
    ])
}

/// One button per open survey, marked pending or in progress.
pub fn survey_list_keyboard(
    lang: &LanguageIdentifier,
    open: &[(SurveyResponse, Survey)],
) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    for (response, survey) in open {
        let marker_key = match response.status {
            ResponseStatus::InProgress => "survey-in-progress-marker",
            _ => "survey-pending-marker",
        };
        rows.push(vec![cb(
            format!("{} {}", i18n::t(lang, marker_key), survey.title),
            &format!("start_survey_{}", survey.id),
        )]);
    }
    rows.push(vec![cb(i18n::t(lang, "menu-back-button"), "back_to_menu")]);
    InlineKeyboardMarkup::new(rows)
}

/// Main menu keyboard.
pub fn main_menu_keyboard(lang: &LanguageIdentifier) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![cb(i18n::t(lang, "menu-my-surveys-button"), "my_surveys")],
        vec![cb(i18n::t(lang, "menu-help-button"), "help")],
    ])
}

/// A single back-to-menu row.
pub fn back_keyboard(lang: &LanguageIdentifier) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![cb(i18n::t(lang, "menu-back-button"), "back_to_menu")]])
}

/// Language picker shown to first-time users.
pub fn language_keyboard() -> InlineKeyboardMarkup {
    let rows = i18n::SUPPORTED_LANGS
        .iter()
        .map(|(code, name)| vec![cb(name.to_string(), &format!("lang_{}", code))])
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}
