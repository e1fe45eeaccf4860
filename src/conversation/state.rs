//! State, trigger, and directive types for the survey conversation.

use serde::{Deserialize, Serialize};

use crate::core::types::QuestionType;
use crate::storage::models::Question;

/// Where one conversation currently stands. Persisted as a tag string in the
/// `state` column; `Idle` maps to NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    AwaitingTextAnswer,
    AwaitingSingleChoice,
    SelectingMultipleOptions,
    CancelingSurvey,
}

impl ConversationState {
    /// Tag string stored in the database; `None` for `Idle`.
    pub fn tag(self) -> Option<&'static str> {
        match self {
            Self::Idle => None,
            Self::AwaitingTextAnswer => Some("awaiting_text_answer"),
            Self::AwaitingSingleChoice => Some("awaiting_single_choice"),
            Self::SelectingMultipleOptions => Some("selecting_multiple_options"),
            Self::CancelingSurvey => Some("canceling_survey"),
        }
    }

    /// Parses a stored tag. `None` input means an absent row or NULL column,
    /// which reads as `Idle`; an unrecognized tag yields `None`.
    pub fn from_tag(tag: Option<&str>) -> Option<Self> {
        match tag {
            None => Some(Self::Idle),
            Some("awaiting_text_answer") => Some(Self::AwaitingTextAnswer),
            Some("awaiting_single_choice") => Some(Self::AwaitingSingleChoice),
            Some("selecting_multiple_options") => Some(Self::SelectingMultipleOptions),
            Some("canceling_survey") => Some(Self::CancelingSurvey),
            Some(_) => None,
        }
    }

    /// The waiting state matching a question type.
    pub fn for_question(question_type: QuestionType) -> Self {
        match question_type {
            QuestionType::Text => Self::AwaitingTextAnswer,
            QuestionType::SingleChoice => Self::AwaitingSingleChoice,
            QuestionType::MultipleChoice => Self::SelectingMultipleOptions,
        }
    }

    /// True for every state except `Idle`.
    pub fn is_in_survey(self) -> bool {
        self != Self::Idle
    }
}

/// The JSON blob stored alongside the state tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationData {
    pub survey_id: Option<i64>,
    pub response_id: Option<i64>,
    #[serde(default)]
    pub current_question_index: usize,
    #[serde(default)]
    pub selected_option_ids: Vec<i64>,
    pub language: Option<String>,
}

/// An incoming event already decoded by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurveyTrigger {
    Start { survey_id: i64 },
    Text(String),
    Select { option_id: i64 },
    Toggle { option_id: i64 },
    Submit,
    CancelPrompt,
    Resume,
    Cancel,
}

/// What the transport should show the employee next. The engine never
/// formats user-facing text itself.
#[derive(Debug, Clone)]
pub enum RenderDirective {
    Question { question: Question, selected: Vec<i64> },
    CancelConfirm,
    Completed,
    Cancelled,
    Error(ErrorKind),
}

/// User-visible rejection reasons, keyed into the message catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoPendingSurvey,
    SurveyHasNoQuestions,
    EmptyAnswer,
    NoOptionSelected,
    OptionNotFound,
    WrongState,
    SessionLost,
}

impl ErrorKind {
    pub fn message_key(self) -> &'static str {
        match self {
            Self::NoPendingSurvey => "error-no-pending-survey",
            Self::SurveyHasNoQuestions => "error-survey-no-questions",
            Self::EmptyAnswer => "error-empty-answer",
            Self::NoOptionSelected => "error-select-at-least-one",
            Self::OptionNotFound => "error-option-not-found",
            Self::WrongState => "error-wrong-state",
            Self::SessionLost => "error-session-lost",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tags_round_trip() {
        for state in [
            ConversationState::Idle,
            ConversationState::AwaitingTextAnswer,
            ConversationState::AwaitingSingleChoice,
            ConversationState::SelectingMultipleOptions,
            ConversationState::CancelingSurvey,
        ] {
            assert_eq!(ConversationState::from_tag(state.tag()), Some(state));
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert_eq!(ConversationState::from_tag(Some("no_such_state")), None);
    }

    #[test]
    fn data_blob_tolerates_missing_fields() {
        let data: ConversationData = serde_json::from_str("{}").unwrap();
        assert_eq!(data.survey_id, None);
        assert_eq!(data.current_question_index, 0);
        assert!(data.selected_option_ids.is_empty());
    }
}
