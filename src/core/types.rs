//! Domain enums shared between storage, the engine, and the API.
//!
//! Both enums are stored as strings in SQLite, matching the column values
//! the REST layer exposes, so the string mapping is the canonical one.

use serde::{Deserialize, Serialize};

/// Question type within a survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    SingleChoice,
    MultipleChoice,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Text => "text",
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(QuestionType::Text),
            "single_choice" => Some(QuestionType::SingleChoice),
            "multiple_choice" => Some(QuestionType::MultipleChoice),
            _ => None,
        }
    }
}

/// Lifecycle status of one employee's attempt at a survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Pending => "pending",
            ResponseStatus::InProgress => "in_progress",
            ResponseStatus::Completed => "completed",
            ResponseStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ResponseStatus::Pending),
            "in_progress" => Some(ResponseStatus::InProgress),
            "completed" => Some(ResponseStatus::Completed),
            "cancelled" => Some(ResponseStatus::Cancelled),
            _ => None,
        }
    }

    /// Completed and Cancelled accept no further answers.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResponseStatus::Completed | ResponseStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_type_round_trips() {
        for ty in [QuestionType::Text, QuestionType::SingleChoice, QuestionType::MultipleChoice] {
            assert_eq!(QuestionType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(QuestionType::parse("rating"), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!ResponseStatus::Pending.is_terminal());
        assert!(!ResponseStatus::InProgress.is_terminal());
        assert!(ResponseStatus::Completed.is_terminal());
        assert!(ResponseStatus::Cancelled.is_terminal());
    }
}
