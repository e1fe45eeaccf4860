//! Row structs shared by the storage layer, the engine, and the REST API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::types::{QuestionType, ResponseStatus};

/// An employee known to the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    /// Telegram ID (unique per employee)
    pub telegram_id: i64,
    pub telegram_username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// First working day; eligibility windows are counted from here
    pub start_date: NaiveDate,
    pub branch: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    /// Preferred bot language code ("ru", "en")
    pub language: String,
    pub is_active: bool,
    pub created_at: String,
}

impl Employee {
    /// "First Last" display name used in HR notifications.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(f), Some(l)) => format!("{} {}", f, l),
            (Some(f), None) => f.clone(),
            (None, Some(l)) => l.clone(),
            (None, None) => format!("employee #{}", self.id),
        }
    }

    /// Full days elapsed since the employee's start date.
    pub fn days_since_start(&self, today: NaiveDate) -> i64 {
        (today - self.start_date).num_days()
    }
}

/// A survey definition (without its questions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Minimum tenure in days before the survey may be initiated
    pub days_after_start: i64,
    pub is_active: bool,
    pub created_at: String,
}

/// One question inside a survey, with its options preloaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub survey_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub order_index: i64,
    pub is_required: bool,
    /// Ordered options; empty for text questions
    pub options: Vec<QuestionOption>,
}

impl Question {
    /// Whether `option_id` belongs to this question.
    pub fn has_option(&self, option_id: i64) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }
}

/// One selectable option of a choice question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    pub option_text: String,
    pub order_index: i64,
}

/// A survey together with its ordered questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyDetail {
    #[serde(flatten)]
    pub survey: Survey,
    pub questions: Vec<Question>,
}

/// One employee's attempt at a survey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: i64,
    pub survey_id: i64,
    pub employee_id: i64,
    pub status: ResponseStatus,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// One persisted reply to one question within one response.
///
/// Exactly one of `answer_text` / `answer_options` carries data; answers are
/// immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: i64,
    pub response_id: i64,
    pub question_id: i64,
    pub answer_text: Option<String>,
    pub answer_options: Option<Vec<i64>>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_handles_missing_parts() {
        let mut emp = Employee {
            id: 7,
            telegram_id: 1,
            telegram_username: None,
            first_name: Some("Aijan".to_string()),
            last_name: Some("Toktogulova".to_string()),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(),
            branch: None,
            department: None,
            position: None,
            language: "ru".to_string(),
            is_active: true,
            created_at: String::new(),
        };
        assert_eq!(emp.display_name(), "Aijan Toktogulova");

        emp.last_name = None;
        assert_eq!(emp.display_name(), "Aijan");

        emp.first_name = None;
        assert_eq!(emp.display_name(), "employee #7");
    }

    #[test]
    fn days_since_start_counts_full_days() {
        let emp = Employee {
            id: 1,
            telegram_id: 1,
            telegram_username: None,
            first_name: None,
            last_name: None,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            branch: None,
            department: None,
            position: None,
            language: "ru".to_string(),
            is_active: true,
            created_at: String::new(),
        };
        let today = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        assert_eq!(emp.days_since_start(today), 90);
    }
}
