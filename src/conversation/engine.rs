//! The survey engine: applies one trigger to one conversation and says what
//! to render next.
//!
//! All state lives in the conversation row, so a process restart loses
//! nothing. Triggers for the same key are serialized through an in-process
//! lock; the stored answer count is the source of truth for the question
//! cursor, and the index in the data blob is realigned to it whenever they
//! disagree.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use log::warn;
use serde_json::{json, Map};
use tokio::sync::Mutex;

use crate::core::error::AppResult;
use crate::core::types::{QuestionType, ResponseStatus};
use crate::storage::conversation::{ConversationKey, ConversationStore};
use crate::storage::models::{Employee, SurveyDetail, SurveyResponse};
use crate::storage::surveys::SurveyStore;

use super::state::{ConversationData, ConversationState, ErrorKind, RenderDirective, SurveyTrigger};

/// Receives completion notices for HR. Implementations swallow their own
/// delivery errors; a failed notification never affects the survey flow.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn survey_completed(&self, hr_telegram_id: i64, employee_name: &str, survey_title: &str);
}

/// The engine's answer: what to render, in which language.
#[derive(Debug, Clone)]
pub struct EngineReply {
    pub directive: RenderDirective,
    pub language: String,
}

pub struct ConversationEngine<S: SurveyStore, N: Notifier> {
    store: ConversationStore,
    surveys: Arc<S>,
    notifier: Arc<N>,
    hr_recipients: Vec<i64>,
    locks: DashMap<ConversationKey, Arc<Mutex<()>>>,
}

/// Outcome of re-validating the stored session against survey storage.
enum Loaded {
    Ready { detail: SurveyDetail, response: SurveyResponse, index: usize },
    AllAnswered { detail: SurveyDetail, response: SurveyResponse },
    Broken,
}

impl<S: SurveyStore, N: Notifier> ConversationEngine<S, N> {
    pub fn new(store: ConversationStore, surveys: Arc<S>, notifier: Arc<N>, hr_recipients: Vec<i64>) -> Self {
        Self { store, surveys, notifier, hr_recipients, locks: DashMap::new() }
    }

    /// Applies one trigger. Concurrent triggers for the same key are queued,
    /// never interleaved.
    pub async fn handle(
        &self,
        key: ConversationKey,
        employee: &Employee,
        trigger: SurveyTrigger,
    ) -> AppResult<EngineReply> {
        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let reply = {
            let _guard = lock.lock().await;
            self.apply(key, employee, trigger).await
        };
        drop(lock);
        // Our clone is gone; keep the table entry only while another task waits on it.
        self.locks.remove_if(&key, |_, entry| Arc::strong_count(entry) == 1);
        reply
    }

    async fn apply(
        &self,
        key: ConversationKey,
        employee: &Employee,
        trigger: SurveyTrigger,
    ) -> AppResult<EngineReply> {
        let state = match ConversationState::from_tag(self.store.get_state(&key).await?.as_deref()) {
            Some(state) => state,
            None => {
                warn!("unrecognized state tag for chat {}, resetting", key.chat_id);
                self.store.clear(&key).await?;
                ConversationState::Idle
            }
        };

        let data = match serde_json::from_value::<ConversationData>(self.store.get_data(&key).await?) {
            Ok(data) => data,
            Err(err) => {
                warn!("malformed conversation data for chat {}: {}", key.chat_id, err);
                self.store.clear(&key).await?;
                if state.is_in_survey() {
                    return Ok(EngineReply {
                        directive: RenderDirective::Error(ErrorKind::SessionLost),
                        language: employee.language.clone(),
                    });
                }
                ConversationData::default()
            }
        };

        let language = data.language.clone().unwrap_or_else(|| employee.language.clone());

        use ConversationState::*;
        use SurveyTrigger::*;
        let directive = match (state, trigger) {
            (Idle, Start { survey_id }) => self.start_survey(&key, employee, survey_id).await?,
            (st, Cancel) if st.is_in_survey() => self.cancel(&key, &data).await?,
            (Idle, Cancel) => {
                // Nothing to tear down; answering "cancelled" keeps /cancel idempotent.
                self.store.clear(&key).await?;
                RenderDirective::Cancelled
            }
            (st, CancelPrompt) if st.is_in_survey() && st != CancelingSurvey => {
                self.store.set_state(&key, CancelingSurvey.tag()).await?;
                RenderDirective::CancelConfirm
            }
            (CancelingSurvey, Resume) => self.resume(&key, employee, &data).await?,
            (AwaitingTextAnswer, Text(text)) => self.answer_text(&key, employee, &data, &text).await?,
            (AwaitingSingleChoice, Select { option_id }) => {
                self.answer_single(&key, employee, &data, option_id).await?
            }
            (SelectingMultipleOptions, Toggle { option_id }) => {
                self.toggle_option(&key, employee, &data, option_id).await?
            }
            (SelectingMultipleOptions, Submit) => self.submit_options(&key, employee, &data).await?,
            // Everything else is a stale button or an out-of-order event.
            _ => RenderDirective::Error(ErrorKind::WrongState),
        };

        Ok(EngineReply { directive, language })
    }

    /// The current state for a key, for transport-level routing decisions.
    pub async fn current_state(&self, key: &ConversationKey) -> AppResult<ConversationState> {
        let tag = self.store.get_state(key).await?;
        Ok(ConversationState::from_tag(tag.as_deref()).unwrap_or(ConversationState::Idle))
    }

    async fn start_survey(
        &self,
        key: &ConversationKey,
        employee: &Employee,
        survey_id: i64,
    ) -> AppResult<RenderDirective> {
        let Some(response) = self.surveys.find_open_response(survey_id, employee.id)? else {
            return Ok(RenderDirective::Error(ErrorKind::NoPendingSurvey));
        };
        let Some(detail) = self.surveys.survey_with_questions(survey_id)? else {
            return Ok(RenderDirective::Error(ErrorKind::SurveyHasNoQuestions));
        };
        if detail.questions.is_empty() {
            return Ok(RenderDirective::Error(ErrorKind::SurveyHasNoQuestions));
        }

        if response.status == ResponseStatus::Pending {
            self.surveys.set_response_status(response.id, ResponseStatus::InProgress)?;
        }

        // Resume where the saved answers left off.
        let index = self.surveys.answer_count(response.id)?;
        if index >= detail.questions.len() {
            return self.finalize(key, employee, &detail, &response).await;
        }

        let question = detail.questions[index].clone();
        let data = ConversationData {
            survey_id: Some(survey_id),
            response_id: Some(response.id),
            current_question_index: index,
            selected_option_ids: Vec::new(),
            language: Some(employee.language.clone()),
        };
        self.store.set_data(key, &serde_json::to_value(&data)?).await?;
        self.store
            .set_state(key, ConversationState::for_question(question.question_type).tag())
            .await?;

        Ok(RenderDirective::Question { question, selected: Vec::new() })
    }

    async fn answer_text(
        &self,
        key: &ConversationKey,
        employee: &Employee,
        data: &ConversationData,
        text: &str,
    ) -> AppResult<RenderDirective> {
        let (detail, response, index) = match self.load_context(data)? {
            Loaded::Ready { detail, response, index } => (detail, response, index),
            Loaded::AllAnswered { detail, response } => {
                return self.finalize(key, employee, &detail, &response).await
            }
            Loaded::Broken => return self.reset_session(key).await,
        };

        let question = &detail.questions[index];
        if question.question_type != QuestionType::Text {
            warn!("state/question drift for chat {}, resetting", key.chat_id);
            return self.reset_session(key).await;
        }

        let text = text.trim();
        if text.is_empty() {
            return Ok(RenderDirective::Error(ErrorKind::EmptyAnswer));
        }

        self.surveys.save_answer(response.id, question.id, Some(text), None)?;
        self.advance(key, employee, &detail, &response, index + 1).await
    }

    async fn answer_single(
        &self,
        key: &ConversationKey,
        employee: &Employee,
        data: &ConversationData,
        option_id: i64,
    ) -> AppResult<RenderDirective> {
        let (detail, response, index) = match self.load_context(data)? {
            Loaded::Ready { detail, response, index } => (detail, response, index),
            Loaded::AllAnswered { detail, response } => {
                return self.finalize(key, employee, &detail, &response).await
            }
            Loaded::Broken => return self.reset_session(key).await,
        };

        let question = &detail.questions[index];
        if question.question_type != QuestionType::SingleChoice {
            warn!("state/question drift for chat {}, resetting", key.chat_id);
            return self.reset_session(key).await;
        }
        if !question.has_option(option_id) {
            return Ok(RenderDirective::Error(ErrorKind::OptionNotFound));
        }

        self.surveys.save_answer(response.id, question.id, None, Some(&[option_id]))?;
        self.advance(key, employee, &detail, &response, index + 1).await
    }

    async fn toggle_option(
        &self,
        key: &ConversationKey,
        employee: &Employee,
        data: &ConversationData,
        option_id: i64,
    ) -> AppResult<RenderDirective> {
        let (detail, index) = match self.load_context(data)? {
            Loaded::Ready { detail, index, .. } => (detail, index),
            Loaded::AllAnswered { detail, response } => {
                return self.finalize(key, employee, &detail, &response).await
            }
            Loaded::Broken => return self.reset_session(key).await,
        };

        let question = &detail.questions[index];
        if question.question_type != QuestionType::MultipleChoice {
            warn!("state/question drift for chat {}, resetting", key.chat_id);
            return self.reset_session(key).await;
        }
        if !question.has_option(option_id) {
            return Ok(RenderDirective::Error(ErrorKind::OptionNotFound));
        }

        let mut selected = data.selected_option_ids.clone();
        if let Some(pos) = selected.iter().position(|&id| id == option_id) {
            selected.remove(pos);
        } else {
            selected.push(option_id);
        }

        let mut patch = Map::new();
        patch.insert("selected_option_ids".to_string(), json!(selected));
        self.store.update_data(key, &patch).await?;

        Ok(RenderDirective::Question { question: question.clone(), selected })
    }

    async fn submit_options(
        &self,
        key: &ConversationKey,
        employee: &Employee,
        data: &ConversationData,
    ) -> AppResult<RenderDirective> {
        let (detail, response, index) = match self.load_context(data)? {
            Loaded::Ready { detail, response, index } => (detail, response, index),
            Loaded::AllAnswered { detail, response } => {
                return self.finalize(key, employee, &detail, &response).await
            }
            Loaded::Broken => return self.reset_session(key).await,
        };

        let question = &detail.questions[index];
        if question.question_type != QuestionType::MultipleChoice {
            warn!("state/question drift for chat {}, resetting", key.chat_id);
            return self.reset_session(key).await;
        }
        if data.selected_option_ids.is_empty() {
            return Ok(RenderDirective::Error(ErrorKind::NoOptionSelected));
        }

        self.surveys
            .save_answer(response.id, question.id, None, Some(&data.selected_option_ids))?;
        self.advance(key, employee, &detail, &response, index + 1).await
    }

    /// Back from the cancel confirmation to the current question.
    async fn resume(
        &self,
        key: &ConversationKey,
        employee: &Employee,
        data: &ConversationData,
    ) -> AppResult<RenderDirective> {
        let (detail, _response, index) = match self.load_context(data)? {
            Loaded::Ready { detail, response, index } => (detail, response, index),
            Loaded::AllAnswered { detail, response } => {
                return self.finalize(key, employee, &detail, &response).await
            }
            Loaded::Broken => return self.reset_session(key).await,
        };

        let question = detail.questions[index].clone();
        self.store
            .set_state(key, ConversationState::for_question(question.question_type).tag())
            .await?;

        Ok(RenderDirective::Question { question, selected: data.selected_option_ids.clone() })
    }

    async fn cancel(&self, key: &ConversationKey, data: &ConversationData) -> AppResult<RenderDirective> {
        if let Some(response_id) = data.response_id {
            if let Some(response) = self.surveys.get_response(response_id)? {
                if !response.status.is_terminal() {
                    self.surveys.set_response_status(response_id, ResponseStatus::Cancelled)?;
                }
            }
        }
        self.store.clear(key).await?;
        Ok(RenderDirective::Cancelled)
    }

    /// Moves the cursor to `next_index` or finishes the survey.
    async fn advance(
        &self,
        key: &ConversationKey,
        employee: &Employee,
        detail: &SurveyDetail,
        response: &SurveyResponse,
        next_index: usize,
    ) -> AppResult<RenderDirective> {
        if next_index >= detail.questions.len() {
            return self.finalize(key, employee, detail, response).await;
        }

        let question = detail.questions[next_index].clone();
        let mut patch = Map::new();
        patch.insert("current_question_index".to_string(), json!(next_index));
        patch.insert("selected_option_ids".to_string(), json!([] as [i64; 0]));
        self.store.update_data(key, &patch).await?;
        self.store
            .set_state(key, ConversationState::for_question(question.question_type).tag())
            .await?;

        Ok(RenderDirective::Question { question, selected: Vec::new() })
    }

    async fn finalize(
        &self,
        key: &ConversationKey,
        employee: &Employee,
        detail: &SurveyDetail,
        response: &SurveyResponse,
    ) -> AppResult<RenderDirective> {
        if !response.status.is_terminal() {
            self.surveys.set_response_status(response.id, ResponseStatus::Completed)?;
        }
        self.store.clear(key).await?;

        // The completion reply must not wait on Telegram deliveries.
        if !self.hr_recipients.is_empty() {
            let notifier = Arc::clone(&self.notifier);
            let recipients = self.hr_recipients.clone();
            let name = employee.display_name();
            let title = detail.survey.title.clone();
            tokio::spawn(async move {
                for hr_id in recipients {
                    notifier.survey_completed(hr_id, &name, &title).await;
                }
            });
        }

        Ok(RenderDirective::Completed)
    }

    async fn reset_session(&self, key: &ConversationKey) -> AppResult<RenderDirective> {
        self.store.clear(key).await?;
        Ok(RenderDirective::Error(ErrorKind::SessionLost))
    }

    /// Re-validates the stored session. The answer count is authoritative
    /// for the cursor; a missing survey, a terminal response, or a blob
    /// without ids means the session cannot continue.
    fn load_context(&self, data: &ConversationData) -> AppResult<Loaded> {
        let (Some(survey_id), Some(response_id)) = (data.survey_id, data.response_id) else {
            return Ok(Loaded::Broken);
        };

        let Some(response) = self.surveys.get_response(response_id)? else {
            return Ok(Loaded::Broken);
        };
        if response.status.is_terminal() {
            return Ok(Loaded::Broken);
        }

        let Some(detail) = self.surveys.survey_with_questions(survey_id)? else {
            return Ok(Loaded::Broken);
        };
        if detail.questions.is_empty() {
            return Ok(Loaded::Broken);
        }

        let count = self.surveys.answer_count(response_id)?;
        if count != data.current_question_index {
            warn!(
                "question cursor {} disagrees with {} saved answers for response {}, realigning",
                data.current_question_index, count, response_id
            );
        }
        if count >= detail.questions.len() {
            return Ok(Loaded::AllAnswered { detail, response });
        }

        Ok(Loaded::Ready { detail, response, index: count })
    }
}
