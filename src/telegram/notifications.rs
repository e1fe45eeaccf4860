//! Outbound notifications: survey invites, reminders, and HR completion
//! notices.

use std::sync::Arc;

use async_trait::async_trait;
use fluent_templates::fluent_bundle::FluentArgs;
use teloxide::prelude::*;

use crate::conversation::Notifier;
use crate::core::error::{AppError, AppResult};
use crate::i18n;
use crate::storage::db::{get_connection, DbPool};
use crate::storage::models::{Employee, Survey};
use crate::storage::{employees, surveys};

/// Sends survey-related messages on behalf of HR.
#[derive(Clone)]
pub struct NotificationService {
    bot: Bot,
    db_pool: Arc<DbPool>,
}

impl NotificationService {
    pub fn new(bot: Bot, db_pool: Arc<DbPool>) -> Self {
        Self { bot, db_pool }
    }

    fn load_pair(&self, employee_id: i64, survey_id: i64) -> AppResult<(Employee, Survey)> {
        let conn = get_connection(&self.db_pool)?;
        let employee = employees::get(&conn, employee_id)?
            .ok_or_else(|| AppError::NotFound(format!("employee {}", employee_id)))?;
        let survey = surveys::get_survey(&conn, survey_id)?
            .ok_or_else(|| AppError::NotFound(format!("survey {}", survey_id)))?;
        Ok((employee, survey))
    }

    /// Invites an employee to a survey, creating the pending response that
    /// the bot later picks up.
    pub async fn send_survey_invite(&self, employee_id: i64, survey_id: i64) -> AppResult<()> {
        let (employee, survey) = self.load_pair(employee_id, survey_id)?;
        {
            let conn = get_connection(&self.db_pool)?;
            surveys::get_or_create_response(&conn, survey_id, employee_id)?;
        }

        let lang = i18n::lang_from_code(&employee.language);
        let mut args = FluentArgs::new();
        args.set("name", employee.display_name());
        args.set("title", survey.title.clone());
        args.set(
            "description",
            survey
                .description
                .clone()
                .unwrap_or_else(|| i18n::t(&lang, "notify-invite-no-description")),
        );

        self.bot
            .send_message(ChatId(employee.telegram_id), i18n::t_args(&lang, "notify-invite", &args))
            .await?;
        Ok(())
    }

    /// Reminds one employee about an unfinished survey.
    pub async fn send_reminder(
        &self,
        employee_id: i64,
        survey_id: i64,
        days_left: Option<i64>,
    ) -> AppResult<()> {
        let (employee, survey) = self.load_pair(employee_id, survey_id)?;

        let lang = i18n::lang_from_code(&employee.language);
        let mut args = FluentArgs::new();
        args.set("title", survey.title.clone());
        let mut text = i18n::t_args(&lang, "notify-reminder", &args);

        if let Some(days) = days_left {
            let mut deadline_args = FluentArgs::new();
            deadline_args.set("days", days);
            text.push_str("\n\n");
            text.push_str(&i18n::t_args(&lang, "notify-reminder-deadline", &deadline_args));
        }

        self.bot.send_message(ChatId(employee.telegram_id), text).await?;
        Ok(())
    }

    /// Reminds every employee with an open response to the survey. Returns
    /// the number of reminders delivered; individual failures are logged and
    /// skipped.
    pub async fn send_reminders_for_survey(&self, survey_id: i64) -> AppResult<usize> {
        let open = {
            let conn = get_connection(&self.db_pool)?;
            surveys::list_responses(&conn, Some(survey_id), None, 0, i64::MAX)?
        };

        let mut delivered = 0;
        for response in open.into_iter().filter(|r| !r.status.is_terminal()) {
            match self.send_reminder(response.employee_id, survey_id, None).await {
                Ok(()) => delivered += 1,
                Err(err) => {
                    log::warn!(
                        "reminder for employee {} survey {} failed: {}",
                        response.employee_id,
                        survey_id,
                        err
                    );
                }
            }
        }
        Ok(delivered)
    }
}

#[async_trait]
impl Notifier for NotificationService {
    async fn survey_completed(&self, hr_telegram_id: i64, employee_name: &str, survey_title: &str) {
        let lang = i18n::employee_lang(&self.db_pool, hr_telegram_id);
        let mut args = FluentArgs::new();
        args.set("employee", employee_name.to_string());
        args.set("title", survey_title.to_string());

        if let Err(err) = self
            .bot
            .send_message(ChatId(hr_telegram_id), i18n::t_args(&lang, "notify-completion", &args))
            .await
        {
            log::error!("completion notice to HR {} failed: {}", hr_telegram_id, err);
        }
    }
}
