//! Webhook dispatcher: routes a decoded [`ChatEvent`] to the tracker and card builders.
//!
//! Every event ends in exactly one [`Reply`]; nothing is retried.

use crate::cards::{
    completion_card, daily_progress_card, help_text, outcome_selection_card, progress_text,
    smiley_meter_card, welcome_text, CardStyle, ChatResponse, ACTION_ADD_EARNING,
    ACTION_SUBMIT_COMPLETED, ACTION_SUBMIT_OUTCOMES, FIELD_COMPLETED, FIELD_CUSTOM_OUTCOME,
    FIELD_OUTCOMES_PREFIX,
};
use crate::event::{decode_outcome_ids, decode_selections, ChatEvent, EventType};
use crate::model::{OutcomeType, User};
use crate::tracker::{OutcomeSelection, OutcomeTracker, TrackerError};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashSet;

pub const SERVER_ERROR_TEXT: &str = "⚠️ Sorry, something went wrong while processing your request.";

/// Text command typed in a direct message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Hi,
    Progress,
    Outcomes,
    Selected,
    Smiley,
    Unknown,
}

impl BotCommand {
    pub fn parse(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "hi" | "hello" => Self::Hi,
            "progress" | "prog" => Self::Progress,
            "outcomes" => Self::Outcomes,
            "selected" => Self::Selected,
            "smiley" => Self::Smiley,
            _ => Self::Unknown,
        }
    }
}

/// Button function invoked on one of the bot's cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardAction {
    AddEarningOutcome,
    SubmitOutcomes,
    SubmitCompletedOutcomes,
    Unknown,
}

impl CardAction {
    pub fn from_method(name: &str) -> Self {
        match name {
            ACTION_ADD_EARNING => Self::AddEarningOutcome,
            ACTION_SUBMIT_OUTCOMES => Self::SubmitOutcomes,
            ACTION_SUBMIT_COMPLETED => Self::SubmitCompletedOutcomes,
            _ => Self::Unknown,
        }
    }

    pub fn from_event(event: &ChatEvent) -> Self {
        event.method_name().map(Self::from_method).unwrap_or(Self::Unknown)
    }
}

/// Outcome of one dispatched event.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// 200 with a chat payload (this includes the "unknown user" apology).
    Chat(ChatResponse),
    /// 400 `{ "message": ... }` for a request missing required fields.
    BadRequest(String),
    /// 500 with the generic apology text.
    Failed(ChatResponse),
}

impl Reply {
    pub fn failed() -> Self {
        Self::Failed(ChatResponse::text(SERVER_ERROR_TEXT))
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::Chat(_) => 200,
            Self::BadRequest(_) => 400,
            Self::Failed(_) => 500,
        }
    }

    pub fn body(&self) -> Value {
        match self {
            Self::Chat(r) | Self::Failed(r) => serde_json::to_value(r).unwrap_or_else(|_| json!({})),
            Self::BadRequest(message) => json!({ "message": message }),
        }
    }
}

pub fn unknown_user_text(email: &str) -> String {
    format!("⚠️ Error: No user found for email {email}")
}

#[derive(Clone)]
pub struct Dispatcher {
    tracker: OutcomeTracker,
    style: CardStyle,
}

impl Dispatcher {
    pub fn new(tracker: OutcomeTracker, style: CardStyle) -> Self {
        Self { tracker, style }
    }

    pub fn tracker(&self) -> &OutcomeTracker {
        &self.tracker
    }

    pub fn style(&self) -> &CardStyle {
        &self.style
    }

    pub fn handle(&self, event: &ChatEvent) -> Reply {
        self.handle_at(event, Utc::now())
    }

    pub fn handle_at(&self, event: &ChatEvent, now: DateTime<Utc>) -> Reply {
        match event.event_type {
            EventType::Message => self.on_message(event, now),
            EventType::CardClicked => self.on_card_click(event, now),
            EventType::AddedToSpace => Reply::Chat(welcome_text(event.sender_name())),
            EventType::RemovedFromSpace => {
                tracing::info!(email = ?event.sender_email(), "bot removed from space");
                Reply::Chat(ChatResponse::empty())
            }
            EventType::Other => Reply::Chat(help_text()),
        }
    }

    /// Resolve an email to a user, or the reply to send instead.
    pub fn resolve_user(&self, email: &str) -> Result<User, Reply> {
        match self.tracker.store().find_user_by_email(email) {
            Ok(Some(user)) => Ok(user),
            Ok(None) => {
                tracing::warn!(email, "no user for email");
                Err(Reply::Chat(ChatResponse::text(unknown_user_text(email))))
            }
            Err(e) => {
                tracing::error!(email, error = %e, "user lookup failed");
                Err(Reply::failed())
            }
        }
    }

    fn on_message(&self, event: &ChatEvent, now: DateTime<Utc>) -> Reply {
        let Some(text) = event.message_text() else {
            return Reply::BadRequest("No message found in request.".into());
        };
        let Some(email) = event.sender_email() else {
            return Reply::BadRequest("No sender email found in request.".into());
        };
        let user = match self.resolve_user(email) {
            Ok(u) => u,
            Err(reply) => return reply,
        };
        let command = BotCommand::parse(text);
        tracing::debug!(user_id = user.id, ?command, "message command");
        Reply::Chat(self.run_command(command, &user, now))
    }

    fn run_command(&self, command: BotCommand, user: &User, now: DateTime<Utc>) -> ChatResponse {
        let today = now.date_naive();
        match command {
            BotCommand::Hi => {
                let summary = self.tracker.coin_summary(user.id, today);
                daily_progress_card(&self.style, user, &summary, now)
            }
            BotCommand::Progress => {
                let tally = self.tracker.daily_tally(user.id, today);
                let summary = self.tracker.coin_summary(user.id, today);
                progress_text(&tally, &summary)
            }
            BotCommand::Outcomes => self.selection_card(user, now),
            BotCommand::Selected => {
                completion_card(&self.style, &self.tracker.selected_on(user.id, today))
            }
            BotCommand::Smiley => {
                smiley_meter_card(&self.style, &self.tracker.daily_tally(user.id, today), None)
            }
            BotCommand::Unknown => help_text(),
        }
    }

    fn selection_card(&self, user: &User, now: DateTime<Utc>) -> ChatResponse {
        let outcomes = self.tracker.outcomes_for(user.id);
        let selected: HashSet<i64> = self
            .tracker
            .selected_on(user.id, now.date_naive())
            .iter()
            .map(|(e, _)| e.outcome_id)
            .collect();
        outcome_selection_card(&self.style, &outcomes, &selected)
    }

    fn on_card_click(&self, event: &ChatEvent, now: DateTime<Utc>) -> Reply {
        let Some(email) = event.sender_email() else {
            return Reply::BadRequest("No user email found in request.".into());
        };
        let user = match self.resolve_user(email) {
            Ok(u) => u,
            Err(reply) => return reply,
        };
        let action = CardAction::from_event(event);
        tracing::debug!(user_id = user.id, ?action, "card action");
        match action {
            CardAction::AddEarningOutcome => self.add_earning(event, &user, now),
            CardAction::SubmitOutcomes => Reply::Chat(self.submit_outcomes(event, &user, now)),
            CardAction::SubmitCompletedOutcomes => {
                let ids = decode_outcome_ids(event.form_values(FIELD_COMPLETED));
                let done = ids
                    .into_iter()
                    .filter(|id| self.tracker.record_completed_at(user.id, *id, now))
                    .count() as u32;
                let tally = self.tracker.daily_tally(user.id, now.date_naive());
                Reply::Chat(smiley_meter_card(&self.style, &tally, Some(done)))
            }
            CardAction::Unknown => Reply::Chat(help_text()),
        }
    }

    fn custom_text<'a>(event: &'a ChatEvent) -> Option<&'a str> {
        event
            .form_values(FIELD_CUSTOM_OUTCOME)
            .into_iter()
            .chain(event.parameter("text"))
            .map(str::trim)
            .find(|t| !t.is_empty())
    }

    fn add_earning(&self, event: &ChatEvent, user: &User, now: DateTime<Utc>) -> Reply {
        let Some(text) = Self::custom_text(event) else {
            return Reply::Chat(ChatResponse::text(
                "✏️ Type an outcome in the box before pressing **Add**.",
            ));
        };
        let selection = OutcomeSelection::Custom {
            text: text.to_string(),
            outcome_type: OutcomeType::Earning,
        };
        match self.tracker.record_checked_at(user.id, &selection, now) {
            Ok(_) => Reply::Chat(self.selection_card(user, now)),
            Err(TrackerError::InvalidCustomText { reason }) => Reply::Chat(ChatResponse::text(
                format!("⚠️ That outcome can't be added: {reason}."),
            )),
            Err(TrackerError::Store(e)) => {
                tracing::error!(user_id = user.id, error = %e, "adding custom outcome failed");
                Reply::failed()
            }
        }
    }

    fn submit_outcomes(&self, event: &ChatEvent, user: &User, now: DateTime<Utc>) -> ChatResponse {
        let mut selections = decode_selections(
            event.form_values_with_prefix(FIELD_OUTCOMES_PREFIX),
            OutcomeType::Earning,
        );
        if let Some(text) = Self::custom_text(event) {
            selections.push(OutcomeSelection::Custom {
                text: text.to_string(),
                outcome_type: OutcomeType::Earning,
            });
        }

        // The submitted form is the whole selection: anything left unticked is dropped.
        let mut kept = HashSet::new();
        let mut failed = false;
        for selection in &selections {
            match self.tracker.record_checked_at(user.id, selection, now) {
                Ok(Some(outcome)) => {
                    kept.insert(outcome.id);
                }
                Ok(None) => {}
                Err(e) => {
                    failed = true;
                    tracing::warn!(user_id = user.id, error = %e, "skipping selection");
                }
            }
        }
        // A selection that failed to save must not cost the user their earlier picks.
        let removed = if failed {
            0
        } else {
            self.tracker.retain_selected_at(user.id, &kept, now)
        };

        match (kept.len(), removed) {
            (0, 0) => ChatResponse::text("No outcomes were selected. Type **outcomes** to try again."),
            (0, removed) => ChatResponse::text(format!(
                "🗑️ Cleared {removed} outcome(s) from today. Type **outcomes** to pick again."
            )),
            (recorded, _) => ChatResponse::text(format!(
                "✅ {recorded} outcome(s) set for today. Type **selected** this evening to confirm what you finished."
            )),
        }
    }
}
