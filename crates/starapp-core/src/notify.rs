//! Proactive notifications: the morning selection card and the evening confirmation
//! card, pushed to the chat platform's incoming webhook by the daemon.

use crate::cards::{completion_card, outcome_selection_card, CardStyle, ChatResponse};
use crate::model::User;
use crate::store::StoreError;
use crate::tracker::OutcomeTracker;
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub enabled: bool,
    /// Incoming webhook of the space the cards are posted to.
    pub webhook_url: Option<String>,
    pub tick_secs: u64,
    /// Hour of day (UTC, 0–23) from which the morning card is sent.
    pub morning_hour: u8,
    /// Hour of day (UTC, 0–23) from which the evening card is sent.
    pub evening_hour: u8,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: None,
            tick_secs: 60,
            morning_hour: 9,
            evening_hour: 17,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifySlot {
    Morning,
    Evening,
}

impl NotifySlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Evening => "evening",
        }
    }
}

/// Last day each slot was dispatched.
#[derive(Debug, Clone, Default)]
pub struct SentLog {
    morning: Option<NaiveDate>,
    evening: Option<NaiveDate>,
}

impl SentLog {
    pub fn sent(&self, slot: NotifySlot, day: NaiveDate) -> bool {
        let last = match slot {
            NotifySlot::Morning => self.morning,
            NotifySlot::Evening => self.evening,
        };
        last == Some(day)
    }

    pub fn mark(&mut self, slot: NotifySlot, day: NaiveDate) {
        match slot {
            NotifySlot::Morning => self.morning = Some(day),
            NotifySlot::Evening => self.evening = Some(day),
        }
    }
}

/// Slot to dispatch at `now`, if any. A morning slot missed until the evening hour is
/// skipped for the day.
pub fn due_slot(now: DateTime<Utc>, cfg: &NotifyConfig, sent: &SentLog) -> Option<NotifySlot> {
    let day = now.date_naive();
    let hour = now.hour() as u8;
    let evening = cfg.evening_hour.min(23);
    let morning = cfg.morning_hour.min(evening);
    if hour >= evening {
        return (!sent.sent(NotifySlot::Evening, day)).then_some(NotifySlot::Evening);
    }
    if hour >= morning && !sent.sent(NotifySlot::Morning, day) {
        return Some(NotifySlot::Morning);
    }
    None
}

/// Card for one user, or `None` when there is nothing to send (no goals to confirm in
/// the evening).
pub fn build_notification(
    slot: NotifySlot,
    tracker: &OutcomeTracker,
    style: &CardStyle,
    user: &User,
    now: DateTime<Utc>,
) -> Option<ChatResponse> {
    let today = now.date_naive();
    let selected = tracker.selected_on(user.id, today);
    match slot {
        NotifySlot::Morning => {
            let outcomes = tracker.outcomes_for(user.id);
            if outcomes.is_empty() {
                return None;
            }
            let ids: HashSet<i64> = selected.iter().map(|(e, _)| e.outcome_id).collect();
            Some(outcome_selection_card(style, &outcomes, &ids))
        }
        NotifySlot::Evening => {
            if selected.is_empty() {
                return None;
            }
            Some(completion_card(style, &selected))
        }
    }
}

/// Webhook body: the card plus a greeting line addressed to the user.
pub fn notification_payload(slot: NotifySlot, user: &User, response: &ChatResponse) -> Value {
    let mut body = serde_json::to_value(response).unwrap_or_else(|_| Value::Object(Default::default()));
    if let Value::Object(map) = &mut body {
        if !map.contains_key("text") {
            let line = match slot {
                NotifySlot::Morning => format!("☀️ Good morning, {}! Set your outcomes for today.", user.first_name()),
                NotifySlot::Evening => format!("🌙 {}, how did today go?", user.first_name()),
            };
            map.insert("text".to_string(), Value::String(line));
        }
    }
    body
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification webhook is not configured")]
    NotConfigured,
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("reading recipients failed: {0}")]
    Store(#[from] StoreError),
    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Where notification bodies are delivered.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn push(&self, body: &Value) -> Result<(), NotifyError>;
}

#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl Notifier {
    pub fn from_config(cfg: &NotifyConfig) -> Result<Self, NotifyError> {
        let url = cfg
            .webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(NotifyError::NotConfigured)?;
        Ok(Self {
            client: reqwest::Client::new(),
            webhook_url: url.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl NotificationSink for Notifier {
    async fn push(&self, body: &Value) -> Result<(), NotifyError> {
        let res = self.client.post(&self.webhook_url).json(body).send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Outcome of one slot's round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub users: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Push one slot's card to every user in turn. Store reads run on the blocking pool.
///
/// `Err` means the recipients could not be read and the round should be retried. A push
/// that fails for one user is logged and counted; the others still get theirs.
pub async fn run_round(
    slot: NotifySlot,
    tracker: &OutcomeTracker,
    style: &CardStyle,
    sink: &dyn NotificationSink,
    now: DateTime<Utc>,
) -> Result<RoundReport, NotifyError> {
    let tracker = tracker.clone();
    let style = style.clone();
    let (users, bodies) = tokio::task::spawn_blocking(move || -> Result<_, StoreError> {
        let users = tracker.store().list_users()?;
        let bodies: Vec<(User, Value)> = users
            .iter()
            .filter_map(|user| {
                let card = build_notification(slot, &tracker, &style, user, now)?;
                Some((user.clone(), notification_payload(slot, user, &card)))
            })
            .collect();
        Ok((users.len(), bodies))
    })
    .await??;

    let mut report = RoundReport {
        users,
        ..RoundReport::default()
    };
    for (user, body) in &bodies {
        match sink.push(body).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(user_id = user.id, email = %user.email, error = %e, "push failed");
            }
        }
    }
    Ok(report)
}
