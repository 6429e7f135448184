//! Outcome state tracker: daily check/complete transitions and the counts behind the
//! progress and smiley cards.
//!
//! Reads never fail outward. A store error is logged and replaced by the "no progress"
//! default (zero counts, empty lists) so the chat response is never blocked by the data
//! layer. Writes that the user asked for explicitly (`record_checked`) still report
//! store errors so the caller can apologise.

use crate::model::{
    CoinSummary, DailyTally, LogEntry, NewOutcome, Outcome, OutcomeStatus, OutcomeType,
};
use crate::store::{OutcomeStore, StoreError};
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Longest free-text outcome accepted from the chat client.
pub const MAX_CUSTOM_TEXT_LEN: usize = 200;

const MAX_SLUG_LEN: usize = 40;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{[^}]*\}").expect("placeholder pattern compiles"));

static NON_ALNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("slug pattern compiles"));

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("invalid custom outcome: {reason}")]
    InvalidCustomText { reason: &'static str },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the user picked on the morning card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeSelection {
    Existing(i64),
    Custom { text: String, outcome_type: OutcomeType },
}

/// Reject blank text, unresolved `${...}` template placeholders and oversized input.
pub fn validate_custom_text(text: &str) -> Result<&str, TrackerError> {
    let t = text.trim();
    if t.is_empty() {
        return Err(TrackerError::InvalidCustomText {
            reason: "text is empty",
        });
    }
    if PLACEHOLDER.is_match(t) {
        return Err(TrackerError::InvalidCustomText {
            reason: "text is an unfilled template placeholder",
        });
    }
    if t.chars().count() > MAX_CUSTOM_TEXT_LEN {
        return Err(TrackerError::InvalidCustomText {
            reason: "text is too long",
        });
    }
    Ok(t)
}

/// Code for a user's free-text outcome: `CUSTOM_<user>_<SLUG>`.
///
/// Text without any ASCII letter or digit falls back to a stable hash so distinct emoji
/// goals still get distinct codes. A slug longer than the limit is cut and suffixed with
/// a hash of the full text, so goals sharing a long prefix stay apart.
pub fn custom_outcome_code(user_id: i64, text: &str) -> String {
    let text = text.trim();
    let full = slug(text);
    if full.is_empty() {
        format!("CUSTOM_{}_{:016x}", user_id, fnv1a(text))
    } else if full.chars().count() > MAX_SLUG_LEN {
        disambiguated_code(user_id, text)
    } else {
        format!("CUSTOM_{}_{}", user_id, full)
    }
}

/// Bounded slug plus a hash of the exact text. Used for long text and whenever the
/// plain code is already taken by a different text ("Ship it!" vs "ship it").
pub(crate) fn disambiguated_code(user_id: i64, text: &str) -> String {
    let text = text.trim();
    let head: String = slug(text).chars().take(MAX_SLUG_LEN).collect();
    let head = head.trim_end_matches('_');
    if head.is_empty() {
        format!("CUSTOM_{}_{:016x}", user_id, fnv1a(text))
    } else {
        format!("CUSTOM_{}_{}_{:016x}", user_id, head, fnv1a(text))
    }
}

fn slug(text: &str) -> String {
    NON_ALNUM
        .replace_all(text, "_")
        .trim_matches('_')
        .to_uppercase()
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[derive(Clone)]
pub struct OutcomeTracker {
    store: Arc<dyn OutcomeStore>,
}

impl OutcomeTracker {
    pub fn new(store: Arc<dyn OutcomeStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn OutcomeStore> {
        &self.store
    }

    pub fn record_checked(
        &self,
        user_id: i64,
        selection: &OutcomeSelection,
    ) -> Result<Option<Outcome>, TrackerError> {
        self.record_checked_at(user_id, selection, Utc::now())
    }

    /// Mark an outcome as today's goal. A custom selection creates (or reuses) the
    /// user's outcome row first. Returns `None` when an existing id is unknown.
    pub fn record_checked_at(
        &self,
        user_id: i64,
        selection: &OutcomeSelection,
        now: DateTime<Utc>,
    ) -> Result<Option<Outcome>, TrackerError> {
        let outcome = match selection {
            OutcomeSelection::Existing(id) => match self.store.find_outcome(*id)? {
                Some(o) if o.visible_to(user_id) => o,
                Some(_) => {
                    tracing::warn!(user_id, outcome_id = id, "ignoring another user's custom outcome");
                    return Ok(None);
                }
                None => {
                    tracing::warn!(user_id, outcome_id = id, "ignoring unknown outcome id");
                    return Ok(None);
                }
            },
            OutcomeSelection::Custom { text, outcome_type } => {
                let text = validate_custom_text(text)?;
                let mut new = NewOutcome {
                    code: custom_outcome_code(user_id, text),
                    text: text.to_string(),
                    outcome_type: *outcome_type,
                    custom: true,
                    created_by: Some(user_id),
                };
                let mut outcome = self.store.insert_outcome(&new)?;
                if outcome.text != text {
                    tracing::debug!(user_id, code = %new.code, "code taken by different text");
                    new.code = disambiguated_code(user_id, text);
                    outcome = self.store.insert_outcome(&new)?;
                }
                tracing::info!(user_id, outcome_id = outcome.id, code = %outcome.code, "custom outcome ready");
                outcome
            }
        };
        self.store.upsert_checked(user_id, outcome.id, now)?;
        tracing::debug!(user_id, outcome_id = outcome.id, "outcome checked");
        Ok(Some(outcome))
    }

    pub fn record_completed(&self, user_id: i64, outcome_id: i64) -> bool {
        self.record_completed_at(user_id, outcome_id, Utc::now())
    }

    /// Complete today's entry and award its coins in one store call. `false` means nothing
    /// to do: the entry is missing, belongs to another day, is already completed, the
    /// outcome is someone else's private one, or the store failed.
    pub fn record_completed_at(&self, user_id: i64, outcome_id: i64, now: DateTime<Utc>) -> bool {
        let outcome = match self.store.find_outcome(outcome_id) {
            Ok(Some(o)) if o.visible_to(user_id) => o,
            Ok(_) => return false,
            Err(e) => {
                tracing::error!(user_id, outcome_id, error = %e, "outcome lookup failed");
                return false;
            }
        };
        let day = now.date_naive();
        match self
            .store
            .complete_and_award(user_id, outcome_id, day, now, outcome.coins)
        {
            Ok(true) => {
                tracing::info!(user_id, outcome_id, coins = outcome.coins, "outcome completed");
                true
            }
            Ok(false) => {
                tracing::debug!(user_id, outcome_id, "nothing to complete");
                false
            }
            Err(e) => {
                tracing::error!(user_id, outcome_id, error = %e, "completing outcome failed");
                false
            }
        }
    }

    /// Drop a not-yet-completed goal from today's selection.
    pub fn remove_checked_at(&self, user_id: i64, outcome_id: i64, now: DateTime<Utc>) -> bool {
        self.store
            .remove_entry(user_id, outcome_id, now.date_naive())
            .unwrap_or_else(|e| {
                tracing::error!(user_id, outcome_id, error = %e, "removing outcome failed");
                false
            })
    }

    /// Make `keep` the whole of today's pending selection: checked entries outside it are
    /// dropped. Completed entries always stay. Returns how many entries were removed.
    pub fn retain_selected_at(&self, user_id: i64, keep: &HashSet<i64>, now: DateTime<Utc>) -> u32 {
        let day = now.date_naive();
        let mut removed = 0;
        for (entry, _) in self.selected_on(user_id, day) {
            if entry.status == OutcomeStatus::Checked
                && !keep.contains(&entry.outcome_id)
                && self.remove_checked_at(user_id, entry.outcome_id, now)
            {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(user_id, removed, "unticked outcomes dropped");
        }
        removed
    }

    pub fn count_for_day(&self, user_id: i64, status: OutcomeStatus, day: NaiveDate) -> u32 {
        self.store
            .count_for_day(user_id, status, day)
            .unwrap_or_else(|e| {
                tracing::error!(user_id, status = %status, error = %e, "count query failed");
                0
            })
    }

    /// Outcomes selected on `day` (completed ones included) against completed ones.
    pub fn daily_tally(&self, user_id: i64, day: NaiveDate) -> DailyTally {
        let still_checked = self.count_for_day(user_id, OutcomeStatus::Checked, day);
        let completed = self.count_for_day(user_id, OutcomeStatus::Completed, day);
        DailyTally::new(still_checked + completed, completed)
    }

    pub fn outcomes_for(&self, user_id: i64) -> Vec<Outcome> {
        self.store.list_outcomes(user_id).unwrap_or_else(|e| {
            tracing::error!(user_id, error = %e, "listing outcomes failed");
            Vec::new()
        })
    }

    pub fn selected_today(&self, user_id: i64) -> Vec<(LogEntry, Outcome)> {
        self.selected_on(user_id, Utc::now().date_naive())
    }

    pub fn selected_on(&self, user_id: i64, day: NaiveDate) -> Vec<(LogEntry, Outcome)> {
        self.store.entries_for_day(user_id, day).unwrap_or_else(|e| {
            tracing::error!(user_id, error = %e, "listing selected outcomes failed");
            Vec::new()
        })
    }

    pub fn coin_summary(&self, user_id: i64, day: NaiveDate) -> CoinSummary {
        self.store.coin_summary(user_id, day).unwrap_or_else(|e| {
            tracing::error!(user_id, error = %e, "coin summary failed");
            CoinSummary::default()
        })
    }
}
