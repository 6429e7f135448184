//! Shared types: users, outcomes (badges), log entries and the daily tally.
//!
//! Status and type enums round-trip through the text columns of the SQL schema and the
//! JSON document, so `as_str` / `parse` must stay in sync with the serde names.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Every outcome is worth the same reward.
pub const OUTCOME_COINS: u32 = 10;

/// A chat user resolved from the identity table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub display_name: String,
}

impl User {
    /// First word of the display name, or "there" when the name is blank.
    pub fn first_name(&self) -> &str {
        self.display_name
            .split_whitespace()
            .next()
            .unwrap_or("there")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OutcomeType {
    Learning,
    Earning,
    Contribution,
}

impl OutcomeType {
    pub const ALL: [OutcomeType; 3] = [Self::Learning, Self::Earning, Self::Contribution];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Learning => "Learning",
            Self::Earning => "Earning",
            Self::Contribution => "Contribution",
        }
    }

    /// Case-insensitive parse; unknown labels are `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let t = s.trim();
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str().eq_ignore_ascii_case(t))
    }
}

impl std::fmt::Display for OutcomeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeStatus {
    Assigned,
    Checked,
    Completed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "Assigned",
            Self::Checked => "Checked",
            Self::Completed => "Completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Assigned" => Some(Self::Assigned),
            "Checked" => Some(Self::Checked),
            "Completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outcome (badge) a user can pick as a daily goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub id: i64,
    pub code: String,
    pub text: String,
    pub outcome_type: OutcomeType,
    pub coins: u32,
    /// True for outcomes created from a user's free text.
    pub custom: bool,
    /// Owner of a custom outcome; `None` for the shared catalog.
    pub created_by: Option<i64>,
}

impl Outcome {
    /// Shared catalog entries are visible to everyone; custom ones only to their owner.
    pub fn visible_to(&self, user_id: i64) -> bool {
        !self.custom || self.created_by == Some(user_id)
    }
}

/// Insert payload for [`crate::store::OutcomeStore::insert_outcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOutcome {
    pub code: String,
    pub text: String,
    pub outcome_type: OutcomeType,
    pub custom: bool,
    pub created_by: Option<i64>,
}

/// Association of a user with an outcome. Unique per `(user_id, outcome_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub user_id: i64,
    pub outcome_id: i64,
    pub status: OutcomeStatus,
    pub checked_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl LogEntry {
    /// Calendar day (UTC) the entry was last checked on.
    pub fn checked_day(&self) -> NaiveDate {
        self.checked_at.date_naive()
    }
}

/// Coin and badge totals shown on the daily progress card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoinSummary {
    pub total_coins: u32,
    /// Completed outcomes, all time.
    pub total_badges: u32,
    pub coins_today: u32,
    pub coins_yesterday: u32,
}

impl CoinSummary {
    /// Coins earned today beyond yesterday's amount (never negative).
    pub fn gain_over_yesterday(&self) -> u32 {
        self.coins_today.saturating_sub(self.coins_yesterday)
    }
}

/// Qualitative bucket for the smiley meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodTier {
    Sad,
    Neutral,
    Happy,
}

impl MoodTier {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio <= 33.0 {
            Self::Sad
        } else if ratio <= 66.0 {
            Self::Neutral
        } else {
            Self::Happy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sad => "sad",
            Self::Neutral => "neutral",
            Self::Happy => "happy",
        }
    }
}

/// `min(completed / checked, 1) * 100`, or `0` when nothing was checked.
pub fn completion_ratio(checked: u32, completed: u32) -> f64 {
    if checked == 0 {
        return 0.0;
    }
    (f64::from(completed) / f64::from(checked)).min(1.0) * 100.0
}

/// Per-user counts for one calendar day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DailyTally {
    /// Outcomes selected that day, completed ones included.
    pub checked: u32,
    pub completed: u32,
}

impl DailyTally {
    pub fn new(checked: u32, completed: u32) -> Self {
        // A store that reports more completions than selections is clamped, not trusted.
        Self {
            checked: checked.max(completed),
            completed,
        }
    }

    pub fn completion_ratio(&self) -> f64 {
        completion_ratio(self.checked, self.completed)
    }

    pub fn mood_tier(&self) -> MoodTier {
        MoodTier::from_ratio(self.completion_ratio())
    }

    pub fn pending(&self) -> u32 {
        self.checked.saturating_sub(self.completed)
    }
}
