//! Persistence seam for users, outcomes, log entries and coin balances.
//!
//! One handle is opened at process start ([`crate::BotConfig::open_store`]) and shared as
//! `Arc<dyn OutcomeStore>`. Two backends exist and a deployment uses exactly one:
//!
//! - [`SqliteStore`]: relational schema (`users`, `badges`, `badgelog`, `user_coins`,
//!   `coin_ledger`) with upsert-on-conflict writes.
//! - [`JsonFileStore`]: one JSON document on local disk, rewritten after every mutation.

mod json_file;
mod sqlite;

pub use json_file::JsonFileStore;
pub use sqlite::SqliteStore;

use crate::model::{CoinSummary, LogEntry, NewOutcome, Outcome, OutcomeStatus, OutcomeType, User};
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("unknown {kind} {id}")]
    NotFound { kind: &'static str, id: i64 },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Catalog written on first open when no shared outcome exists yet.
pub const DEFAULT_CATALOG: &[(&str, &str, OutcomeType)] = &[
    ("LRN_ALGEBRA_BASICS", "Algebra basics", OutcomeType::Learning),
    ("LRN_INEQUALITIES", "Inequalities", OutcomeType::Learning),
    ("LRN_SOLVING_EQUATIONS", "Solving equations", OutcomeType::Learning),
    ("ERN_DASHBOARD_SPECS", "Create user specs for Dashboard screen", OutcomeType::Earning),
    ("ERN_CHAT_VIEW", "Design chat view for Star App", OutcomeType::Earning),
    ("CTB_DESIGN_QUIZZES", "Create quizzes for Basics of Design lesson", OutcomeType::Contribution),
];

/// Storage operations used by the tracker, the dispatcher and the notification loop.
///
/// Day-scoped operations compare against the UTC calendar day of `checked_at`.
pub trait OutcomeStore: Send + Sync {
    /// Case-insensitive lookup on the trimmed email.
    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    fn list_users(&self) -> StoreResult<Vec<User>>;

    /// Insert a user or refresh the display name of an existing one.
    fn upsert_user(&self, email: &str, display_name: &str) -> StoreResult<User>;

    /// Shared catalog plus the user's own custom outcomes, Learning → Earning → Contribution.
    fn list_outcomes(&self, user_id: i64) -> StoreResult<Vec<Outcome>>;

    fn find_outcome(&self, outcome_id: i64) -> StoreResult<Option<Outcome>>;

    /// Insert unless `code` already exists; either way the stored row is returned.
    fn insert_outcome(&self, new: &NewOutcome) -> StoreResult<Outcome>;

    /// Create or re-arm the `(user, outcome)` entry as `Checked`. An entry already
    /// completed on the same day is left untouched.
    fn upsert_checked(&self, user_id: i64, outcome_id: i64, at: DateTime<Utc>) -> StoreResult<()>;

    /// `Checked → Completed` for an entry checked on `day`. Returns whether a row changed.
    fn mark_completed(
        &self,
        user_id: i64,
        outcome_id: i64,
        day: NaiveDate,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Delete a not-yet-completed entry checked on `day`.
    fn remove_entry(&self, user_id: i64, outcome_id: i64, day: NaiveDate) -> StoreResult<bool>;

    fn find_entry(&self, user_id: i64, outcome_id: i64) -> StoreResult<Option<LogEntry>>;

    fn count_for_day(&self, user_id: i64, status: OutcomeStatus, day: NaiveDate) -> StoreResult<u32>;

    /// Entries checked on `day` with their outcome, ordered like [`Self::list_outcomes`].
    fn entries_for_day(&self, user_id: i64, day: NaiveDate) -> StoreResult<Vec<(LogEntry, Outcome)>>;

    /// Credit `amount` coins for a completed outcome.
    fn award_coins(&self, user_id: i64, outcome_id: i64, amount: u32, at: DateTime<Utc>) -> StoreResult<()>;

    /// [`Self::mark_completed`] and [`Self::award_coins`] as one unit: either the entry
    /// turns `Completed` and the coins are credited, or nothing changes. Returns `false`
    /// (and credits nothing) when no checked entry for `day` exists.
    fn complete_and_award(
        &self,
        user_id: i64,
        outcome_id: i64,
        day: NaiveDate,
        at: DateTime<Utc>,
        amount: u32,
    ) -> StoreResult<bool>;

    fn coin_summary(&self, user_id: i64, day: NaiveDate) -> StoreResult<CoinSummary>;
}

pub(crate) fn type_rank(ty: OutcomeType) -> u8 {
    match ty {
        OutcomeType::Learning => 0,
        OutcomeType::Earning => 1,
        OutcomeType::Contribution => 2,
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
