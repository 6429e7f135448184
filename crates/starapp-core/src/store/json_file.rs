//! Flat-file backend: the whole dataset lives in one JSON document that is loaded on open
//! and rewritten (temp file + rename) after each mutation. Meant for single-instance
//! deployments without a database; semantics match [`super::SqliteStore`].

use super::{normalize_email, type_rank, OutcomeStore, StoreError, StoreResult, DEFAULT_CATALOG};
use crate::model::{
    CoinSummary, LogEntry, NewOutcome, Outcome, OutcomeStatus, User, OUTCOME_COINS,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CoinAward {
    user_id: i64,
    outcome_id: i64,
    coins: u32,
    earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    outcomes: Vec<Outcome>,
    #[serde(default)]
    entries: Vec<LogEntry>,
    #[serde(default)]
    balances: BTreeMap<i64, u32>,
    #[serde(default)]
    ledger: Vec<CoinAward>,
}

impl Document {
    fn next_user_id(&self) -> i64 {
        self.users.iter().map(|u| u.id).max().unwrap_or(0) + 1
    }

    fn next_outcome_id(&self) -> i64 {
        self.outcomes.iter().map(|o| o.id).max().unwrap_or(0) + 1
    }

    fn complete(&mut self, user_id: i64, outcome_id: i64, day: NaiveDate, at: DateTime<Utc>) -> bool {
        let entry = self.entries.iter_mut().find(|e| {
            e.user_id == user_id
                && e.outcome_id == outcome_id
                && e.checked_day() == day
                && e.status == OutcomeStatus::Checked
        });
        match entry {
            Some(entry) => {
                entry.status = OutcomeStatus::Completed;
                entry.completed_at = Some(at);
                true
            }
            None => false,
        }
    }

    fn credit(&mut self, user_id: i64, outcome_id: i64, amount: u32, at: DateTime<Utc>) -> StoreResult<()> {
        self.require_user(user_id)?;
        *self.balances.entry(user_id).or_insert(0) += amount;
        self.ledger.push(CoinAward {
            user_id,
            outcome_id,
            coins: amount,
            earned_at: at,
        });
        Ok(())
    }

    fn require_user(&self, user_id: i64) -> StoreResult<()> {
        if self.users.iter().any(|u| u.id == user_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound { kind: "user", id: user_id })
        }
    }

    fn require_outcome(&self, outcome_id: i64) -> StoreResult<()> {
        if self.outcomes.iter().any(|o| o.id == outcome_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                kind: "outcome",
                id: outcome_id,
            })
        }
    }

    fn seed_catalog(&mut self) -> bool {
        if self.outcomes.iter().any(|o| !o.custom) {
            return false;
        }
        for (code, text, ty) in DEFAULT_CATALOG {
            let id = self.next_outcome_id();
            self.outcomes.push(Outcome {
                id,
                code: code.to_string(),
                text: text.to_string(),
                outcome_type: *ty,
                coins: OUTCOME_COINS,
                custom: false,
                created_by: None,
            });
        }
        true
    }

    fn earned_on(&self, user_id: i64, day: Option<NaiveDate>) -> u32 {
        let Some(day) = day else { return 0 };
        self.ledger
            .iter()
            .filter(|a| a.user_id == user_id && a.earned_at.date_naive() == day)
            .map(|a| a.coins)
            .sum()
    }
}

pub struct JsonFileStore {
    path: PathBuf,
    doc: Mutex<Document>,
}

impl JsonFileStore {
    /// Load the document at `path`, creating an empty one (with the default catalog) when
    /// the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let mut doc: Document = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                Document::default()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            Document::default()
        };
        let seeded = doc.seed_catalog();
        let store = Self {
            path,
            doc: Mutex::new(doc),
        };
        if seeded {
            let doc = store.lock()?;
            store.persist(&doc)?;
            tracing::info!(count = DEFAULT_CATALOG.len(), path = %store.path.display(), "seeded default outcome catalog");
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Document>> {
        self.doc.lock().map_err(|_| StoreError::Poisoned)
    }

    fn persist(&self, doc: &Document) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let body = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Document) -> T) -> StoreResult<T> {
        let doc = self.lock()?;
        Ok(f(&doc))
    }

    /// Apply `f` to a copy of the document. The copy replaces the in-memory state only
    /// once it is on disk, so a failed write leaves memory and file in agreement.
    fn mutate<T>(&self, f: impl FnOnce(&mut Document) -> StoreResult<T>) -> StoreResult<T> {
        let mut doc = self.lock()?;
        let mut next = doc.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        *doc = next;
        Ok(out)
    }
}

impl OutcomeStore for JsonFileStore {
    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let needle = normalize_email(email);
        if needle.is_empty() {
            return Ok(None);
        }
        self.read(|doc| doc.users.iter().find(|u| u.email == needle).cloned())
    }

    fn list_users(&self) -> StoreResult<Vec<User>> {
        self.read(|doc| {
            let mut users = doc.users.clone();
            users.sort_by_key(|u| u.id);
            users
        })
    }

    fn upsert_user(&self, email: &str, display_name: &str) -> StoreResult<User> {
        let email = normalize_email(email);
        let name = display_name.trim().to_string();
        self.mutate(|doc| {
            if let Some(existing) = doc.users.iter_mut().find(|u| u.email == email) {
                if !name.is_empty() {
                    existing.display_name = name;
                }
                return Ok(existing.clone());
            }
            let user = User {
                id: doc.next_user_id(),
                email,
                display_name: name,
            };
            doc.users.push(user.clone());
            Ok(user)
        })
    }

    fn list_outcomes(&self, user_id: i64) -> StoreResult<Vec<Outcome>> {
        self.read(|doc| {
            let mut outcomes: Vec<Outcome> = doc
                .outcomes
                .iter()
                .filter(|o| o.visible_to(user_id))
                .cloned()
                .collect();
            outcomes.sort_by_key(|o| (type_rank(o.outcome_type), o.id));
            outcomes
        })
    }

    fn find_outcome(&self, outcome_id: i64) -> StoreResult<Option<Outcome>> {
        self.read(|doc| doc.outcomes.iter().find(|o| o.id == outcome_id).cloned())
    }

    fn insert_outcome(&self, new: &NewOutcome) -> StoreResult<Outcome> {
        self.mutate(|doc| {
            if let Some(existing) = doc.outcomes.iter().find(|o| o.code == new.code) {
                return Ok(existing.clone());
            }
            if let Some(owner) = new.created_by {
                doc.require_user(owner)?;
            }
            let outcome = Outcome {
                id: doc.next_outcome_id(),
                code: new.code.clone(),
                text: new.text.trim().to_string(),
                outcome_type: new.outcome_type,
                coins: OUTCOME_COINS,
                custom: new.custom,
                created_by: new.created_by,
            };
            doc.outcomes.push(outcome.clone());
            Ok(outcome)
        })
    }

    fn upsert_checked(&self, user_id: i64, outcome_id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        self.mutate(|doc| {
            doc.require_user(user_id)?;
            doc.require_outcome(outcome_id)?;
            let day = at.date_naive();
            match doc
                .entries
                .iter_mut()
                .find(|e| e.user_id == user_id && e.outcome_id == outcome_id)
            {
                Some(entry) => {
                    if entry.status == OutcomeStatus::Completed && entry.checked_day() == day {
                        return Ok(());
                    }
                    entry.status = OutcomeStatus::Checked;
                    entry.checked_at = at;
                    entry.completed_at = None;
                }
                None => doc.entries.push(LogEntry {
                    user_id,
                    outcome_id,
                    status: OutcomeStatus::Checked,
                    checked_at: at,
                    completed_at: None,
                }),
            }
            Ok(())
        })
    }

    fn mark_completed(
        &self,
        user_id: i64,
        outcome_id: i64,
        day: NaiveDate,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.mutate(|doc| Ok(doc.complete(user_id, outcome_id, day, at)))
    }

    fn remove_entry(&self, user_id: i64, outcome_id: i64, day: NaiveDate) -> StoreResult<bool> {
        self.mutate(|doc| {
            let before = doc.entries.len();
            doc.entries.retain(|e| {
                !(e.user_id == user_id
                    && e.outcome_id == outcome_id
                    && e.checked_day() == day
                    && e.status != OutcomeStatus::Completed)
            });
            Ok(doc.entries.len() != before)
        })
    }

    fn find_entry(&self, user_id: i64, outcome_id: i64) -> StoreResult<Option<LogEntry>> {
        self.read(|doc| {
            doc.entries
                .iter()
                .find(|e| e.user_id == user_id && e.outcome_id == outcome_id)
                .cloned()
        })
    }

    fn count_for_day(&self, user_id: i64, status: OutcomeStatus, day: NaiveDate) -> StoreResult<u32> {
        self.read(|doc| {
            doc.entries
                .iter()
                .filter(|e| e.user_id == user_id && e.status == status && e.checked_day() == day)
                .count() as u32
        })
    }

    fn entries_for_day(&self, user_id: i64, day: NaiveDate) -> StoreResult<Vec<(LogEntry, Outcome)>> {
        self.read(|doc| {
            let mut rows: Vec<(LogEntry, Outcome)> = doc
                .entries
                .iter()
                .filter(|e| e.user_id == user_id && e.checked_day() == day)
                .filter_map(|e| {
                    doc.outcomes
                        .iter()
                        .find(|o| o.id == e.outcome_id)
                        .map(|o| (e.clone(), o.clone()))
                })
                .collect();
            rows.sort_by_key(|(_, o)| (type_rank(o.outcome_type), o.id));
            rows
        })
    }

    fn award_coins(&self, user_id: i64, outcome_id: i64, amount: u32, at: DateTime<Utc>) -> StoreResult<()> {
        self.mutate(|doc| doc.credit(user_id, outcome_id, amount, at))
    }

    fn complete_and_award(
        &self,
        user_id: i64,
        outcome_id: i64,
        day: NaiveDate,
        at: DateTime<Utc>,
        amount: u32,
    ) -> StoreResult<bool> {
        self.mutate(|doc| {
            if !doc.complete(user_id, outcome_id, day, at) {
                return Ok(false);
            }
            doc.credit(user_id, outcome_id, amount, at)?;
            Ok(true)
        })
    }

    fn coin_summary(&self, user_id: i64, day: NaiveDate) -> StoreResult<CoinSummary> {
        self.read(|doc| CoinSummary {
            total_coins: doc.balances.get(&user_id).copied().unwrap_or(0),
            total_badges: doc.ledger.iter().filter(|a| a.user_id == user_id).count() as u32,
            coins_today: doc.earned_on(user_id, Some(day)),
            coins_yesterday: doc.earned_on(user_id, day.pred_opt()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn open_creates_file_with_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data").join("progress.json");
        let store = JsonFileStore::open(&path).expect("open");
        assert!(path.exists());
        assert_eq!(store.list_outcomes(1).expect("list").len(), DEFAULT_CATALOG.len());
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("progress.json");
        let (user_id, outcome_id) = {
            let store = JsonFileStore::open(&path).expect("open");
            let user = store.upsert_user("a@example.com", "Ada").expect("user");
            let outcome = store.list_outcomes(user.id).expect("list")[0].clone();
            store.upsert_checked(user.id, outcome.id, at(3, 9)).expect("check");
            (user.id, outcome.id)
        };

        let store = JsonFileStore::open(&path).expect("reopen");
        let entry = store.find_entry(user_id, outcome_id).expect("find").expect("present");
        assert_eq!(entry.status, OutcomeStatus::Checked);
        assert_eq!(entry.checked_at, at(3, 9));
        assert_eq!(store.list_outcomes(user_id).expect("list").len(), DEFAULT_CATALOG.len());
    }

    #[test]
    fn unknown_outcome_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::open(dir.path().join("p.json")).expect("open");
        let user = store.upsert_user("a@example.com", "Ada").expect("user");
        let err = store.upsert_checked(user.id, 404, at(3, 9)).expect_err("missing outcome");
        assert!(matches!(err, StoreError::NotFound { kind: "outcome", id: 404 }));
    }

    #[test]
    fn coins_accumulate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::open(dir.path().join("p.json")).expect("open");
        let user = store.upsert_user("a@example.com", "Ada").expect("user");
        store.award_coins(user.id, 1, 10, at(3, 18)).expect("award");
        store.award_coins(user.id, 2, 10, at(3, 19)).expect("award");
        let summary = store.coin_summary(user.id, at(4, 9).date_naive()).expect("summary");
        assert_eq!(summary.total_coins, 20);
        assert_eq!(summary.total_badges, 2);
        assert_eq!(summary.coins_today, 0);
        assert_eq!(summary.coins_yesterday, 20);
    }

    /// Swap the document for a non-empty directory so the rename in `persist` fails.
    fn block_writes(path: &Path) {
        std::fs::remove_file(path).expect("remove document");
        std::fs::create_dir(path).expect("dir in place of document");
        std::fs::write(path.join("keep"), b"x").expect("fill dir");
    }

    fn unblock_writes(path: &Path) {
        std::fs::remove_dir_all(path).expect("remove dir");
    }

    #[test]
    fn failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("p.json");
        let store = JsonFileStore::open(&path).expect("open");
        block_writes(&path);

        assert!(store.upsert_user("a@example.com", "Ada").is_err());
        assert!(store.find_user_by_email("a@example.com").expect("lookup").is_none());
        assert!(store.list_users().expect("users").is_empty());

        unblock_writes(&path);
        store.upsert_user("a@example.com", "Ada").expect("user after recovery");
        let reopened = JsonFileStore::open(&path).expect("reopen");
        assert_eq!(reopened.list_users().expect("users").len(), 1);
    }

    #[test]
    fn completion_and_award_are_one_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("p.json");
        let store = JsonFileStore::open(&path).expect("open");
        let user = store.upsert_user("a@example.com", "Ada").expect("user");
        let outcome = store.list_outcomes(user.id).expect("list")[0].clone();
        store.upsert_checked(user.id, outcome.id, at(3, 9)).expect("check");
        let day = at(3, 9).date_naive();

        block_writes(&path);
        assert!(store
            .complete_and_award(user.id, outcome.id, day, at(3, 18), OUTCOME_COINS)
            .is_err());
        let entry = store.find_entry(user.id, outcome.id).expect("find").expect("entry");
        assert_eq!(entry.status, OutcomeStatus::Checked);
        assert_eq!(store.coin_summary(user.id, day).expect("summary").total_coins, 0);

        unblock_writes(&path);
        assert!(store
            .complete_and_award(user.id, outcome.id, day, at(3, 18), OUTCOME_COINS)
            .expect("complete"));
        assert!(!store
            .complete_and_award(user.id, outcome.id, day, at(3, 19), OUTCOME_COINS)
            .expect("second completion"));
        let summary = store.coin_summary(user.id, day).expect("summary");
        assert_eq!(summary.total_coins, OUTCOME_COINS);
        assert_eq!(summary.total_badges, 1);
    }
}
