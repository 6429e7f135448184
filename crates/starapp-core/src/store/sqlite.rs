//! SQLite backend. Opens a connection per call; every write is a parameterized statement
//! and every upsert goes through `ON CONFLICT`, so concurrent requests for the same user
//! are serialized by the database rather than by application code.

use super::{normalize_email, OutcomeStore, StoreResult, DEFAULT_CATALOG};
use crate::model::{
    CoinSummary, LogEntry, NewOutcome, Outcome, OutcomeStatus, OutcomeType, User, OUTCOME_COINS,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};

const OUTCOME_COLUMNS: &str = "b.id, b.code, b.name, b.type, b.coins, b.custom, b.created_by";

const TYPE_ORDER: &str =
    "CASE b.type WHEN 'Learning' THEN 0 WHEN 'Earning' THEN 1 ELSE 2 END";

const COMPLETE_ENTRY: &str = r#"
    UPDATE badgelog SET status = 'Completed', completed_at = ?4
    WHERE user_id = ?1 AND badge_id = ?2 AND checked_day = ?3 AND status = 'Checked'
"#;

/// Add `amount` to the running balance and append the ledger row. Callers own the transaction.
fn credit_coins(
    conn: &Connection,
    user_id: i64,
    outcome_id: i64,
    amount: u32,
    at: DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO user_coins (user_id, coins, updated_at) VALUES (?1, ?2, ?3)
        ON CONFLICT(user_id) DO UPDATE SET
            coins = user_coins.coins + excluded.coins,
            updated_at = excluded.updated_at
        "#,
        params![user_id, amount, at],
    )?;
    conn.execute(
        "INSERT INTO coin_ledger (user_id, badge_id, coins, earned_at, earned_day) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, outcome_id, amount, at, at.date_naive()],
    )?;
    Ok(())
}

#[derive(Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path` and apply the schema.
    pub fn open(db_path: impl Into<PathBuf>) -> StoreResult<Self> {
        let this = Self {
            db_path: db_path.into(),
        };
        this.init()?;
        Ok(this)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    fn init(&self) -> StoreResult<()> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS badges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                coins INTEGER NOT NULL DEFAULT 10,
                custom INTEGER NOT NULL DEFAULT 0,
                created_by INTEGER NULL,
                FOREIGN KEY(created_by) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS badgelog (
                user_id INTEGER NOT NULL,
                badge_id INTEGER NOT NULL,
                status TEXT NOT NULL,
                checked_at TEXT NOT NULL,
                checked_day TEXT NOT NULL,
                completed_at TEXT NULL,
                PRIMARY KEY (user_id, badge_id),
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY(badge_id) REFERENCES badges(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_badgelog_day ON badgelog(user_id, checked_day);

            CREATE TABLE IF NOT EXISTS user_coins (
                user_id INTEGER PRIMARY KEY,
                coins INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS coin_ledger (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                badge_id INTEGER NOT NULL,
                coins INTEGER NOT NULL,
                earned_at TEXT NOT NULL,
                earned_day TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_coin_ledger_day ON coin_ledger(user_id, earned_day);
            "#,
        )?;

        let catalog_size: i64 =
            conn.query_row("SELECT COUNT(*) FROM badges WHERE custom = 0", [], |r| r.get(0))?;
        if catalog_size == 0 {
            for (code, name, ty) in DEFAULT_CATALOG {
                conn.execute(
                    "INSERT OR IGNORE INTO badges (code, name, type, coins, custom, created_by) VALUES (?1, ?2, ?3, ?4, 0, NULL)",
                    params![code, name, ty.as_str(), OUTCOME_COINS],
                )?;
            }
            tracing::info!(count = DEFAULT_CATALOG.len(), "seeded default outcome catalog");
        }
        Ok(())
    }
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn user_from_row(r: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: r.get(0)?,
        email: r.get(1)?,
        display_name: r.get(2)?,
    })
}

fn outcome_from_row(r: &Row<'_>, offset: usize) -> rusqlite::Result<Outcome> {
    let raw_type: String = r.get(offset + 3)?;
    let outcome_type = OutcomeType::parse(&raw_type)
        .ok_or_else(|| conversion_error(offset + 3, format!("unknown outcome type {raw_type:?}")))?;
    let coins: i64 = r.get(offset + 4)?;
    Ok(Outcome {
        id: r.get(offset)?,
        code: r.get(offset + 1)?,
        text: r.get(offset + 2)?,
        outcome_type,
        coins: coins.max(0) as u32,
        custom: r.get(offset + 5)?,
        created_by: r.get(offset + 6)?,
    })
}

fn entry_from_row(r: &Row<'_>) -> rusqlite::Result<LogEntry> {
    let raw_status: String = r.get(2)?;
    let status = OutcomeStatus::parse(&raw_status)
        .ok_or_else(|| conversion_error(2, format!("unknown status {raw_status:?}")))?;
    Ok(LogEntry {
        user_id: r.get(0)?,
        outcome_id: r.get(1)?,
        status,
        checked_at: r.get(3)?,
        completed_at: r.get(4)?,
    })
}

fn count(n: i64) -> u32 {
    u32::try_from(n.max(0)).unwrap_or(u32::MAX)
}

impl OutcomeStore for SqliteStore {
    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let needle = normalize_email(email);
        if needle.is_empty() {
            return Ok(None);
        }
        let conn = self.connect()?;
        let user = conn
            .query_row(
                "SELECT id, email, display_name FROM users WHERE email = ?1 LIMIT 1",
                params![needle],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn list_users(&self) -> StoreResult<Vec<User>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT id, email, display_name FROM users ORDER BY id")?;
        let rows = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn upsert_user(&self, email: &str, display_name: &str) -> StoreResult<User> {
        let conn = self.connect()?;
        let email = normalize_email(email);
        conn.execute(
            r#"
            INSERT INTO users (email, display_name) VALUES (?1, ?2)
            ON CONFLICT(email) DO UPDATE SET
                display_name = CASE WHEN excluded.display_name != '' THEN excluded.display_name ELSE users.display_name END
            "#,
            params![email, display_name.trim()],
        )?;
        let user = conn.query_row(
            "SELECT id, email, display_name FROM users WHERE email = ?1",
            params![email],
            user_from_row,
        )?;
        Ok(user)
    }

    fn list_outcomes(&self, user_id: i64) -> StoreResult<Vec<Outcome>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {OUTCOME_COLUMNS} FROM badges b WHERE b.custom = 0 OR b.created_by = ?1 ORDER BY {TYPE_ORDER}, b.id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![user_id], |r| outcome_from_row(r, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn find_outcome(&self, outcome_id: i64) -> StoreResult<Option<Outcome>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {OUTCOME_COLUMNS} FROM badges b WHERE b.id = ?1");
        let outcome = conn
            .query_row(&sql, params![outcome_id], |r| outcome_from_row(r, 0))
            .optional()?;
        Ok(outcome)
    }

    fn insert_outcome(&self, new: &NewOutcome) -> StoreResult<Outcome> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO badges (code, name, type, coins, custom, created_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(code) DO NOTHING
            "#,
            params![
                new.code,
                new.text.trim(),
                new.outcome_type.as_str(),
                OUTCOME_COINS,
                new.custom,
                new.created_by
            ],
        )?;
        let sql = format!("SELECT {OUTCOME_COLUMNS} FROM badges b WHERE b.code = ?1");
        let outcome = conn.query_row(&sql, params![new.code], |r| outcome_from_row(r, 0))?;
        Ok(outcome)
    }

    fn upsert_checked(&self, user_id: i64, outcome_id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO badgelog (user_id, badge_id, status, checked_at, checked_day, completed_at)
            VALUES (?1, ?2, 'Checked', ?3, ?4, NULL)
            ON CONFLICT(user_id, badge_id) DO UPDATE SET
                status = 'Checked',
                checked_at = excluded.checked_at,
                checked_day = excluded.checked_day,
                completed_at = NULL
            WHERE NOT (badgelog.status = 'Completed' AND badgelog.checked_day = excluded.checked_day)
            "#,
            params![user_id, outcome_id, at, at.date_naive()],
        )?;
        Ok(())
    }

    fn mark_completed(
        &self,
        user_id: i64,
        outcome_id: i64,
        day: NaiveDate,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(COMPLETE_ENTRY, params![user_id, outcome_id, day, at])?;
        Ok(changed > 0)
    }

    fn remove_entry(&self, user_id: i64, outcome_id: i64, day: NaiveDate) -> StoreResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "DELETE FROM badgelog WHERE user_id = ?1 AND badge_id = ?2 AND checked_day = ?3 AND status != 'Completed'",
            params![user_id, outcome_id, day],
        )?;
        Ok(changed > 0)
    }

    fn find_entry(&self, user_id: i64, outcome_id: i64) -> StoreResult<Option<LogEntry>> {
        let conn = self.connect()?;
        let entry = conn
            .query_row(
                "SELECT user_id, badge_id, status, checked_at, completed_at FROM badgelog WHERE user_id = ?1 AND badge_id = ?2",
                params![user_id, outcome_id],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    fn count_for_day(&self, user_id: i64, status: OutcomeStatus, day: NaiveDate) -> StoreResult<u32> {
        let conn = self.connect()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM badgelog WHERE user_id = ?1 AND status = ?2 AND checked_day = ?3",
            params![user_id, status.as_str(), day],
            |r| r.get(0),
        )?;
        Ok(count(n))
    }

    fn entries_for_day(&self, user_id: i64, day: NaiveDate) -> StoreResult<Vec<(LogEntry, Outcome)>> {
        let conn = self.connect()?;
        let sql = format!(
            r#"
            SELECT l.user_id, l.badge_id, l.status, l.checked_at, l.completed_at, {OUTCOME_COLUMNS}
            FROM badgelog l
            JOIN badges b ON b.id = l.badge_id
            WHERE l.user_id = ?1 AND l.checked_day = ?2
            ORDER BY {TYPE_ORDER}, b.id
            "#
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![user_id, day], |r| {
                Ok((entry_from_row(r)?, outcome_from_row(r, 5)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn award_coins(&self, user_id: i64, outcome_id: i64, amount: u32, at: DateTime<Utc>) -> StoreResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        credit_coins(&tx, user_id, outcome_id, amount, at)?;
        tx.commit()?;
        Ok(())
    }

    fn complete_and_award(
        &self,
        user_id: i64,
        outcome_id: i64,
        day: NaiveDate,
        at: DateTime<Utc>,
        amount: u32,
    ) -> StoreResult<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(COMPLETE_ENTRY, params![user_id, outcome_id, day, at])?;
        if changed == 0 {
            return Ok(false);
        }
        credit_coins(&tx, user_id, outcome_id, amount, at)?;
        tx.commit()?;
        Ok(true)
    }

    fn coin_summary(&self, user_id: i64, day: NaiveDate) -> StoreResult<CoinSummary> {
        let conn = self.connect()?;
        let total_coins: i64 = conn.query_row(
            "SELECT COALESCE((SELECT coins FROM user_coins WHERE user_id = ?1), 0)",
            params![user_id],
            |r| r.get(0),
        )?;
        let total_badges: i64 = conn.query_row(
            "SELECT COUNT(*) FROM coin_ledger WHERE user_id = ?1",
            params![user_id],
            |r| r.get(0),
        )?;
        let earned_on = |d: Option<NaiveDate>| -> rusqlite::Result<i64> {
            match d {
                Some(d) => conn.query_row(
                    "SELECT COALESCE(SUM(coins), 0) FROM coin_ledger WHERE user_id = ?1 AND earned_day = ?2",
                    params![user_id, d],
                    |r| r.get(0),
                ),
                None => Ok(0),
            }
        };
        let coins_today = earned_on(Some(day))?;
        let coins_yesterday = earned_on(day.pred_opt())?;
        Ok(CoinSummary {
            total_coins: count(total_coins),
            total_badges: count(total_badges),
            coins_today: count(coins_today),
            coins_yesterday: count(coins_yesterday),
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

    fn open() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(dir.path().join("bot.db")).expect("open store");
        (dir, store)
    }

    #[test]
    fn failed_award_rolls_back_completion() {
        let (_dir, store) = open();
        let user = store.upsert_user("a@example.com", "Ada").expect("user");
        let outcome = store.list_outcomes(user.id).expect("list")[0].clone();
        store.upsert_checked(user.id, outcome.id, at(3, 9)).expect("check");
        let day = at(3, 9).date_naive();

        let raw = Connection::open(store.path()).expect("raw connection");
        raw.execute_batch(
            "CREATE TRIGGER fail_ledger BEFORE INSERT ON coin_ledger BEGIN SELECT RAISE(ABORT, 'ledger offline'); END;",
        )
        .expect("install trigger");

        assert!(store
            .complete_and_award(user.id, outcome.id, day, at(3, 18), OUTCOME_COINS)
            .is_err());
        let entry = store.find_entry(user.id, outcome.id).expect("find").expect("entry");
        assert_eq!(entry.status, OutcomeStatus::Checked);
        assert_eq!(store.coin_summary(user.id, day).expect("summary").total_coins, 0);

        raw.execute_batch("DROP TRIGGER fail_ledger;").expect("drop trigger");
        assert!(store
            .complete_and_award(user.id, outcome.id, day, at(3, 18), OUTCOME_COINS)
            .expect("complete"));
        let entry = store.find_entry(user.id, outcome.id).expect("find").expect("entry");
        assert_eq!(entry.status, OutcomeStatus::Completed);
        let summary = store.coin_summary(user.id, day).expect("summary");
        assert_eq!(summary.total_coins, OUTCOME_COINS);
        assert_eq!(summary.total_badges, 1);
    }

    #[test]
    fn open_seeds_catalog_once() {
        let (dir, store) = open();
        let user = store.upsert_user("a@example.com", "Ada").expect("user");
        assert_eq!(store.list_outcomes(user.id).expect("list").len(), DEFAULT_CATALOG.len());

        let reopened = SqliteStore::open(dir.path().join("bot.db")).expect("reopen");
        assert_eq!(reopened.list_outcomes(user.id).expect("list").len(), DEFAULT_CATALOG.len());
    }

    #[test]
    fn user_lookup_ignores_case_and_whitespace() {
        let (_dir, store) = open();
        let user = store.upsert_user("Ada@Example.com", "Ada Lovelace").expect("user");
        let found = store
            .find_user_by_email("  ada@example.COM ")
            .expect("lookup")
            .expect("present");
        assert_eq!(found, user);
        assert!(store.find_user_by_email("nobody@example.com").expect("lookup").is_none());
    }

    #[test]
    fn upsert_user_keeps_name_when_blank() {
        let (_dir, store) = open();
        store.upsert_user("a@example.com", "Ada").expect("user");
        let again = store.upsert_user("a@example.com", "").expect("user");
        assert_eq!(again.display_name, "Ada");
        assert_eq!(store.list_users().expect("users").len(), 1);
    }

    #[test]
    fn outcomes_are_ordered_by_type() {
        let (_dir, store) = open();
        let user = store.upsert_user("a@example.com", "Ada").expect("user");
        let types: Vec<OutcomeType> = store
            .list_outcomes(user.id)
            .expect("list")
            .into_iter()
            .map(|o| o.outcome_type)
            .collect();
        let mut sorted = types.clone();
        sorted.sort();
        assert_eq!(types, sorted);
    }

    #[test]
    fn custom_outcomes_are_private_and_deduplicated() {
        let (_dir, store) = open();
        let ada = store.upsert_user("a@example.com", "Ada").expect("user");
        let bob = store.upsert_user("b@example.com", "Bob").expect("user");
        let new = NewOutcome {
            code: "CUSTOM_1_SHIP_IT".into(),
            text: "Ship it".into(),
            outcome_type: OutcomeType::Earning,
            custom: true,
            created_by: Some(ada.id),
        };
        let first = store.insert_outcome(&new).expect("insert");
        let second = store.insert_outcome(&new).expect("insert again");
        assert_eq!(first.id, second.id);
        assert!(first.custom);

        assert!(store.list_outcomes(ada.id).expect("list").iter().any(|o| o.id == first.id));
        assert!(!store.list_outcomes(bob.id).expect("list").iter().any(|o| o.id == first.id));
    }

    #[test]
    fn completion_is_day_scoped_and_single_shot() {
        let (_dir, store) = open();
        let user = store.upsert_user("a@example.com", "Ada").expect("user");
        let outcome = store.list_outcomes(user.id).expect("list")[0].clone();

        store.upsert_checked(user.id, outcome.id, at(3, 9)).expect("check");
        assert!(!store
            .mark_completed(user.id, outcome.id, at(4, 9).date_naive(), at(4, 18))
            .expect("complete other day"));
        assert!(store
            .mark_completed(user.id, outcome.id, at(3, 9).date_naive(), at(3, 18))
            .expect("complete"));
        assert!(!store
            .mark_completed(user.id, outcome.id, at(3, 9).date_naive(), at(3, 19))
            .expect("complete again"));

        let entry = store.find_entry(user.id, outcome.id).expect("find").expect("present");
        assert_eq!(entry.status, OutcomeStatus::Completed);
        assert_eq!(entry.checked_at, at(3, 9));
        assert_eq!(entry.completed_at, Some(at(3, 18)));
    }

    #[test]
    fn recheck_same_day_keeps_completion_but_next_day_rearms() {
        let (_dir, store) = open();
        let user = store.upsert_user("a@example.com", "Ada").expect("user");
        let outcome = store.list_outcomes(user.id).expect("list")[0].clone();

        store.upsert_checked(user.id, outcome.id, at(3, 9)).expect("check");
        store
            .mark_completed(user.id, outcome.id, at(3, 9).date_naive(), at(3, 18))
            .expect("complete");
        store.upsert_checked(user.id, outcome.id, at(3, 20)).expect("recheck");
        let entry = store.find_entry(user.id, outcome.id).expect("find").expect("present");
        assert_eq!(entry.status, OutcomeStatus::Completed);

        store.upsert_checked(user.id, outcome.id, at(4, 8)).expect("next day");
        let entry = store.find_entry(user.id, outcome.id).expect("find").expect("present");
        assert_eq!(entry.status, OutcomeStatus::Checked);
        assert_eq!(entry.checked_at, at(4, 8));
        assert_eq!(entry.completed_at, None);
    }

    #[test]
    fn remove_entry_skips_completed() {
        let (_dir, store) = open();
        let user = store.upsert_user("a@example.com", "Ada").expect("user");
        let outcomes = store.list_outcomes(user.id).expect("list");
        let day = at(3, 9).date_naive();
        store.upsert_checked(user.id, outcomes[0].id, at(3, 9)).expect("check");
        store.upsert_checked(user.id, outcomes[1].id, at(3, 9)).expect("check");
        store
            .mark_completed(user.id, outcomes[1].id, day, at(3, 18))
            .expect("complete");

        assert!(store.remove_entry(user.id, outcomes[0].id, day).expect("remove"));
        assert!(!store.remove_entry(user.id, outcomes[1].id, day).expect("remove"));
        assert_eq!(store.entries_for_day(user.id, day).expect("entries").len(), 1);
    }

    #[test]
    fn coin_summary_tracks_today_and_yesterday() {
        let (_dir, store) = open();
        let user = store.upsert_user("a@example.com", "Ada").expect("user");
        let outcomes = store.list_outcomes(user.id).expect("list");
        store.award_coins(user.id, outcomes[0].id, 10, at(2, 18)).expect("award");
        store.award_coins(user.id, outcomes[1].id, 10, at(3, 18)).expect("award");
        store.award_coins(user.id, outcomes[2].id, 10, at(3, 19)).expect("award");

        let summary = store.coin_summary(user.id, at(3, 20).date_naive()).expect("summary");
        assert_eq!(summary.total_coins, 30);
        assert_eq!(summary.total_badges, 3);
        assert_eq!(summary.coins_today, 20);
        assert_eq!(summary.coins_yesterday, 10);
        assert_eq!(summary.gain_over_yesterday(), 10);
    }

    #[test]
    fn checking_unknown_outcome_violates_foreign_key() {
        let (_dir, store) = open();
        let user = store.upsert_user("a@example.com", "Ada").expect("user");
        assert!(store.upsert_checked(user.id, 9_999, at(3, 9)).is_err());
    }
}
