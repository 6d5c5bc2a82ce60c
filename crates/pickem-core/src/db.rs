// SQLite persistence for pick sheets and small key-value run state.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::feed::PicksFeed;
use crate::model::pick::{SelectedTeam, WeekStatus};
use crate::scoring::ScoringRules;
use crate::session::PickStore;

/// Current on-disk schema version, stored under [`Database::SCHEMA_VERSION_KEY`].
pub const SCHEMA_VERSION: i64 = 1;

/// SQLite-backed store for users, weekly pick sheets, and app state.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    const SCHEMA_VERSION_KEY: &'static str = "schema_version";

    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                user_id         TEXT PRIMARY KEY,
                display_name    TEXT NOT NULL,
                picks_submitted INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS week_picks (
                user_id    TEXT NOT NULL,
                week       INTEGER NOT NULL,
                teams      TEXT NOT NULL,
                bonus      TEXT,
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (user_id, week)
            );

            CREATE TABLE IF NOT EXISTS app_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.check_schema_version()?;
        Ok(db)
    }

    /// Stamp a fresh database with the current schema version, and refuse
    /// to open one written by a newer version.
    fn check_schema_version(&self) -> Result<()> {
        match self.load_state(Self::SCHEMA_VERSION_KEY)? {
            None => self.save_state(
                Self::SCHEMA_VERSION_KEY,
                &serde_json::Value::from(SCHEMA_VERSION),
            ),
            Some(v) => {
                let found = v.as_i64().unwrap_or(0);
                if found > SCHEMA_VERSION {
                    anyhow::bail!(
                        "database schema version {found} is newer than supported version {SCHEMA_VERSION}"
                    );
                }
                Ok(())
            }
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Insert a user or update their display name. The submitted flag is
    /// left untouched.
    pub fn upsert_user(&self, user_id: &str, display_name: &str) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (user_id, display_name) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET display_name = excluded.display_name",
                params![user_id, display_name],
            )
            .context("failed to upsert user")?;
        Ok(())
    }

    /// Display name for a user, if known.
    pub fn display_name(&self, user_id: &str) -> Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT display_name FROM users WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query display name")
    }

    /// `(user_id, display_name)` for every user who submitted, by user id.
    pub fn submitted_users(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT user_id, display_name FROM users
                 WHERE picks_submitted = 1 ORDER BY user_id",
            )
            .context("failed to prepare submitted_users query")?;
        let users = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .context("failed to query submitted users")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map user rows")?;
        Ok(users)
    }

    // ------------------------------------------------------------------
    // Weekly pick sheets
    // ------------------------------------------------------------------

    /// Delete a user's saved weeks and submission flag.
    pub fn clear_user(&self, user_id: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        tx.execute("DELETE FROM week_picks WHERE user_id = ?1", params![user_id])
            .context("failed to delete week picks")?;
        tx.execute(
            "UPDATE users SET picks_submitted = 0 WHERE user_id = ?1",
            params![user_id],
        )
        .context("failed to reset submitted flag")?;
        tx.commit().context("failed to commit clear_user")?;
        Ok(())
    }

    /// Rebuild the picks feed from every submitted user. Weeks with no
    /// saved sheet are pre-filled empty.
    pub fn export_picks_feed(&self, rules: &ScoringRules) -> Result<PicksFeed> {
        let mut feed = PicksFeed::default();
        for (user_id, name) in self.submitted_users()? {
            let weeks = self.load_weeks(&user_id)?;
            feed.insert_user(&user_id, &name, &weeks, rules);
        }
        Ok(feed)
    }

    // ------------------------------------------------------------------
    // Key-value state
    // ------------------------------------------------------------------

    /// Persist an arbitrary JSON value under `key`. Uses INSERT OR REPLACE so
    /// repeated saves overwrite the previous value.
    pub fn save_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let json_str =
            serde_json::to_string(value).context("failed to serialize state value")?;
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO app_state (key, value) VALUES (?1, ?2)",
                params![key, json_str],
            )
            .context("failed to save state")?;
        Ok(())
    }

    /// Load a previously saved JSON value by `key`. Returns `None` if the key
    /// does not exist.
    pub fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let json_str: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM app_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query app state")?;

        json_str
            .map(|s| serde_json::from_str(&s).context("failed to deserialize state value"))
            .transpose()
    }
}

impl PickStore for Database {
    fn load_weeks(&self, user_id: &str) -> Result<BTreeMap<u8, WeekStatus>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT week, teams, bonus FROM week_picks WHERE user_id = ?1 ORDER BY week")
            .context("failed to prepare load_weeks query")?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                let week: u8 = row.get(0)?;
                let teams_json: String = row.get(1)?;
                let bonus: Option<String> = row.get(2)?;
                Ok((week, teams_json, bonus))
            })
            .context("failed to query week picks")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map week pick rows")?;

        rows.into_iter()
            .map(|(week, teams_json, bonus)| {
                let picks: Vec<SelectedTeam> = serde_json::from_str(&teams_json)
                    .with_context(|| format!("corrupt teams for week {week}"))?;
                Ok((week, WeekStatus { picks, bonus }))
            })
            .collect()
    }

    fn save_week(&self, user_id: &str, week: u8, status: &WeekStatus) -> Result<()> {
        let teams_json =
            serde_json::to_string(&status.picks).context("failed to serialize week teams")?;
        self.conn()
            .execute(
                "INSERT INTO week_picks (user_id, week, teams, bonus) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, week) DO UPDATE SET
                    teams      = excluded.teams,
                    bonus      = excluded.bonus,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![user_id, week, teams_json, status.bonus],
            )
            .context("failed to save week picks")?;
        Ok(())
    }

    fn mark_submitted(&self, user_id: &str, display_name: &str) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (user_id, display_name, picks_submitted) VALUES (?1, ?2, 1)
                 ON CONFLICT(user_id) DO UPDATE SET
                    display_name    = excluded.display_name,
                    picks_submitted = 1",
                params![user_id, display_name],
            )
            .context("failed to mark user submitted")?;
        Ok(())
    }
}
