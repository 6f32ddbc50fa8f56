//! SQLite implementation of the ResultStore.
//!
//! Workers write one row per mechanism group they evaluated. A result is
//! complete once every requested group has a row.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::domain::models::ResultQuery;
use crate::domain::ports::ResultStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS evaluation_results (
    automation      TEXT NOT NULL,
    browser         TEXT NOT NULL,
    configuration   TEXT NOT NULL,
    revision        TEXT NOT NULL,
    mech_group      TEXT NOT NULL,
    mech_id         TEXT NOT NULL DEFAULT '',
    extension_name  TEXT NOT NULL DEFAULT '',
    cli_args        TEXT NOT NULL DEFAULT '',
    cookie_name     TEXT NOT NULL DEFAULT '',
    outcome         INTEGER,
    recorded_at     TEXT NOT NULL,
    PRIMARY KEY (automation, browser, configuration, revision, mech_group,
                 mech_id, extension_name, cli_args, cookie_name)
)"#;

#[derive(Clone)]
pub struct SqliteResultStore {
    pool: SqlitePool,
}

/// Row key columns of a query, with absent optionals stored as ''.
struct KeyColumns {
    configuration: String,
    revision: String,
    mech_id: String,
    extension_name: String,
    cli_args: String,
    cookie_name: String,
}

impl KeyColumns {
    fn of(query: &ResultQuery) -> Self {
        Self {
            configuration: query.configuration.to_string(),
            revision: query.revision.to_string(),
            mech_id: query.mech_id.clone().unwrap_or_default(),
            extension_name: query.extension_name.clone().unwrap_or_default(),
            cli_args: query.additional_cli_args.join(" "),
            cookie_name: query.cookie_name.clone().unwrap_or_default(),
        }
    }
}

impl SqliteResultStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `path` and ensure the schema.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let url = format!("sqlite:{}", path.display());
        let options = SqliteConnectOptions::from_str(&url)
            .with_context(|| format!("Invalid database URL: {url}"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open result database {}", path.display()))?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database, used by tests.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory database URL")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory result database")?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .context("Failed to create evaluation_results table")?;
        Ok(())
    }

    /// Insert or replace the result of one mechanism group.
    pub async fn record(
        &self,
        query: &ResultQuery,
        mech_group: &str,
        outcome: Option<bool>,
    ) -> Result<()> {
        let key = KeyColumns::of(query);
        sqlx::query(
            r#"INSERT OR REPLACE INTO evaluation_results
               (automation, browser, configuration, revision, mech_group, mech_id,
                extension_name, cli_args, cookie_name, outcome, recorded_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&query.automation)
        .bind(&query.browser)
        .bind(&key.configuration)
        .bind(&key.revision)
        .bind(mech_group)
        .bind(&key.mech_id)
        .bind(&key.extension_name)
        .bind(&key.cli_args)
        .bind(&key.cookie_name)
        .bind(outcome.map(i64::from))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to record result for {}", query.revision))?;
        Ok(())
    }
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    async fn has_result(&self, query: &ResultQuery) -> Result<bool> {
        let key = KeyColumns::of(query);
        for group in &query.mech_groups {
            let count: i64 = sqlx::query(
                r#"SELECT COUNT(*) FROM evaluation_results
                   WHERE automation = ? AND browser = ? AND configuration = ?
                     AND revision = ? AND mech_group = ?
                     AND extension_name = ? AND cli_args = ?"#,
            )
            .bind(&query.automation)
            .bind(&query.browser)
            .bind(&key.configuration)
            .bind(&key.revision)
            .bind(group)
            .bind(&key.extension_name)
            .bind(&key.cli_args)
            .fetch_one(&self.pool)
            .await
            .context("Failed to query evaluation_results")?
            .try_get(0)?;
            if count == 0 {
                debug!(revision = %query.revision, group, "no stored result for group");
                return Ok(false);
            }
        }
        Ok(!query.mech_groups.is_empty())
    }

    async fn get_result(&self, query: &ResultQuery) -> Result<Option<bool>> {
        let key = KeyColumns::of(query);
        let rows = sqlx::query(
            r#"SELECT mech_group, outcome FROM evaluation_results
               WHERE automation = ? AND browser = ? AND configuration = ?
                 AND revision = ? AND mech_id = ? AND extension_name = ?
                 AND cli_args = ? AND cookie_name = ?"#,
        )
        .bind(&query.automation)
        .bind(&query.browser)
        .bind(&key.configuration)
        .bind(&key.revision)
        .bind(&key.mech_id)
        .bind(&key.extension_name)
        .bind(&key.cli_args)
        .bind(&key.cookie_name)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query evaluation_results")?;

        let mut outcome = None;
        for row in rows {
            let group: String = row.try_get("mech_group")?;
            if !query.mech_groups.contains(&group) {
                continue;
            }
            match row.try_get::<Option<i64>, _>("outcome")? {
                Some(value) if value != 0 => return Ok(Some(true)),
                Some(_) => outcome = Some(false),
                None => {}
            }
        }
        Ok(outcome)
    }
}
