pub mod alerts;
pub mod rules;

use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS alert_rules (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    server_id TEXT,
    metric TEXT NOT NULL,
    op TEXT NOT NULL,
    threshold REAL NOT NULL,
    severity TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    cooldown_minutes INTEGER NOT NULL DEFAULT 0,
    notify_webhook INTEGER NOT NULL DEFAULT 0,
    webhook_url TEXT,
    notify_email INTEGER NOT NULL DEFAULT 0,
    email_recipients TEXT NOT NULL DEFAULT '[]',
    notify_slack INTEGER NOT NULL DEFAULT 0,
    slack_webhook_url TEXT,
    last_triggered_at INTEGER,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_rules_enabled ON alert_rules(enabled);
CREATE INDEX IF NOT EXISTS idx_rules_user ON alert_rules(user_id);

CREATE TABLE IF NOT EXISTS alerts (
    id TEXT PRIMARY KEY,
    rule_id TEXT,
    server_id TEXT,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    severity TEXT NOT NULL,
    metric TEXT NOT NULL,
    metric_value REAL NOT NULL,
    context TEXT,
    status TEXT NOT NULL,
    acknowledged_at INTEGER,
    resolved_at INTEGER,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alerts_status ON alerts(status);
CREATE INDEX IF NOT EXISTS idx_alerts_severity ON alerts(severity);
CREATE INDEX IF NOT EXISTS idx_alerts_created ON alerts(created_at);

CREATE TABLE IF NOT EXISTS alert_history (
    id TEXT PRIMARY KEY,
    alert_id TEXT NOT NULL,
    action TEXT NOT NULL,
    description TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_history_alert ON alert_history(alert_id, created_at);

CREATE TABLE IF NOT EXISTS alert_comments (
    id TEXT PRIMARY KEY,
    alert_id TEXT NOT NULL,
    text TEXT NOT NULL,
    comment_type TEXT NOT NULL DEFAULT 'General',
    author TEXT,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_comments_alert ON alert_comments(alert_id, created_at);
";

/// SQLite-backed store for the alerting subsystem.
pub struct PanelStore {
    conn: Mutex<Connection>,
}

impl PanelStore {
    /// Opens (creating if necessary) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    StoreError::Validation(format!(
                        "cannot create data directory {}: {e}",
                        dir.display()
                    ))
                })?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;
        tracing::info!(path = %path.display(), "Opened alert store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    pub(crate) fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Parse a text column back into its domain enum.
pub(crate) fn parse_col<T>(column: &'static str, value: &str) -> Result<T>
where
    T: FromStr,
{
    value.parse().map_err(|_| StoreError::Corrupt {
        column,
        value: value.to_string(),
    })
}
