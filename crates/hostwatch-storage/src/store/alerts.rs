use crate::error::Result;
use crate::store::{from_millis, parse_col, to_millis, PanelStore};
use crate::StoreError;
use chrono::{DateTime, Utc};
use hostwatch_common::types::{
    Alert, AlertComment, AlertHistoryEntry, AlertStats, AlertStatus, Severity,
    DEFAULT_COMMENT_TYPE,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// A validated comment awaiting insertion.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub text: String,
    pub comment_type: String,
    pub author: Option<String>,
}

/// Outcome of a state-machine operation. `changed` is false when the call
/// was an idempotent no-op (e.g. resolving an already-resolved alert).
#[derive(Debug, Clone)]
pub struct AlertTransition {
    pub alert: Alert,
    pub changed: bool,
}

/// Alert list filter.
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub status_eq: Option<AlertStatus>,
    pub severity_eq: Option<Severity>,
    pub rule_id_eq: Option<String>,
    pub server_id_eq: Option<String>,
}

const ALERT_COLS: &str = "id, rule_id, server_id, title, message, severity, metric, \
     metric_value, context, status, acknowledged_at, resolved_at, created_at";

struct RawAlert {
    id: String,
    rule_id: Option<String>,
    server_id: Option<String>,
    title: String,
    message: String,
    severity: String,
    metric: String,
    metric_value: f64,
    context: Option<String>,
    status: String,
    acknowledged_at: Option<i64>,
    resolved_at: Option<i64>,
    created_at: i64,
}

fn alert_from_row(row: &Row<'_>) -> rusqlite::Result<RawAlert> {
    Ok(RawAlert {
        id: row.get(0)?,
        rule_id: row.get(1)?,
        server_id: row.get(2)?,
        title: row.get(3)?,
        message: row.get(4)?,
        severity: row.get(5)?,
        metric: row.get(6)?,
        metric_value: row.get(7)?,
        context: row.get(8)?,
        status: row.get(9)?,
        acknowledged_at: row.get(10)?,
        resolved_at: row.get(11)?,
        created_at: row.get(12)?,
    })
}

impl RawAlert {
    fn into_alert(self) -> Result<Alert> {
        Ok(Alert {
            id: self.id,
            rule_id: self.rule_id,
            server_id: self.server_id,
            title: self.title,
            message: self.message,
            severity: parse_col("severity", &self.severity)?,
            metric: self.metric,
            metric_value: self.metric_value,
            context: self.context,
            status: parse_col("status", &self.status)?,
            acknowledged_at: self.acknowledged_at.map(from_millis),
            resolved_at: self.resolved_at.map(from_millis),
            created_at: from_millis(self.created_at),
        })
    }
}

fn fetch_alert(conn: &Connection, id: &str) -> Result<Option<Alert>> {
    let raw = conn
        .query_row(
            &format!("SELECT {ALERT_COLS} FROM alerts WHERE id = ?1"),
            params![id],
            alert_from_row,
        )
        .optional()?;
    raw.map(RawAlert::into_alert).transpose()
}

fn insert_history(
    conn: &Connection,
    alert_id: &str,
    action: &str,
    description: &str,
    now: DateTime<Utc>,
) -> Result<AlertHistoryEntry> {
    let entry = AlertHistoryEntry {
        id: hostwatch_common::id::next_id(),
        alert_id: alert_id.to_string(),
        action: action.to_string(),
        description: description.to_string(),
        created_at: now,
    };
    conn.execute(
        "INSERT INTO alert_history (id, alert_id, action, description, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.id,
            entry.alert_id,
            entry.action,
            entry.description,
            to_millis(entry.created_at),
        ],
    )?;
    Ok(entry)
}

fn insert_comment(
    conn: &Connection,
    alert_id: &str,
    comment: &NewComment,
    now: DateTime<Utc>,
) -> Result<AlertComment> {
    let row = AlertComment {
        id: hostwatch_common::id::next_id(),
        alert_id: alert_id.to_string(),
        text: comment.text.clone(),
        comment_type: if comment.comment_type.trim().is_empty() {
            DEFAULT_COMMENT_TYPE.to_string()
        } else {
            comment.comment_type.clone()
        },
        author: comment.author.clone(),
        created_at: now,
    };
    conn.execute(
        "INSERT INTO alert_comments (id, alert_id, text, comment_type, author, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            row.id,
            row.alert_id,
            row.text,
            row.comment_type,
            row.author,
            to_millis(row.created_at),
        ],
    )?;
    Ok(row)
}

impl PanelStore {
    /// Persists a new alert together with its "Created" audit entry in one
    /// transaction.
    pub fn create_alert(&self, alert: &Alert, history_description: &str) -> Result<Alert> {
        let conn = self.lock_conn();
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO alerts ({ALERT_COLS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ),
            params![
                alert.id,
                alert.rule_id,
                alert.server_id,
                alert.title,
                alert.message,
                alert.severity.to_string(),
                alert.metric,
                alert.metric_value,
                alert.context,
                alert.status.to_string(),
                alert.acknowledged_at.map(to_millis),
                alert.resolved_at.map(to_millis),
                to_millis(alert.created_at),
            ],
        )?;
        insert_history(&tx, &alert.id, "Created", history_description, alert.created_at)?;
        tx.commit()?;
        Ok(alert.clone())
    }

    pub fn get_alert(&self, id: &str) -> Result<Option<Alert>> {
        let conn = self.lock_conn();
        fetch_alert(&conn, id)
    }

    pub fn list_alerts(
        &self,
        filter: &AlertFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Alert>> {
        let mut sql = format!("SELECT {ALERT_COLS} FROM alerts WHERE 1=1");
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some(status) = filter.status_eq {
            sql.push_str(" AND status = ?");
            args.push(Box::new(status.to_string()));
        }
        if let Some(severity) = filter.severity_eq {
            sql.push_str(" AND severity = ?");
            args.push(Box::new(severity.to_string()));
        }
        if let Some(rule_id) = &filter.rule_id_eq {
            sql.push_str(" AND rule_id = ?");
            args.push(Box::new(rule_id.clone()));
        }
        if let Some(server_id) = &filter.server_id_eq {
            sql.push_str(" AND server_id = ?");
            args.push(Box::new(server_id.clone()));
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");
        args.push(Box::new(limit as i64));
        args.push(Box::new(offset as i64));

        let conn = self.lock_conn();
        let mut stmt = conn.prepare(&sql)?;
        let arg_refs: Vec<&dyn rusqlite::types::ToSql> = args.iter().map(AsRef::as_ref).collect();
        let rows = stmt.query_map(&arg_refs[..], alert_from_row)?;
        let mut alerts = Vec::new();
        for raw in rows {
            alerts.push(raw?.into_alert()?);
        }
        Ok(alerts)
    }

    /// Active → Acknowledged, in one transaction with the audit entry and
    /// optional comment.
    ///
    /// Already-Acknowledged is an idempotent no-op (comment still appended if
    /// supplied); Resolved is a terminal state and is rejected.
    pub fn acknowledge_alert(
        &self,
        id: &str,
        now: DateTime<Utc>,
        comment: Option<&NewComment>,
    ) -> Result<AlertTransition> {
        let conn = self.lock_conn();
        let tx = conn.unchecked_transaction()?;
        let alert = fetch_alert(&tx, id)?.ok_or_else(|| StoreError::NotFound {
            entity: "alert",
            id: id.to_string(),
        })?;

        let transition = match alert.status {
            AlertStatus::Resolved => {
                return Err(StoreError::InvalidState(format!(
                    "alert {id} is resolved and cannot be acknowledged"
                )));
            }
            AlertStatus::Acknowledged => {
                if let Some(c) = comment {
                    insert_comment(&tx, id, c, now)?;
                }
                AlertTransition {
                    alert,
                    changed: false,
                }
            }
            AlertStatus::Active => {
                tx.execute(
                    "UPDATE alerts SET status = ?1, acknowledged_at = ?2 WHERE id = ?3",
                    params![AlertStatus::Acknowledged.to_string(), to_millis(now), id],
                )?;
                insert_history(&tx, id, "Acknowledged", "Alert acknowledged", now)?;
                if let Some(c) = comment {
                    insert_comment(&tx, id, c, now)?;
                }
                let mut alert = alert;
                alert.status = AlertStatus::Acknowledged;
                alert.acknowledged_at = Some(now);
                AlertTransition {
                    alert,
                    changed: true,
                }
            }
        };
        tx.commit()?;
        Ok(transition)
    }

    /// Active|Acknowledged → Resolved. Idempotent when already resolved: the
    /// current state is returned and no duplicate history entry is written.
    ///
    /// `action` is the audit label: "Resolved" for user resolution,
    /// "Deleted" for the soft-delete path.
    pub fn resolve_alert(
        &self,
        id: &str,
        now: DateTime<Utc>,
        action: &str,
        description: &str,
        comment: Option<&NewComment>,
    ) -> Result<AlertTransition> {
        let conn = self.lock_conn();
        let tx = conn.unchecked_transaction()?;
        let alert = fetch_alert(&tx, id)?.ok_or_else(|| StoreError::NotFound {
            entity: "alert",
            id: id.to_string(),
        })?;

        let transition = if alert.status == AlertStatus::Resolved {
            if let Some(c) = comment {
                insert_comment(&tx, id, c, now)?;
            }
            AlertTransition {
                alert,
                changed: false,
            }
        } else {
            tx.execute(
                "UPDATE alerts SET status = ?1, resolved_at = ?2 WHERE id = ?3",
                params![AlertStatus::Resolved.to_string(), to_millis(now), id],
            )?;
            insert_history(&tx, id, action, description, now)?;
            if let Some(c) = comment {
                insert_comment(&tx, id, c, now)?;
            }
            let mut alert = alert;
            alert.status = AlertStatus::Resolved;
            alert.resolved_at = Some(now);
            AlertTransition {
                alert,
                changed: true,
            }
        };
        tx.commit()?;
        Ok(transition)
    }

    /// Appends a comment regardless of the alert's status.
    pub fn add_comment(
        &self,
        alert_id: &str,
        comment: &NewComment,
        now: DateTime<Utc>,
    ) -> Result<AlertComment> {
        let conn = self.lock_conn();
        let tx = conn.unchecked_transaction()?;
        let exists: bool = tx
            .query_row(
                "SELECT 1 FROM alerts WHERE id = ?1",
                params![alert_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(StoreError::NotFound {
                entity: "alert",
                id: alert_id.to_string(),
            });
        }
        let row = insert_comment(&tx, alert_id, comment, now)?;
        tx.commit()?;
        Ok(row)
    }

    /// Audit trail for an alert, oldest first.
    pub fn alert_history(&self, alert_id: &str) -> Result<Vec<AlertHistoryEntry>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT id, alert_id, action, description, created_at FROM alert_history \
             WHERE alert_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![alert_id], |row| {
            Ok(AlertHistoryEntry {
                id: row.get(0)?,
                alert_id: row.get(1)?,
                action: row.get(2)?,
                description: row.get(3)?,
                created_at: from_millis(row.get(4)?),
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Comments on an alert, oldest first.
    pub fn alert_comments(&self, alert_id: &str) -> Result<Vec<AlertComment>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT id, alert_id, text, comment_type, author, created_at FROM alert_comments \
             WHERE alert_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![alert_id], |row| {
            Ok(AlertComment {
                id: row.get(0)?,
                alert_id: row.get(1)?,
                text: row.get(2)?,
                comment_type: row.get(3)?,
                author: row.get(4)?,
                created_at: from_millis(row.get(5)?),
            })
        })?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    /// Summary counts over all alert rows, grouped in a single query so the
    /// result is consistent with the table at the moment of the read.
    pub fn alert_stats(&self) -> Result<AlertStats> {
        let conn = self.lock_conn();
        let mut stmt =
            conn.prepare("SELECT status, severity, COUNT(*) FROM alerts GROUP BY status, severity")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        let mut stats = AlertStats::default();
        for row in rows {
            let (status, severity, count) = row?;
            let status: AlertStatus = parse_col("status", &status)?;
            let severity: Severity = parse_col("severity", &severity)?;
            stats.total += count;
            match status {
                AlertStatus::Active => stats.active += count,
                AlertStatus::Acknowledged => stats.acknowledged += count,
                AlertStatus::Resolved => stats.resolved += count,
            }
            match severity {
                Severity::Info => stats.info += count,
                Severity::Warning => stats.warning += count,
                Severity::Error => stats.error += count,
                Severity::Critical => stats.critical += count,
            }
        }
        Ok(stats)
    }
}
