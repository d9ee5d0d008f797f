use crate::error::Result;
use crate::store::{from_millis, parse_col, to_millis, PanelStore};
use crate::StoreError;
use chrono::{DateTime, Duration, Utc};
use hostwatch_common::types::{AlertRule, CompareOp, Severity};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// Partial update for an alert rule. `None` fields are left unchanged;
/// nullable targets use a double `Option` so callers can clear them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleUpdate {
    pub metric: Option<String>,
    pub op: Option<CompareOp>,
    pub threshold: Option<f64>,
    pub severity: Option<Severity>,
    pub enabled: Option<bool>,
    pub cooldown_minutes: Option<i64>,
    pub notify_webhook: Option<bool>,
    pub webhook_url: Option<Option<String>>,
    pub notify_email: Option<bool>,
    pub email_recipients: Option<Vec<String>>,
    pub notify_slack: Option<bool>,
    pub slack_webhook_url: Option<Option<String>>,
}

/// Rule list filter.
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    pub user_id_eq: Option<String>,
    pub server_id_eq: Option<String>,
    pub enabled_eq: Option<bool>,
}

fn rule_from_row(row: &Row<'_>) -> rusqlite::Result<RawRule> {
    Ok(RawRule {
        id: row.get(0)?,
        user_id: row.get(1)?,
        server_id: row.get(2)?,
        metric: row.get(3)?,
        op: row.get(4)?,
        threshold: row.get(5)?,
        severity: row.get(6)?,
        enabled: row.get(7)?,
        cooldown_minutes: row.get(8)?,
        notify_webhook: row.get(9)?,
        webhook_url: row.get(10)?,
        notify_email: row.get(11)?,
        email_recipients: row.get(12)?,
        notify_slack: row.get(13)?,
        slack_webhook_url: row.get(14)?,
        last_triggered_at: row.get(15)?,
        created_at: row.get(16)?,
    })
}

struct RawRule {
    id: String,
    user_id: String,
    server_id: Option<String>,
    metric: String,
    op: String,
    threshold: f64,
    severity: String,
    enabled: bool,
    cooldown_minutes: i64,
    notify_webhook: bool,
    webhook_url: Option<String>,
    notify_email: bool,
    email_recipients: String,
    notify_slack: bool,
    slack_webhook_url: Option<String>,
    last_triggered_at: Option<i64>,
    created_at: i64,
}

impl RawRule {
    fn into_rule(self) -> Result<AlertRule> {
        Ok(AlertRule {
            id: self.id,
            user_id: self.user_id,
            server_id: self.server_id,
            metric: self.metric,
            op: parse_col("op", &self.op)?,
            threshold: self.threshold,
            severity: parse_col("severity", &self.severity)?,
            enabled: self.enabled,
            cooldown_minutes: self.cooldown_minutes,
            notify_webhook: self.notify_webhook,
            webhook_url: self.webhook_url,
            notify_email: self.notify_email,
            email_recipients: serde_json::from_str(&self.email_recipients)?,
            notify_slack: self.notify_slack,
            slack_webhook_url: self.slack_webhook_url,
            last_triggered_at: self.last_triggered_at.map(from_millis),
            created_at: from_millis(self.created_at),
        })
    }
}

const RULE_COLS: &str = "id, user_id, server_id, metric, op, threshold, severity, enabled, \
     cooldown_minutes, notify_webhook, webhook_url, notify_email, email_recipients, \
     notify_slack, slack_webhook_url, last_triggered_at, created_at";

fn validate_rule(metric: &str, cooldown_minutes: i64) -> Result<()> {
    if metric.trim().is_empty() {
        return Err(StoreError::Validation("rule metric must not be blank".into()));
    }
    if cooldown_minutes < 0 {
        return Err(StoreError::Validation(format!(
            "cooldown_minutes must be >= 0, got {cooldown_minutes}"
        )));
    }
    Ok(())
}

fn fetch_rule(conn: &Connection, id: &str) -> Result<Option<AlertRule>> {
    let raw = conn
        .query_row(
            &format!("SELECT {RULE_COLS} FROM alert_rules WHERE id = ?1"),
            params![id],
            rule_from_row,
        )
        .optional()?;
    raw.map(RawRule::into_rule).transpose()
}

impl PanelStore {
    pub fn insert_rule(&self, rule: &AlertRule) -> Result<AlertRule> {
        validate_rule(&rule.metric, rule.cooldown_minutes)?;
        let recipients = serde_json::to_string(&rule.email_recipients)?;
        let conn = self.lock_conn();
        conn.execute(
            &format!(
                "INSERT INTO alert_rules ({RULE_COLS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
            ),
            params![
                rule.id,
                rule.user_id,
                rule.server_id,
                rule.metric,
                rule.op.to_string(),
                rule.threshold,
                rule.severity.to_string(),
                rule.enabled,
                rule.cooldown_minutes,
                rule.notify_webhook,
                rule.webhook_url,
                rule.notify_email,
                recipients,
                rule.notify_slack,
                rule.slack_webhook_url,
                rule.last_triggered_at.map(to_millis),
                to_millis(rule.created_at),
            ],
        )?;
        Ok(rule.clone())
    }

    pub fn get_rule(&self, id: &str) -> Result<Option<AlertRule>> {
        let conn = self.lock_conn();
        fetch_rule(&conn, id)
    }

    pub fn list_rules(&self, filter: &RuleFilter, limit: usize, offset: usize) -> Result<Vec<AlertRule>> {
        let mut sql = format!("SELECT {RULE_COLS} FROM alert_rules WHERE 1=1");
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some(user) = &filter.user_id_eq {
            sql.push_str(" AND user_id = ?");
            args.push(Box::new(user.clone()));
        }
        if let Some(server) = &filter.server_id_eq {
            sql.push_str(" AND server_id = ?");
            args.push(Box::new(server.clone()));
        }
        if let Some(enabled) = filter.enabled_eq {
            sql.push_str(" AND enabled = ?");
            args.push(Box::new(enabled));
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");
        args.push(Box::new(limit as i64));
        args.push(Box::new(offset as i64));

        let conn = self.lock_conn();
        let mut stmt = conn.prepare(&sql)?;
        let arg_refs: Vec<&dyn rusqlite::types::ToSql> = args.iter().map(AsRef::as_ref).collect();
        let rows = stmt.query_map(&arg_refs[..], rule_from_row)?;
        let mut rules = Vec::new();
        for raw in rows {
            rules.push(raw?.into_rule()?);
        }
        Ok(rules)
    }

    /// Rules the evaluator runs over, oldest first. Rows that no longer
    /// parse into the domain model are skipped with a warning; one
    /// unreadable row never stalls evaluation of the rest.
    pub fn list_enabled_rules(&self) -> Result<Vec<AlertRule>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RULE_COLS} FROM alert_rules WHERE enabled = 1 ORDER BY created_at ASC"
        ))?;
        let rows = stmt.query_map([], rule_from_row)?;
        let mut rules = Vec::new();
        for raw in rows {
            let raw = raw?;
            let id = raw.id.clone();
            match raw.into_rule() {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    tracing::warn!(rule_id = %id, error = %e, "Skipping unreadable alert rule row");
                }
            }
        }
        Ok(rules)
    }

    pub fn update_rule(&self, id: &str, update: &RuleUpdate) -> Result<AlertRule> {
        let conn = self.lock_conn();
        let tx = conn.unchecked_transaction()?;
        let mut rule = fetch_rule(&tx, id)?.ok_or_else(|| StoreError::NotFound {
            entity: "alert_rule",
            id: id.to_string(),
        })?;

        if let Some(metric) = &update.metric {
            rule.metric = metric.clone();
        }
        if let Some(op) = update.op {
            rule.op = op;
        }
        if let Some(threshold) = update.threshold {
            rule.threshold = threshold;
        }
        if let Some(severity) = update.severity {
            rule.severity = severity;
        }
        if let Some(enabled) = update.enabled {
            rule.enabled = enabled;
        }
        if let Some(cooldown) = update.cooldown_minutes {
            rule.cooldown_minutes = cooldown;
        }
        if let Some(v) = update.notify_webhook {
            rule.notify_webhook = v;
        }
        if let Some(url) = &update.webhook_url {
            rule.webhook_url = url.clone();
        }
        if let Some(v) = update.notify_email {
            rule.notify_email = v;
        }
        if let Some(recipients) = &update.email_recipients {
            rule.email_recipients = recipients.clone();
        }
        if let Some(v) = update.notify_slack {
            rule.notify_slack = v;
        }
        if let Some(url) = &update.slack_webhook_url {
            rule.slack_webhook_url = url.clone();
        }
        validate_rule(&rule.metric, rule.cooldown_minutes)?;

        let recipients = serde_json::to_string(&rule.email_recipients)?;
        tx.execute(
            "UPDATE alert_rules SET metric = ?1, op = ?2, threshold = ?3, severity = ?4, \
             enabled = ?5, cooldown_minutes = ?6, notify_webhook = ?7, webhook_url = ?8, \
             notify_email = ?9, email_recipients = ?10, notify_slack = ?11, \
             slack_webhook_url = ?12 WHERE id = ?13",
            params![
                rule.metric,
                rule.op.to_string(),
                rule.threshold,
                rule.severity.to_string(),
                rule.enabled,
                rule.cooldown_minutes,
                rule.notify_webhook,
                rule.webhook_url,
                rule.notify_email,
                recipients,
                rule.notify_slack,
                rule.slack_webhook_url,
                id,
            ],
        )?;
        tx.commit()?;
        Ok(rule)
    }

    pub fn set_rule_enabled(&self, id: &str, enabled: bool) -> Result<AlertRule> {
        let conn = self.lock_conn();
        let changed = conn.execute(
            "UPDATE alert_rules SET enabled = ?1 WHERE id = ?2",
            params![enabled, id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "alert_rule",
                id: id.to_string(),
            });
        }
        fetch_rule(&conn, id)?.ok_or_else(|| StoreError::NotFound {
            entity: "alert_rule",
            id: id.to_string(),
        })
    }

    pub fn delete_rule(&self, id: &str) -> Result<bool> {
        let conn = self.lock_conn();
        let deleted = conn.execute("DELETE FROM alert_rules WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// Atomic cooldown gate: stamps `last_triggered_at = now` and returns
    /// `true` only if the rule is enabled and not still cooling down.
    ///
    /// The check-and-set is one `UPDATE` guarded by the row predicate, so two
    /// concurrent evaluation passes cannot both claim the same rule within
    /// one cooldown window.
    pub fn claim_trigger(
        &self,
        rule_id: &str,
        now: DateTime<Utc>,
        cooldown_minutes: i64,
    ) -> Result<bool> {
        let cutoff = now - Duration::minutes(cooldown_minutes.max(0));
        let conn = self.lock_conn();
        let claimed = conn.execute(
            "UPDATE alert_rules SET last_triggered_at = ?1 \
             WHERE id = ?2 AND enabled = 1 \
             AND (last_triggered_at IS NULL OR last_triggered_at <= ?3)",
            params![to_millis(now), rule_id, to_millis(cutoff)],
        )?;
        Ok(claimed > 0)
    }
}
