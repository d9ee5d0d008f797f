use crate::error::{EngineError, Result};
use hostwatch_common::clock::Clock;
use hostwatch_common::id;
use hostwatch_common::types::{
    Alert, AlertComment, AlertHistoryEntry, AlertRule, AlertStatus, Severity,
    DEFAULT_COMMENT_TYPE,
};
use hostwatch_storage::{AlertFilter, NewComment, PanelStore};
use std::sync::Arc;

/// Comment supplied by a caller, validated before it reaches storage.
#[derive(Debug, Clone)]
pub struct CommentInput {
    pub text: String,
    pub comment_type: Option<String>,
    pub author: Option<String>,
}

/// Input for an alert raised outside of rule evaluation (operator
/// action, synthetic test alert).
#[derive(Debug, Clone)]
pub struct ManualAlert {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub metric: String,
    pub metric_value: f64,
    pub server_id: Option<String>,
}

/// The single write path for alert state.
///
/// Every transition is stamped with the injected clock and appends its
/// audit entry in the same transaction as the status change.
pub struct IncidentLifecycle {
    store: Arc<PanelStore>,
    clock: Arc<dyn Clock>,
}

impl IncidentLifecycle {
    pub fn new(store: Arc<PanelStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Raises an alert for a rule breach. Severity and metric are copied
    /// from the rule so later rule edits do not rewrite history.
    pub fn create_from_rule(&self, rule: &AlertRule, value: f64) -> Result<Alert> {
        let now = self.clock.now();
        let scope = match &rule.server_id {
            Some(server) => format!(" on {server}"),
            None => String::new(),
        };
        let alert = Alert {
            id: id::next_id(),
            rule_id: Some(rule.id.clone()),
            server_id: rule.server_id.clone(),
            title: format!("{} {} {}{scope}", rule.metric, rule.op.describe(), rule.threshold),
            message: format!(
                "{} is {:.2}, {} threshold {:.2}{scope}",
                rule.metric,
                value,
                rule.op.describe(),
                rule.threshold
            ),
            severity: rule.severity,
            metric: rule.metric.clone(),
            metric_value: value,
            context: Some(
                serde_json::json!({
                    "threshold": rule.threshold,
                    "op": rule.op.to_string(),
                })
                .to_string(),
            ),
            status: AlertStatus::Active,
            acknowledged_at: None,
            resolved_at: None,
            created_at: now,
        };
        let description = format!("Rule {} triggered", rule.id);
        let alert = self.store.create_alert(&alert, &description)?;
        tracing::info!(
            alert_id = %alert.id,
            rule_id = %rule.id,
            metric = %rule.metric,
            value,
            "Alert raised"
        );
        Ok(alert)
    }

    /// Raises an alert not backed by any rule.
    pub fn create_manual(&self, input: &ManualAlert) -> Result<Alert> {
        if input.title.trim().is_empty() {
            return Err(EngineError::Validation("alert title must not be blank".into()));
        }
        if input.message.trim().is_empty() {
            return Err(EngineError::Validation("alert message must not be blank".into()));
        }
        let alert = Alert {
            id: id::next_id(),
            rule_id: None,
            server_id: input.server_id.clone(),
            title: input.title.clone(),
            message: input.message.clone(),
            severity: input.severity,
            metric: input.metric.clone(),
            metric_value: input.metric_value,
            context: None,
            status: AlertStatus::Active,
            acknowledged_at: None,
            resolved_at: None,
            created_at: self.clock.now(),
        };
        Ok(self.store.create_alert(&alert, "Alert created manually")?)
    }

    pub fn get(&self, id: &str) -> Result<Alert> {
        self.store
            .get_alert(id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "alert",
                id: id.to_string(),
            })
    }

    pub fn list(&self, filter: &AlertFilter, limit: usize, offset: usize) -> Result<Vec<Alert>> {
        Ok(self.store.list_alerts(filter, limit, offset)?)
    }

    /// Active → Acknowledged. Acknowledging an already-acknowledged alert
    /// is a no-op that still records the comment, if any; acknowledging a
    /// resolved alert is rejected.
    pub fn acknowledge(&self, id: &str, comment: Option<CommentInput>) -> Result<Alert> {
        let comment = comment.map(validate_comment).transpose()?;
        let now = self.clock.now();
        let result = self.store.acknowledge_alert(id, now, comment.as_ref())?;
        if result.changed {
            tracing::info!(alert_id = %id, "Alert acknowledged");
        }
        Ok(result.alert)
    }

    /// Active|Acknowledged → Resolved. Idempotent.
    pub fn resolve(&self, id: &str, comment: Option<CommentInput>) -> Result<Alert> {
        let comment = comment.map(validate_comment).transpose()?;
        let now = self.clock.now();
        let result = self
            .store
            .resolve_alert(id, now, "Resolved", "Alert resolved", comment.as_ref())?;
        if result.changed {
            tracing::info!(alert_id = %id, "Alert resolved");
        }
        Ok(result.alert)
    }

    /// Soft delete: the alert is resolved under a "Deleted" audit label
    /// and the row is kept for history.
    pub fn soft_delete(&self, id: &str) -> Result<Alert> {
        let now = self.clock.now();
        let result = self
            .store
            .resolve_alert(id, now, "Deleted", "Alert deleted", None)?;
        if result.changed {
            tracing::info!(alert_id = %id, "Alert deleted (soft)");
        }
        Ok(result.alert)
    }

    pub fn add_comment(&self, alert_id: &str, comment: CommentInput) -> Result<AlertComment> {
        let comment = validate_comment(comment)?;
        Ok(self.store.add_comment(alert_id, &comment, self.clock.now())?)
    }

    pub fn history(&self, alert_id: &str) -> Result<Vec<AlertHistoryEntry>> {
        self.require_alert(alert_id)?;
        Ok(self.store.alert_history(alert_id)?)
    }

    pub fn comments(&self, alert_id: &str) -> Result<Vec<AlertComment>> {
        self.require_alert(alert_id)?;
        Ok(self.store.alert_comments(alert_id)?)
    }

    fn require_alert(&self, id: &str) -> Result<()> {
        if self.store.get_alert(id)?.is_none() {
            return Err(EngineError::NotFound {
                entity: "alert",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

fn validate_comment(input: CommentInput) -> Result<NewComment> {
    if input.text.trim().is_empty() {
        return Err(EngineError::Validation("comment text must not be blank".into()));
    }
    Ok(NewComment {
        text: input.text,
        comment_type: input
            .comment_type
            .unwrap_or_else(|| DEFAULT_COMMENT_TYPE.to_string()),
        author: input.author,
    })
}
