use crate::error::Result;
use crate::lifecycle::IncidentLifecycle;
use crate::MetricSource;
use hostwatch_common::clock::Clock;
use hostwatch_common::types::AlertRule;
use hostwatch_notify::NotificationDispatcher;
use hostwatch_storage::PanelStore;
use std::sync::Arc;
use std::time::Duration;

/// How one rule fared within a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleStatus {
    /// Breach claimed the cooldown and raised an alert.
    Triggered,
    /// Predicate was false.
    Passed,
    /// Breach swallowed by a still-running cooldown window.
    Suppressed,
    /// Metric unknown or its source unavailable.
    Skipped(String),
    /// Storage or lifecycle failure on this rule; the pass went on.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub status: RuleStatus,
}

/// Per-rule results of one evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct EvaluationReport {
    pub outcomes: Vec<RuleOutcome>,
}

impl EvaluationReport {
    pub fn evaluated(&self) -> usize {
        self.outcomes.len()
    }

    pub fn triggered(&self) -> usize {
        self.count(|s| *s == RuleStatus::Triggered)
    }

    pub fn suppressed(&self) -> usize {
        self.count(|s| *s == RuleStatus::Suppressed)
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, RuleStatus::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, RuleStatus::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&RuleStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Runs every enabled rule against the current metric values.
///
/// The cooldown claim happens before the alert row is written, so two
/// overlapping passes over the same rule cannot raise duplicates.
pub struct Evaluator {
    store: Arc<PanelStore>,
    source: Arc<dyn MetricSource>,
    dispatcher: Arc<NotificationDispatcher>,
    lifecycle: Arc<IncidentLifecycle>,
    clock: Arc<dyn Clock>,
    fetch_timeout: Duration,
}

impl Evaluator {
    pub fn new(
        store: Arc<PanelStore>,
        source: Arc<dyn MetricSource>,
        dispatcher: Arc<NotificationDispatcher>,
        lifecycle: Arc<IncidentLifecycle>,
        clock: Arc<dyn Clock>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            source,
            dispatcher,
            lifecycle,
            clock,
            fetch_timeout,
        }
    }

    /// One pass over all enabled rules. Failures are isolated per rule:
    /// a broken metric source, a failed write, or a failing notification
    /// channel is logged and recorded in the report, and the remaining
    /// rules still run.
    pub async fn evaluate_all(&self) -> Result<EvaluationReport> {
        let rules = self.store.list_enabled_rules()?;
        let mut report = EvaluationReport::default();

        for rule in rules {
            let status = self.evaluate_rule(&rule).await;
            if let RuleStatus::Failed(reason) = &status {
                tracing::error!(rule_id = %rule.id, reason = %reason, "Rule evaluation failed");
            }
            report.outcomes.push(RuleOutcome {
                rule_id: rule.id,
                status,
            });
        }

        tracing::debug!(
            evaluated = report.evaluated(),
            triggered = report.triggered(),
            suppressed = report.suppressed(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Evaluation pass complete"
        );
        Ok(report)
    }

    async fn evaluate_rule(&self, rule: &AlertRule) -> RuleStatus {
        let fetch = self.source.get_value(&rule.metric, rule.server_id.as_deref());
        let value = match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(Ok(Some(value))) => value,
            Ok(Ok(None)) => {
                tracing::debug!(rule_id = %rule.id, metric = %rule.metric, "Metric unknown, rule skipped");
                return RuleStatus::Skipped(format!("metric {} unknown", rule.metric));
            }
            Ok(Err(e)) => {
                tracing::warn!(rule_id = %rule.id, metric = %rule.metric, error = %e, "Metric source unavailable, rule skipped");
                return RuleStatus::Skipped(format!("metric source unavailable: {e}"));
            }
            Err(_) => {
                tracing::warn!(rule_id = %rule.id, metric = %rule.metric, "Metric fetch timed out, rule skipped");
                return RuleStatus::Skipped("metric fetch timed out".to_string());
            }
        };

        if !rule.op.check(value, rule.threshold) {
            return RuleStatus::Passed;
        }

        // Claim before creating: loses the race, raises nothing.
        let now = self.clock.now();
        match self.store.claim_trigger(&rule.id, now, rule.cooldown_minutes) {
            Ok(false) => {
                tracing::debug!(rule_id = %rule.id, "Breach suppressed by cooldown");
                RuleStatus::Suppressed
            }
            Ok(true) => match self.lifecycle.create_from_rule(rule, value) {
                Ok(alert) => {
                    let dispatch = self.dispatcher.dispatch(&alert, rule).await;
                    if dispatch.failed() > 0 {
                        tracing::warn!(
                            alert_id = %alert.id,
                            failed = dispatch.failed(),
                            sent = dispatch.sent(),
                            "Some notification channels failed"
                        );
                    }
                    RuleStatus::Triggered
                }
                Err(e) => RuleStatus::Failed(e.to_string()),
            },
            Err(e) => RuleStatus::Failed(e.to_string()),
        }
    }
}
