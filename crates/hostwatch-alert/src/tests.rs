use crate::evaluator::{Evaluator, RuleStatus};
use crate::lifecycle::{CommentInput, IncidentLifecycle, ManualAlert};
use crate::stats::StatsAggregator;
use crate::{EngineError, MetricSource};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hostwatch_common::clock::{Clock, ManualClock};
use hostwatch_common::types::{AlertRule, AlertStatus, CompareOp, Severity};
use hostwatch_notify::NotificationDispatcher;
use hostwatch_storage::PanelStore;
use std::collections::HashMap;
use std::sync::Arc;

struct MockSource {
    values: HashMap<String, f64>,
    fail: bool,
}

impl MockSource {
    fn with_value(metric: &str, value: f64) -> Self {
        let mut values = HashMap::new();
        values.insert(metric.to_string(), value);
        Self {
            values,
            fail: false,
        }
    }

    fn unavailable() -> Self {
        Self {
            values: HashMap::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl MetricSource for MockSource {
    async fn get_value(&self, metric: &str, _server_id: Option<&str>) -> Result<Option<f64>> {
        if self.fail {
            anyhow::bail!("metric backend unreachable");
        }
        Ok(self.values.get(metric).copied())
    }
}

struct Harness {
    store: Arc<PanelStore>,
    clock: Arc<ManualClock>,
    lifecycle: Arc<IncidentLifecycle>,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn harness() -> Harness {
    harness_with(Arc::new(PanelStore::open_in_memory().unwrap()))
}

fn harness_with(store: Arc<PanelStore>) -> Harness {
    let clock = Arc::new(ManualClock::new(t0()));
    let lifecycle = Arc::new(IncidentLifecycle::new(
        store.clone(),
        clock.clone() as Arc<dyn Clock>,
    ));
    Harness {
        store,
        clock,
        lifecycle,
    }
}

fn evaluator(h: &Harness, source: MockSource) -> Evaluator {
    let dispatcher =
        Arc::new(NotificationDispatcher::new(None, std::time::Duration::from_secs(1)).unwrap());
    Evaluator::new(
        h.store.clone(),
        Arc::new(source),
        dispatcher,
        h.lifecycle.clone(),
        h.clock.clone() as Arc<dyn Clock>,
        std::time::Duration::from_secs(1),
    )
}

fn cpu_rule(id: &str, cooldown_minutes: i64) -> AlertRule {
    AlertRule {
        id: id.to_string(),
        user_id: "user-1".into(),
        server_id: None,
        metric: "cpu.usage".into(),
        op: CompareOp::Gt,
        threshold: 80.0,
        severity: Severity::Warning,
        enabled: true,
        cooldown_minutes,
        notify_webhook: false,
        webhook_url: None,
        notify_email: false,
        email_recipients: vec![],
        notify_slack: false,
        slack_webhook_url: None,
        last_triggered_at: None,
        created_at: t0(),
    }
}

#[tokio::test]
async fn strict_breach_raises_an_alert() {
    let h = harness();
    h.store.insert_rule(&cpu_rule("rule-1", 5)).unwrap();

    let report = evaluator(&h, MockSource::with_value("cpu.usage", 85.0))
        .evaluate_all()
        .await
        .unwrap();
    assert_eq!(report.evaluated(), 1);
    assert_eq!(report.triggered(), 1);
    assert_eq!(report.outcomes[0].rule_id, "rule-1");
    assert_eq!(report.outcomes[0].status, RuleStatus::Triggered);

    let alerts = h.store.list_alerts(&Default::default(), 10, 0).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].status, AlertStatus::Active);
    assert_eq!(alerts[0].severity, Severity::Warning);
    assert_eq!(alerts[0].metric_value, 85.0);
    assert_eq!(alerts[0].rule_id.as_deref(), Some("rule-1"));
}

#[tokio::test]
async fn value_at_threshold_does_not_trigger_gt() {
    let h = harness();
    h.store.insert_rule(&cpu_rule("rule-1", 5)).unwrap();

    let report = evaluator(&h, MockSource::with_value("cpu.usage", 80.0))
        .evaluate_all()
        .await
        .unwrap();
    assert_eq!(report.evaluated(), 1);
    assert_eq!(report.triggered(), 0);
    assert_eq!(report.outcomes[0].status, RuleStatus::Passed);
    assert!(h.store.list_alerts(&Default::default(), 10, 0).unwrap().is_empty());
}

#[tokio::test]
async fn cooldown_suppresses_until_the_window_passes() {
    let h = harness();
    h.store.insert_rule(&cpu_rule("rule-1", 5)).unwrap();
    let eval = evaluator(&h, MockSource::with_value("cpu.usage", 90.0));

    let report = eval.evaluate_all().await.unwrap();
    assert_eq!(report.triggered(), 1);

    // 3 minutes later: still cooling down.
    h.clock.advance(Duration::minutes(3));
    let report = eval.evaluate_all().await.unwrap();
    assert_eq!(report.triggered(), 0);
    assert_eq!(report.suppressed(), 1);

    // 6 minutes after the first trigger: window has passed.
    h.clock.advance(Duration::minutes(3));
    let report = eval.evaluate_all().await.unwrap();
    assert_eq!(report.triggered(), 1);

    let alerts = h.store.list_alerts(&Default::default(), 10, 0).unwrap();
    assert_eq!(alerts.len(), 2);
}

#[tokio::test]
async fn unknown_metric_is_skipped_without_blocking_others() {
    let h = harness();
    let mut unknown = cpu_rule("rule-unknown", 0);
    unknown.metric = "gpu.usage".into();
    h.store.insert_rule(&unknown).unwrap();
    h.store.insert_rule(&cpu_rule("rule-cpu", 0)).unwrap();

    let report = evaluator(&h, MockSource::with_value("cpu.usage", 99.0))
        .evaluate_all()
        .await
        .unwrap();
    assert_eq!(report.evaluated(), 2);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.triggered(), 1);
    let skipped = report
        .outcomes
        .iter()
        .find(|o| o.rule_id == "rule-unknown")
        .unwrap();
    assert!(matches!(
        &skipped.status,
        RuleStatus::Skipped(reason) if reason.contains("unknown")
    ));
}

#[tokio::test]
async fn unavailable_source_skips_all_rules_without_error() {
    let h = harness();
    h.store.insert_rule(&cpu_rule("rule-1", 0)).unwrap();

    let report = evaluator(&h, MockSource::unavailable())
        .evaluate_all()
        .await
        .unwrap();
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.triggered(), 0);
    assert!(matches!(
        &report.outcomes[0].status,
        RuleStatus::Skipped(reason) if reason.contains("unavailable")
    ));
    assert!(h.store.list_alerts(&Default::default(), 10, 0).unwrap().is_empty());
}

#[tokio::test]
async fn disabled_rules_are_not_evaluated() {
    let h = harness();
    let mut rule = cpu_rule("rule-1", 0);
    rule.enabled = false;
    h.store.insert_rule(&rule).unwrap();

    let report = evaluator(&h, MockSource::with_value("cpu.usage", 99.0))
        .evaluate_all()
        .await
        .unwrap();
    assert_eq!(report.evaluated(), 0);
}

#[tokio::test]
async fn unreadable_rule_row_does_not_block_the_pass() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("panel.db");
    let h = harness_with(Arc::new(PanelStore::open(&path).unwrap()));
    h.store.insert_rule(&cpu_rule("rule-good", 0)).unwrap();
    h.store.insert_rule(&cpu_rule("rule-bad", 0)).unwrap();

    // Damage one row behind the store's back.
    let raw = rusqlite::Connection::open(&path).unwrap();
    raw.execute("UPDATE alert_rules SET op = 'bogus' WHERE id = 'rule-bad'", [])
        .unwrap();
    drop(raw);

    let report = evaluator(&h, MockSource::with_value("cpu.usage", 99.0))
        .evaluate_all()
        .await
        .unwrap();
    assert_eq!(report.evaluated(), 1);
    assert_eq!(report.triggered(), 1);
    assert_eq!(report.outcomes[0].rule_id, "rule-good");

    let alerts = h.store.list_alerts(&Default::default(), 10, 0).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].rule_id.as_deref(), Some("rule-good"));
}

#[tokio::test]
async fn concurrent_passes_raise_one_alert() {
    let h = harness();
    h.store.insert_rule(&cpu_rule("rule-1", 5)).unwrap();
    let eval = evaluator(&h, MockSource::with_value("cpu.usage", 95.0));

    let (a, b) = tokio::join!(eval.evaluate_all(), eval.evaluate_all());
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.triggered() + b.triggered(), 1);
    assert_eq!(a.suppressed() + b.suppressed(), 1);

    let alerts = h.store.list_alerts(&Default::default(), 10, 0).unwrap();
    assert_eq!(alerts.len(), 1);
}

fn raise_one(h: &Harness) -> String {
    let rule = cpu_rule("rule-1", 0);
    h.store.insert_rule(&rule).unwrap();
    h.lifecycle.create_from_rule(&rule, 92.5).unwrap().id
}

#[test]
fn acknowledge_stamps_time_and_audits_once() {
    let h = harness();
    let id = raise_one(&h);

    h.clock.advance(Duration::minutes(2));
    let alert = h.lifecycle.acknowledge(&id, None).unwrap();
    assert_eq!(alert.status, AlertStatus::Acknowledged);
    assert!(alert.acknowledged_at.unwrap() >= alert.created_at);

    // A second acknowledge changes nothing and adds no history.
    h.clock.advance(Duration::minutes(1));
    let again = h.lifecycle.acknowledge(&id, None).unwrap();
    assert_eq!(again.acknowledged_at, alert.acknowledged_at);

    let acked: Vec<_> = h
        .lifecycle
        .history(&id)
        .unwrap()
        .into_iter()
        .filter(|e| e.action == "Acknowledged")
        .collect();
    assert_eq!(acked.len(), 1);
}

#[test]
fn acknowledge_after_resolve_is_invalid() {
    let h = harness();
    let id = raise_one(&h);
    h.lifecycle.resolve(&id, None).unwrap();

    assert!(matches!(
        h.lifecycle.acknowledge(&id, None),
        Err(EngineError::InvalidState(_))
    ));
}

#[test]
fn resolve_is_idempotent_and_direct_from_active() {
    let h = harness();
    let id = raise_one(&h);

    h.clock.advance(Duration::minutes(1));
    let alert = h.lifecycle.resolve(&id, None).unwrap();
    assert_eq!(alert.status, AlertStatus::Resolved);
    assert!(alert.acknowledged_at.is_none());
    let resolved_at = alert.resolved_at;

    h.clock.advance(Duration::minutes(5));
    let again = h.lifecycle.resolve(&id, None).unwrap();
    assert_eq!(again.resolved_at, resolved_at);
}

#[test]
fn soft_delete_resolves_and_keeps_the_record() {
    let h = harness();
    let id = raise_one(&h);

    let alert = h.lifecycle.soft_delete(&id).unwrap();
    assert_eq!(alert.status, AlertStatus::Resolved);

    // Row and history are still readable.
    let fetched = h.lifecycle.get(&id).unwrap();
    assert_eq!(fetched.id, id);
    let history = h.lifecycle.history(&id).unwrap();
    assert_eq!(history.last().unwrap().action, "Deleted");
}

#[test]
fn blank_comment_is_rejected() {
    let h = harness();
    let id = raise_one(&h);

    let blank = CommentInput {
        text: "   ".into(),
        comment_type: None,
        author: None,
    };
    assert!(matches!(
        h.lifecycle.add_comment(&id, blank.clone()),
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        h.lifecycle.acknowledge(&id, Some(blank)),
        Err(EngineError::Validation(_))
    ));
}

#[test]
fn comments_survive_transitions_in_order() {
    let h = harness();
    let id = raise_one(&h);

    h.lifecycle
        .acknowledge(
            &id,
            Some(CommentInput {
                text: "on it".into(),
                comment_type: None,
                author: Some("alice".into()),
            }),
        )
        .unwrap();
    h.clock.advance(Duration::minutes(1));
    h.lifecycle
        .resolve(
            &id,
            Some(CommentInput {
                text: "fixed by restart".into(),
                comment_type: Some("Resolution".into()),
                author: Some("alice".into()),
            }),
        )
        .unwrap();

    let comments = h.lifecycle.comments(&id).unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].text, "on it");
    assert_eq!(comments[0].comment_type, "General");
    assert_eq!(comments[1].comment_type, "Resolution");
}

#[test]
fn manual_alert_requires_a_title() {
    let h = harness();
    let mut input = ManualAlert {
        title: String::new(),
        message: "test".into(),
        severity: Severity::Info,
        metric: "manual".into(),
        metric_value: 0.0,
        server_id: None,
    };
    assert!(matches!(
        h.lifecycle.create_manual(&input),
        Err(EngineError::Validation(_))
    ));

    input.title = "Synthetic check".into();
    let alert = h.lifecycle.create_manual(&input).unwrap();
    assert!(alert.rule_id.is_none());
    assert_eq!(alert.status, AlertStatus::Active);
}

#[test]
fn missing_alert_is_not_found() {
    let h = harness();
    assert!(matches!(
        h.lifecycle.get("nope"),
        Err(EngineError::NotFound { .. })
    ));
    assert!(matches!(
        h.lifecycle.history("nope"),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn stats_count_by_status_and_severity() {
    let h = harness();

    let mut warning = cpu_rule("rule-w", 0);
    warning.severity = Severity::Warning;
    let mut critical = cpu_rule("rule-c", 0);
    critical.severity = Severity::Critical;

    let a1 = h.lifecycle.create_from_rule(&warning, 85.0).unwrap();
    let _a2 = h.lifecycle.create_from_rule(&critical, 99.0).unwrap();
    let _a3 = h.lifecycle.create_from_rule(&warning, 90.0).unwrap();
    h.lifecycle.resolve(&a1.id, None).unwrap();

    let stats = StatsAggregator::new(h.store.clone()).stats().unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.active, 2);
    assert_eq!(stats.resolved, 1);
    assert_eq!(stats.warning, 2);
    assert_eq!(stats.critical, 1);
}
