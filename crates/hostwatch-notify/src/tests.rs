use crate::dispatcher::NotificationDispatcher;
use crate::{ChannelOutcome, DeliveryStatus, DispatchReport, NotificationChannel};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use hostwatch_common::types::{Alert, AlertRule, AlertStatus, ChannelKind, CompareOp, Severity};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct MockChannel {
    kind: ChannelKind,
    fail: bool,
    delay: Option<Duration>,
    sent: Arc<AtomicUsize>,
}

impl MockChannel {
    fn boxed(kind: ChannelKind, fail: bool, sent: Arc<AtomicUsize>) -> Box<dyn NotificationChannel> {
        Box::new(Self {
            kind,
            fail,
            delay: None,
            sent,
        })
    }

    fn slow(kind: ChannelKind, delay: Duration, sent: Arc<AtomicUsize>) -> Box<dyn NotificationChannel> {
        Box::new(Self {
            kind,
            fail: false,
            delay: Some(delay),
            sent,
        })
    }
}

#[async_trait]
impl NotificationChannel for MockChannel {
    async fn send(&self, _alert: &Alert) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            anyhow::bail!("connection refused");
        }
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        self.kind
    }
}

fn sample_alert() -> Alert {
    Alert {
        id: "alert-1".into(),
        rule_id: Some("rule-1".into()),
        server_id: Some("srv-1".into()),
        title: "CPU usage high".into(),
        message: "cpu.usage is 92.5, above threshold 80".into(),
        severity: Severity::Warning,
        metric: "cpu.usage".into(),
        metric_value: 92.5,
        context: None,
        status: AlertStatus::Active,
        acknowledged_at: None,
        resolved_at: None,
        created_at: Utc::now(),
    }
}

fn sample_rule() -> AlertRule {
    AlertRule {
        id: "rule-1".into(),
        user_id: "user-1".into(),
        server_id: Some("srv-1".into()),
        metric: "cpu.usage".into(),
        op: CompareOp::Gt,
        threshold: 80.0,
        severity: Severity::Warning,
        enabled: true,
        cooldown_minutes: 5,
        notify_webhook: false,
        webhook_url: None,
        notify_email: false,
        email_recipients: vec![],
        notify_slack: false,
        slack_webhook_url: None,
        last_triggered_at: None,
        created_at: Utc::now(),
    }
}

fn status_of(outcomes: &[ChannelOutcome], kind: ChannelKind) -> &DeliveryStatus {
    &outcomes
        .iter()
        .find(|o| o.kind == kind)
        .expect("missing channel outcome")
        .status
}

#[tokio::test]
async fn failing_channel_does_not_block_others() {
    let dispatcher = NotificationDispatcher::new(None, Duration::from_secs(5)).unwrap();
    let sent = Arc::new(AtomicUsize::new(0));

    let channels = vec![
        MockChannel::boxed(ChannelKind::Webhook, true, sent.clone()),
        MockChannel::boxed(ChannelKind::Email, false, sent.clone()),
        MockChannel::boxed(ChannelKind::Slack, false, sent.clone()),
    ];
    let outcomes = dispatcher.run_channels(&sample_alert(), channels).await;

    assert_eq!(sent.load(Ordering::SeqCst), 2);
    assert!(matches!(
        status_of(&outcomes, ChannelKind::Webhook),
        DeliveryStatus::Failed(reason) if reason.contains("connection refused")
    ));
    assert_eq!(*status_of(&outcomes, ChannelKind::Email), DeliveryStatus::Sent);
    assert_eq!(*status_of(&outcomes, ChannelKind::Slack), DeliveryStatus::Sent);
}

#[tokio::test]
async fn slow_channel_is_bounded_by_timeout() {
    let dispatcher = NotificationDispatcher::new(None, Duration::from_millis(50)).unwrap();
    let sent = Arc::new(AtomicUsize::new(0));

    let channels = vec![
        MockChannel::slow(ChannelKind::Webhook, Duration::from_secs(10), sent.clone()),
        MockChannel::boxed(ChannelKind::Email, false, sent.clone()),
    ];
    let outcomes = dispatcher.run_channels(&sample_alert(), channels).await;

    assert!(matches!(
        status_of(&outcomes, ChannelKind::Webhook),
        DeliveryStatus::Failed(reason) if reason.contains("timed out")
    ));
    assert_eq!(*status_of(&outcomes, ChannelKind::Email), DeliveryStatus::Sent);
    assert_eq!(sent.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn blank_targets_are_skipped_not_failed() {
    let dispatcher = NotificationDispatcher::new(None, Duration::from_secs(5)).unwrap();
    let mut rule = sample_rule();
    rule.notify_webhook = true;
    rule.webhook_url = Some("   ".into());
    rule.notify_email = true; // enabled, but no SMTP configured
    rule.email_recipients = vec!["ops@example.com".into()];
    rule.notify_slack = true;
    rule.slack_webhook_url = None;

    let report = dispatcher.dispatch(&sample_alert(), &rule).await;
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.sent(), 0);
    assert_eq!(report.failed(), 0);
    for outcome in &report.outcomes {
        assert!(matches!(outcome.status, DeliveryStatus::Skipped(_)));
    }
}

#[tokio::test]
async fn rule_with_no_channels_yields_empty_report() {
    let dispatcher = NotificationDispatcher::new(None, Duration::from_secs(5)).unwrap();
    let report = dispatcher.dispatch(&sample_alert(), &sample_rule()).await;
    assert!(report.outcomes.is_empty());
}

#[test]
fn report_counts_sent_and_failed() {
    let report = DispatchReport {
        outcomes: vec![
            ChannelOutcome {
                kind: ChannelKind::Webhook,
                status: DeliveryStatus::Failed("HTTP 500".into()),
            },
            ChannelOutcome {
                kind: ChannelKind::Email,
                status: DeliveryStatus::Sent,
            },
            ChannelOutcome {
                kind: ChannelKind::Slack,
                status: DeliveryStatus::Skipped("no URL".into()),
            },
        ],
    };
    assert_eq!(report.sent(), 1);
    assert_eq!(report.failed(), 1);
}
