use crate::channels::{EmailChannel, SlackChannel, WebhookChannel};
use crate::error::NotifyError;
use crate::{ChannelOutcome, DeliveryStatus, DispatchReport, NotificationChannel};
use hostwatch_common::types::{Alert, AlertRule, ChannelKind};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, Tokio1Executor};
use std::time::Duration;

/// SMTP relay settings for the email channel.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

/// Fans one alert out to every channel its rule enables.
///
/// Channels run concurrently and each is bounded by `send_timeout`; the
/// report carries one outcome per enabled channel, so a webhook failure
/// is visible without having blocked the email delivery.
pub struct NotificationDispatcher {
    http: reqwest::Client,
    mailer: Option<(AsyncSmtpTransport<Tokio1Executor>, String)>,
    send_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(smtp: Option<&SmtpSettings>, send_timeout: Duration) -> Result<Self, NotifyError> {
        let mailer = match smtp {
            Some(settings) => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                    .map_err(|e| NotifyError::Smtp(e.to_string()))?
                    .port(settings.port);
                if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
                    builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
                }
                Some((builder.build(), settings.from.clone()))
            }
            None => None,
        };
        Ok(Self {
            http: reqwest::Client::new(),
            mailer,
            send_timeout,
        })
    }

    /// Dispatches the alert through every channel enabled on the rule.
    pub async fn dispatch(&self, alert: &Alert, rule: &AlertRule) -> DispatchReport {
        let (channels, mut outcomes) = self.build_channels(rule);
        outcomes.extend(self.run_channels(alert, channels).await);
        for outcome in &outcomes {
            match &outcome.status {
                DeliveryStatus::Sent => {
                    tracing::info!(alert_id = %alert.id, channel = %outcome.kind, "Notification sent");
                }
                DeliveryStatus::Failed(reason) => {
                    tracing::warn!(alert_id = %alert.id, channel = %outcome.kind, reason = %reason, "Notification failed");
                }
                DeliveryStatus::Skipped(reason) => {
                    tracing::debug!(alert_id = %alert.id, channel = %outcome.kind, reason = %reason, "Notification skipped");
                }
            }
        }
        DispatchReport { outcomes }
    }

    /// Instantiates the channels a rule enables. Channels whose targets
    /// are unusable (blank URL, no recipients, SMTP not configured) come
    /// back as skip outcomes instead.
    fn build_channels(
        &self,
        rule: &AlertRule,
    ) -> (Vec<Box<dyn NotificationChannel>>, Vec<ChannelOutcome>) {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();
        let mut skipped = Vec::new();

        if rule.notify_webhook {
            match rule.webhook_url.as_deref().map(str::trim) {
                Some(url) if !url.is_empty() => {
                    channels.push(Box::new(WebhookChannel::new(self.http.clone(), url)));
                }
                _ => skipped.push(ChannelOutcome {
                    kind: ChannelKind::Webhook,
                    status: DeliveryStatus::Skipped("webhook URL not configured".into()),
                }),
            }
        }

        if rule.notify_email {
            let recipients: Vec<String> = rule
                .email_recipients
                .iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect();
            match (&self.mailer, recipients.is_empty()) {
                (Some((transport, from)), false) => {
                    channels.push(Box::new(EmailChannel::new(
                        transport.clone(),
                        from,
                        recipients,
                    )));
                }
                (None, _) => skipped.push(ChannelOutcome {
                    kind: ChannelKind::Email,
                    status: DeliveryStatus::Skipped("SMTP not configured".into()),
                }),
                (_, true) => skipped.push(ChannelOutcome {
                    kind: ChannelKind::Email,
                    status: DeliveryStatus::Skipped("no email recipients".into()),
                }),
            }
        }

        if rule.notify_slack {
            match rule.slack_webhook_url.as_deref().map(str::trim) {
                Some(url) if !url.is_empty() => {
                    channels.push(Box::new(SlackChannel::new(self.http.clone(), url)));
                }
                _ => skipped.push(ChannelOutcome {
                    kind: ChannelKind::Slack,
                    status: DeliveryStatus::Skipped("Slack webhook URL not configured".into()),
                }),
            }
        }

        (channels, skipped)
    }

    /// Runs the given channels concurrently, each bounded by the send
    /// timeout. Exposed to tests so mock channels can be injected.
    pub(crate) async fn run_channels(
        &self,
        alert: &Alert,
        channels: Vec<Box<dyn NotificationChannel>>,
    ) -> Vec<ChannelOutcome> {
        let sends = channels.iter().map(|channel| async {
            let kind = channel.kind();
            let status = match tokio::time::timeout(self.send_timeout, channel.send(alert)).await {
                Ok(Ok(())) => DeliveryStatus::Sent,
                Ok(Err(e)) => DeliveryStatus::Failed(e.to_string()),
                Err(_) => DeliveryStatus::Failed(format!(
                    "timed out after {:?}",
                    self.send_timeout
                )),
            };
            ChannelOutcome { kind, status }
        });
        futures::future::join_all(sends).await
    }
}
