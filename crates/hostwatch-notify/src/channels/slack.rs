use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use hostwatch_common::types::{Alert, ChannelKind};

/// Slack incoming-webhook channel. Sends a single text message in the
/// shape Slack's webhook endpoint expects.
pub struct SlackChannel {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackChannel {
    pub fn new(client: reqwest::Client, webhook_url: &str) -> Self {
        Self {
            client,
            webhook_url: webhook_url.to_string(),
        }
    }

    fn format_text(alert: &Alert) -> String {
        format!(
            ":rotating_light: *[{severity}] {title}*\n{message}\nMetric: `{metric}` = {value:.2}\nTime: {time}",
            severity = alert.severity,
            title = alert.title,
            message = alert.message,
            metric = alert.metric,
            value = alert.metric_value,
            time = alert.created_at.to_rfc3339(),
        )
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let payload = serde_json::json!({ "text": Self::format_text(alert) });
        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let resp_body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Slack webhook returned HTTP {status}: {resp_body}");
        }
        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Slack
    }
}
