use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use hostwatch_common::types::{Alert, ChannelKind};

/// Generic JSON webhook. Posts the full alert payload to a user-supplied
/// URL and treats any non-2xx response as a failure.
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }

    fn render_body(alert: &Alert) -> String {
        serde_json::json!({
            "alert_id": alert.id,
            "rule_id": alert.rule_id,
            "server_id": alert.server_id,
            "title": alert.title,
            "message": alert.message,
            "severity": alert.severity.to_string(),
            "metric": alert.metric,
            "value": alert.metric_value,
            "status": alert.status.to_string(),
            "timestamp": alert.created_at.to_rfc3339(),
        })
        .to_string()
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let body = Self::render_body(alert);
        let resp = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let resp_body = resp.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {status}: {resp_body}");
        }
        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }
}
