use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use hostwatch_common::types::{Alert, ChannelKind};
use lettre::message::header::ContentType;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// SMTP channel. Sends one plain-text message per recipient; the channel
/// fails only if no recipient could be reached.
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    recipients: Vec<String>,
}

impl EmailChannel {
    pub fn new(
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from: &str,
        recipients: Vec<String>,
    ) -> Self {
        Self {
            transport,
            from: from.to_string(),
            recipients,
        }
    }

    fn format_body(alert: &Alert) -> String {
        let server_line = match &alert.server_id {
            Some(server) => format!("\nServer: {server}"),
            None => String::new(),
        };
        format!(
            "Alert: {severity}{server_line}\nMetric: {metric}\nValue: {value:.2}\nMessage: {message}\nTime: {time}",
            severity = alert.severity,
            server_line = server_line,
            metric = alert.metric,
            value = alert.metric_value,
            message = alert.message,
            time = alert.created_at.to_rfc3339(),
        )
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let subject = format!("[hostwatch][{}] {}", alert.severity, alert.title);
        let body = Self::format_body(alert);

        let mut failures = Vec::new();
        let mut delivered = 0usize;

        for recipient in &self.recipients {
            let result: Result<()> = async {
                let email = Message::builder()
                    .from(self.from.parse()?)
                    .to(recipient.parse()?)
                    .subject(&subject)
                    .header(ContentType::TEXT_PLAIN)
                    .body(body.clone())?;
                self.transport.send(email).await?;
                Ok(())
            }
            .await;

            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(recipient = %recipient, error = %e, "Email send failed");
                    failures.push(format!("{recipient}: {e}"));
                }
            }
        }

        if delivered == 0 {
            anyhow::bail!(
                "all {} recipient(s) failed: {}",
                self.recipients.len(),
                failures.join("; ")
            );
        }
        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }
}
