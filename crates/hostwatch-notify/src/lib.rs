//! Notification fan-out for raised alerts.
//!
//! Each alert rule selects up to one instance of every channel kind
//! (webhook, email, Slack). The dispatcher sends through all of them
//! concurrently and reports a per-channel outcome; a failure or timeout
//! on one channel never prevents delivery on the others.

pub mod channels;
pub mod dispatcher;
pub mod error;

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use hostwatch_common::types::{Alert, ChannelKind};

pub use dispatcher::{NotificationDispatcher, SmtpSettings};
pub use error::NotifyError;

/// A delivery channel that pushes one alert to an external service.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers the alert through this channel. One attempt; the
    /// dispatcher bounds it with a timeout.
    async fn send(&self, alert: &Alert) -> Result<()>;

    fn kind(&self) -> ChannelKind;
}

/// Outcome of one channel within a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    /// Delivery was attempted and failed (or timed out).
    Failed(String),
    /// The channel was enabled on the rule but not attempted, e.g. a
    /// blank target or missing SMTP configuration.
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct ChannelOutcome {
    pub kind: ChannelKind,
    pub status: DeliveryStatus,
}

/// Per-channel results of one dispatch.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchReport {
    pub fn sent(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == DeliveryStatus::Sent)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DeliveryStatus::Failed(_)))
            .count()
    }
}
