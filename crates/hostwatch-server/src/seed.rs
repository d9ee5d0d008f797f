use crate::config::SeedRule;
use anyhow::{Context, Result};
use chrono::Utc;
use hostwatch_common::id;
use hostwatch_common::types::AlertRule;
use hostwatch_storage::{PanelStore, RuleFilter};

/// Inserts the configured seed rules, but only into an empty rule table
/// so a restart never duplicates or overwrites user edits.
pub fn seed_rules(store: &PanelStore, seeds: &[SeedRule]) -> Result<usize> {
    if seeds.is_empty() {
        return Ok(0);
    }
    if !store.list_rules(&RuleFilter::default(), 1, 0)?.is_empty() {
        tracing::debug!("Rule table not empty, skipping seed rules");
        return Ok(0);
    }

    let mut inserted = 0usize;
    for seed in seeds {
        let rule = AlertRule {
            id: id::next_id(),
            user_id: seed.user_id.clone(),
            server_id: seed.server_id.clone(),
            metric: seed.metric.clone(),
            op: seed
                .op
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("seed rule for {}", seed.metric))?,
            threshold: seed.threshold,
            severity: seed
                .severity
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("seed rule for {}", seed.metric))?,
            enabled: seed.enabled,
            cooldown_minutes: seed.cooldown_minutes,
            notify_webhook: seed.webhook_url.is_some(),
            webhook_url: seed.webhook_url.clone(),
            notify_email: !seed.email_recipients.is_empty(),
            email_recipients: seed.email_recipients.clone(),
            notify_slack: seed.slack_webhook_url.is_some(),
            slack_webhook_url: seed.slack_webhook_url.clone(),
            last_triggered_at: None,
            created_at: Utc::now(),
        };
        store.insert_rule(&rule)?;
        tracing::info!(rule_id = %rule.id, metric = %rule.metric, "Seeded alert rule");
        inserted += 1;
    }
    Ok(inserted)
}
