use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Seconds between evaluation passes.
    #[serde(default = "default_evaluate_interval_secs")]
    pub evaluate_interval_secs: u64,
    /// Upper bound on one metric fetch.
    #[serde(default = "default_metric_fetch_timeout_secs")]
    pub metric_fetch_timeout_secs: u64,
    /// Upper bound on one notification channel send.
    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: u64,

    #[serde(default)]
    pub smtp: Option<SmtpConfig>,

    /// Rules inserted on first start, when the rule table is empty.
    #[serde(default)]
    pub rules: Vec<SeedRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRule {
    #[serde(default = "default_seed_user")]
    pub user_id: String,
    #[serde(default)]
    pub server_id: Option<String>,
    pub metric: String,
    #[serde(default = "default_seed_op")]
    pub op: String,
    pub threshold: f64,
    #[serde(default = "default_seed_severity")]
    pub severity: String,
    #[serde(default = "default_seed_enabled")]
    pub enabled: bool,
    #[serde(default = "default_seed_cooldown")]
    pub cooldown_minutes: i64,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub email_recipients: Vec<String>,
    #[serde(default)]
    pub slack_webhook_url: Option<String>,
}

fn default_db_path() -> String {
    "data/hostwatch.db".to_string()
}

fn default_evaluate_interval_secs() -> u64 {
    60
}

fn default_metric_fetch_timeout_secs() -> u64 {
    10
}

fn default_notify_timeout_secs() -> u64 {
    15
}

fn default_smtp_port() -> u16 {
    587
}

fn default_seed_user() -> String {
    "admin".to_string()
}

fn default_seed_op() -> String {
    "gt".to_string()
}

fn default_seed_severity() -> String {
    "warning".to_string()
}

fn default_seed_enabled() -> bool {
    true
}

fn default_seed_cooldown() -> i64 {
    5
}

/// Loads the TOML config at `path`. A missing file yields the defaults.
pub fn load(path: &Path) -> Result<ServerConfig> {
    let raw = if path.exists() {
        std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?
    } else {
        tracing::warn!(path = %path.display(), "Config file not found, using defaults");
        String::new()
    };
    toml::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
}
