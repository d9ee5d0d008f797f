use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use hostwatch_common::types::Severity;
///
/// let sev: Severity = "warning".parse().unwrap();
/// assert_eq!(sev, Severity::Warning);
/// assert_eq!(sev.to_string(), "warning");
/// assert!(Severity::Critical > Severity::Info);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Absolute tolerance used by [`CompareOp::Eq`] and [`CompareOp::Ne`].
///
/// Metric values in this system are percentages, counts, and byte figures;
/// a fixed absolute epsilon is sufficient and keeps the contract simple.
pub const FLOAT_EQ_EPSILON: f64 = 1e-6;

/// Comparison operator applied to (observed value, rule threshold).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Gt,
    Lt,
    Eq,
    Ne,
    Gte,
    Lte,
}

impl CompareOp {
    /// Evaluates the operator against an observed value and threshold.
    ///
    /// `Eq`/`Ne` compare within [`FLOAT_EQ_EPSILON`].
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Eq => (value - threshold).abs() <= FLOAT_EQ_EPSILON,
            Self::Ne => (value - threshold).abs() > FLOAT_EQ_EPSILON,
            Self::Gte => value >= threshold,
            Self::Lte => value <= threshold,
        }
    }

    /// Human-readable phrasing for alert messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Gt => "above",
            Self::Lt => "below",
            Self::Eq => "equal to",
            Self::Ne => "different from",
            Self::Gte => "at or above",
            Self::Lte => "at or below",
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gt => write!(f, "gt"),
            Self::Lt => write!(f, "lt"),
            Self::Eq => write!(f, "eq"),
            Self::Ne => write!(f, "ne"),
            Self::Gte => write!(f, "gte"),
            Self::Lte => write!(f, "lte"),
        }
    }
}

impl std::str::FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gt" | "greater_than" => Ok(Self::Gt),
            "lt" | "less_than" => Ok(Self::Lt),
            "eq" | "equal" => Ok(Self::Eq),
            "ne" | "not_equal" => Ok(Self::Ne),
            "gte" | "greater_equal" => Ok(Self::Gte),
            "lte" | "less_equal" => Ok(Self::Lte),
            _ => Err(format!("unknown compare operator: {s}")),
        }
    }
}

/// Lifecycle state of a raised alert.
///
/// `Active` is the initial state; `Resolved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Active => write!(f, "active"),
            AlertStatus::Acknowledged => write!(f, "acknowledged"),
            AlertStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(AlertStatus::Active),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            "resolved" => Ok(AlertStatus::Resolved),
            _ => Err(format!("unknown alert status: {s}")),
        }
    }
}

/// A notification transport configured per rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Webhook,
    Email,
    Slack,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Webhook => write!(f, "webhook"),
            ChannelKind::Email => write!(f, "email"),
            ChannelKind::Slack => write!(f, "slack"),
        }
    }
}

/// A standing threshold policy a user defines over a metric.
///
/// Rules are owned by the API layer through the rule store; the evaluator
/// only reads them, except for `last_triggered_at` which it updates through
/// the atomic cooldown claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Scoping server; `None` means the rule is evaluated against a
    /// global/aggregate metric.
    pub server_id: Option<String>,
    /// Metric key understood by the metric source (e.g. `"cpu.usage"`).
    pub metric: String,
    pub op: CompareOp,
    pub threshold: f64,
    pub severity: Severity,
    pub enabled: bool,
    /// Minimum minutes between two alerts raised by this rule.
    pub cooldown_minutes: i64,
    pub notify_webhook: bool,
    pub webhook_url: Option<String>,
    pub notify_email: bool,
    pub email_recipients: Vec<String>,
    pub notify_slack: bool,
    pub slack_webhook_url: Option<String>,
    /// Mutated only by the evaluator's cooldown claim.
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AlertRule {
    /// Channels enabled on this rule, regardless of whether their targets
    /// are usable. Blank targets make the channel dispatch-inert, not an
    /// error; that filtering happens at dispatch time.
    pub fn enabled_channels(&self) -> Vec<ChannelKind> {
        let mut kinds = Vec::new();
        if self.notify_webhook {
            kinds.push(ChannelKind::Webhook);
        }
        if self.notify_email {
            kinds.push(ChannelKind::Email);
        }
        if self.notify_slack {
            kinds.push(ChannelKind::Slack);
        }
        kinds
    }
}

/// One raised incident, produced by a rule firing at one point in time
/// (or created manually for test/synthetic purposes, with `rule_id = None`).
///
/// Severity and metric name are copied from the rule at trigger time; later
/// rule edits never retroactively change existing alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub rule_id: Option<String>,
    pub server_id: Option<String>,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub metric: String,
    /// Observed value at trigger time.
    pub metric_value: f64,
    /// Opaque diagnostic payload (e.g. serialized key/value context).
    pub context: Option<String>,
    pub status: AlertStatus,
    /// Set iff the transition through `Acknowledged` occurred.
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Set iff `status == Resolved`.
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Immutable audit record appended on every alert state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertHistoryEntry {
    pub id: String,
    pub alert_id: String,
    /// Action label: "Created", "Acknowledged", "Resolved", "Deleted".
    pub action: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Immutable user annotation on an alert. Comments never transition alert
/// state by themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertComment {
    pub id: String,
    pub alert_id: String,
    pub text: String,
    /// Free-form tag, defaults to "General".
    pub comment_type: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Default comment type tag.
pub const DEFAULT_COMMENT_TYPE: &str = "General";

/// Summary counts derived from current alert rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStats {
    pub total: u64,
    pub active: u64,
    pub acknowledged: u64,
    pub resolved: u64,
    pub info: u64,
    pub warning: u64,
    pub error: u64,
    pub critical: u64,
}
