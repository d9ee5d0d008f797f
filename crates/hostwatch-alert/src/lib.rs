//! Rule evaluation engine and alert lifecycle.
//!
//! The evaluator runs every enabled rule against the current metric
//! value, gates each breach through the rule's cooldown claim, and hands
//! newly raised alerts to the notification dispatcher. Lifecycle
//! transitions (acknowledge, resolve, soft delete, comments) go through
//! [`IncidentLifecycle`], which is the only write path for alert state.

pub mod error;
pub mod evaluator;
pub mod lifecycle;
pub mod stats;

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;

pub use error::EngineError;
pub use evaluator::{EvaluationReport, Evaluator, RuleOutcome, RuleStatus};
pub use lifecycle::{CommentInput, IncidentLifecycle, ManualAlert};
pub use stats::StatsAggregator;

/// Provider of current metric values.
///
/// `Ok(None)` means the metric key is unknown to this source; `Err`
/// means the source is temporarily unavailable. The evaluator treats
/// both as a soft skip of the rule, never as a raised alert.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn get_value(&self, metric: &str, server_id: Option<&str>) -> Result<Option<f64>>;
}
