use hostwatch_alert::Evaluator;
use std::sync::Arc;
use tokio::time::{interval, Duration};

/// Periodically runs the evaluator. One pass failing is logged and the
/// loop keeps ticking.
pub struct EvaluationScheduler {
    evaluator: Arc<Evaluator>,
    interval_secs: u64,
}

impl EvaluationScheduler {
    pub fn new(evaluator: Arc<Evaluator>, interval_secs: u64) -> Self {
        Self {
            evaluator,
            interval_secs,
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            interval_secs = self.interval_secs,
            "Evaluation scheduler started"
        );

        let mut tick = interval(Duration::from_secs(self.interval_secs.max(1)));
        loop {
            tick.tick().await;
            match self.evaluator.evaluate_all().await {
                Ok(report) => {
                    if report.triggered() > 0 || report.suppressed() > 0 || report.failed() > 0 {
                        tracing::info!(
                            evaluated = report.evaluated(),
                            triggered = report.triggered(),
                            suppressed = report.suppressed(),
                            skipped = report.skipped(),
                            failed = report.failed(),
                            "Evaluation pass raised alerts"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Evaluation pass failed");
                }
            }
        }
    }
}
