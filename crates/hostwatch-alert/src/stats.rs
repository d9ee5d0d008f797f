use crate::error::Result;
use hostwatch_common::types::AlertStats;
use hostwatch_storage::PanelStore;
use std::sync::Arc;

/// Read-only summary counts over the alert table.
pub struct StatsAggregator {
    store: Arc<PanelStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<PanelStore>) -> Self {
        Self { store }
    }

    /// Counts by status and by severity, consistent with one point in
    /// time (single grouped query).
    pub fn stats(&self) -> Result<AlertStats> {
        Ok(self.store.alert_stats()?)
    }
}
