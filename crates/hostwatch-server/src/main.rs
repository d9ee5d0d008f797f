use anyhow::Result;
use hostwatch_alert::{Evaluator, IncidentLifecycle};
use hostwatch_common::clock::{Clock, SystemClock};
use hostwatch_notify::{NotificationDispatcher, SmtpSettings};
use hostwatch_storage::PanelStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use hostwatch_server::config;
use hostwatch_server::metrics::SystemMetricSource;
use hostwatch_server::scheduler::EvaluationScheduler;
use hostwatch_server::seed;

#[tokio::main]
async fn main() -> Result<()> {
    hostwatch_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hostwatch=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "hostwatch.toml".to_string());
    let config = config::load(Path::new(&config_path))?;

    let store = Arc::new(PanelStore::open(Path::new(&config.db_path))?);
    let seeded = seed::seed_rules(&store, &config.rules)?;
    if seeded > 0 {
        tracing::info!(count = seeded, "Seeded alert rules from config");
    }

    let smtp = config.smtp.as_ref().map(|smtp| SmtpSettings {
        host: smtp.host.clone(),
        port: smtp.port,
        username: smtp.username.clone(),
        password: smtp.password.clone(),
        from: smtp.from.clone(),
    });
    let dispatcher = Arc::new(NotificationDispatcher::new(
        smtp.as_ref(),
        Duration::from_secs(config.notify_timeout_secs),
    )?);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let lifecycle = Arc::new(IncidentLifecycle::new(store.clone(), clock.clone()));
    let evaluator = Arc::new(Evaluator::new(
        store,
        Arc::new(SystemMetricSource::new()),
        dispatcher,
        lifecycle,
        clock,
        Duration::from_secs(config.metric_fetch_timeout_secs),
    ));

    let scheduler = EvaluationScheduler::new(evaluator, config.evaluate_interval_secs);
    tokio::spawn(async move { scheduler.run().await });

    tracing::info!("hostwatch server started");
    signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    Ok(())
}
