use crate::domain::{next_daily_run, BacklogScheduler, SweepOutcome};
use chrono::Utc;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub type WorkerProcess =
    Box<dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

#[derive(Debug, Clone)]
pub struct BacklogWorkerConfig {
    pub reprocess_interval: Duration,
    pub retention_sweep_hour_utc: u32,
}

impl Default for BacklogWorkerConfig {
    fn default() -> Self {
        Self {
            reprocess_interval: Duration::from_secs(5),
            retention_sweep_hour_utc: 3,
        }
    }
}

/// Timer loops driving the backlog sweeps
pub struct BacklogWorker {
    scheduler: Arc<BacklogScheduler>,
    config: BacklogWorkerConfig,
}

impl BacklogWorker {
    pub fn new(scheduler: Arc<BacklogScheduler>, config: BacklogWorkerConfig) -> Self {
        info!(
            reprocess_interval_secs = config.reprocess_interval.as_secs(),
            retention_sweep_hour_utc = config.retention_sweep_hour_utc,
            "Initializing backlog worker"
        );
        Self { scheduler, config }
    }

    pub fn into_runner_processes(self) -> Vec<WorkerProcess> {
        vec![
            // Reprocessing loop
            Box::new({
                let scheduler = Arc::clone(&self.scheduler);
                let interval = self.config.reprocess_interval;
                move |ctx| Box::pin(async move { run_reprocess_loop(scheduler, interval, ctx).await })
            }),
            // Daily retention loop
            Box::new({
                let scheduler = self.scheduler;
                let hour = self.config.retention_sweep_hour_utc;
                move |ctx| Box::pin(async move { run_retention_loop(scheduler, hour, ctx).await })
            }),
        ]
    }
}

async fn run_reprocess_loop(
    scheduler: Arc<BacklogScheduler>,
    interval: Duration,
    ctx: CancellationToken,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ctx.cancelled() => {
                info!("backlog reprocessing loop stopping");
                break;
            }
            _ = ticker.tick() => {
                match scheduler.reprocess_sweep().await {
                    Ok(SweepOutcome::Completed(report)) if report.fetched > 0 => {
                        debug!(fetched = report.fetched, marked = report.marked, "reprocessing sweep completed");
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "reprocessing sweep failed"),
                }
            }
        }
    }

    Ok(())
}

async fn run_retention_loop(
    scheduler: Arc<BacklogScheduler>,
    hour_utc: u32,
    ctx: CancellationToken,
) -> anyhow::Result<()> {
    loop {
        let now = Utc::now();
        let next_run = next_daily_run(now, hour_utc);
        let wait = (next_run - now).to_std().unwrap_or(Duration::ZERO);
        debug!(next_run = %next_run, "retention sweep scheduled");

        tokio::select! {
            _ = ctx.cancelled() => {
                info!("retention loop stopping");
                break;
            }
            _ = tokio::time::sleep(wait) => {
                if let Err(e) = scheduler.retention_sweep(Utc::now()).await {
                    error!(error = %e, "retention sweep failed");
                }
            }
        }
    }

    Ok(())
}
