use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info, warn};

use crate::error::TrackerError;
use crate::models::RefreshKind;
use crate::services::RefreshCoordinator;

/// Drives scheduled refreshes: one shortly after start-up, then on a fixed interval
pub struct RefreshScheduler {
    scheduler: Arc<RwLock<JobScheduler>>,
    coordinator: Arc<RefreshCoordinator>,
    interval: Duration,
    startup_delay: Duration,
}

impl RefreshScheduler {
    pub async fn new(
        coordinator: Arc<RefreshCoordinator>,
        interval: Duration,
        startup_delay: Duration,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create job scheduler: {}", e))?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            coordinator,
            interval,
            startup_delay,
        })
    }

    /// Start the refresh scheduler
    pub async fn start(&self) -> Result<()> {
        self.add_startup_job().await?;
        self.add_interval_job().await?;

        let scheduler = self.scheduler.read().await;
        scheduler
            .start()
            .await
            .map_err(|e| anyhow!("Failed to start job scheduler: {}", e))?;

        info!(
            "Refresh scheduler started: first refresh in {:?}, then every {:?}",
            self.startup_delay, self.interval
        );
        Ok(())
    }

    /// Stop the refresh scheduler
    pub async fn stop(&self) -> Result<()> {
        let mut scheduler = self.scheduler.write().await;
        scheduler
            .shutdown()
            .await
            .map_err(|e| anyhow!("Failed to stop job scheduler: {}", e))?;

        info!("Refresh scheduler stopped");
        Ok(())
    }

    async fn add_startup_job(&self) -> Result<()> {
        let coordinator = Arc::clone(&self.coordinator);
        let job = Job::new_one_shot_async(self.startup_delay, move |_uuid, _l| {
            let coordinator = Arc::clone(&coordinator);
            Box::pin(async move {
                run_scheduled_refresh(&coordinator, "startup").await;
            })
        })
        .map_err(|e| anyhow!("Failed to create startup refresh job: {}", e))?;

        let scheduler = self.scheduler.read().await;
        scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add startup refresh job: {}", e))?;
        Ok(())
    }

    async fn add_interval_job(&self) -> Result<()> {
        let coordinator = Arc::clone(&self.coordinator);
        let job = Job::new_repeated_async(self.interval, move |_uuid, _l| {
            let coordinator = Arc::clone(&coordinator);
            Box::pin(async move {
                run_scheduled_refresh(&coordinator, "interval").await;
            })
        })
        .map_err(|e| anyhow!("Failed to create interval refresh job: {}", e))?;

        let scheduler = self.scheduler.read().await;
        scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add interval refresh job: {}", e))?;
        Ok(())
    }
}

/// Failures are recorded on the coordinator; the scheduler only logs them
pub async fn run_scheduled_refresh(coordinator: &RefreshCoordinator, trigger: &str) {
    debug!("Running {} refresh", trigger);
    match coordinator.refresh(RefreshKind::Scheduled).await {
        Ok(stats) => debug!(
            "{} refresh complete: {} sessions, phase {}",
            trigger, stats.total_sessions, stats.current_phase
        ),
        Err(TrackerError::RefreshInProgress) => {
            debug!("{} refresh skipped, previous refresh still running", trigger)
        }
        Err(err) => warn!("{} refresh failed: {}", trigger, err),
    }
}
