//! Desired-schedule loading with retry, timeouts, and per-field degradation.

use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::config::{RetryConfig, SchedulerConfig};
use super::error::{SchedulerError, SchedulerResult};
use super::model::{JobRow, ScheduledJobSpec};
use super::store::{JobStore, StoreError};

/// Assembles and caches the desired schedule from the [`JobStore`] port.
///
/// The cached view is the engine's source of truth between store reads. A
/// failed interval or cron read degrades that half of the job to absent
/// rather than failing the job; a failed or timed-out aggregate load degrades
/// to an empty schedule until the next trigger.
pub struct CompositeJobSource {
    store: Arc<dyn JobStore>,
    config: SchedulerConfig,
    jobs: RwLock<Vec<ScheduledJobSpec>>,
    initialized: AtomicBool,
}

impl CompositeJobSource {
    pub fn new(store: Arc<dyn JobStore>, config: SchedulerConfig) -> Self {
        Self {
            store,
            config,
            jobs: RwLock::new(Vec::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Load the full desired schedule, replacing the cached view.
    ///
    /// Bounded by `load_timeout_secs` end to end. Only a not-ready store is
    /// retried; any other failure short-circuits to an empty schedule.
    /// Returns the number of jobs loaded.
    pub async fn load(&self) -> usize {
        info!("loading desired schedule");
        let deadline = Duration::from_secs(self.config.load_timeout_secs);

        let loaded = match tokio::time::timeout(deadline, self.load_with_retry()).await {
            Ok(Ok(specs)) => specs,
            Ok(Err(error)) => {
                error!(%error, "desired schedule load failed, continuing with no jobs");
                Vec::new()
            }
            Err(_) => {
                error!(
                    timeout_secs = self.config.load_timeout_secs,
                    "desired schedule load timed out, continuing with no jobs"
                );
                Vec::new()
            }
        };

        let count = loaded.len();
        *self.jobs.write().await = loaded;
        self.initialized.store(true, Ordering::Release);
        info!(jobs = count, "desired schedule loaded");
        count
    }

    async fn load_with_retry(&self) -> SchedulerResult<Vec<ScheduledJobSpec>> {
        let retry = &self.config.retry;
        let mut attempt: u32 = 1;
        loop {
            match self.load_all().await {
                Ok(specs) => return Ok(specs),
                Err(StoreError::NotReady) if attempt < retry.max_attempts => {
                    let delay = backoff_delay(attempt, retry);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "job store not ready, retrying load"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    async fn load_all(&self) -> Result<Vec<ScheduledJobSpec>, StoreError> {
        let rows = self.store.list_jobs().await?;
        let mut specs = Vec::with_capacity(rows.len());
        for row in rows {
            specs.push(self.assemble(row).await);
        }
        Ok(specs)
    }

    /// Build one job's spec from its rows. Each half is bounded by the
    /// per-job timeout and degrades to absent/empty on failure.
    async fn assemble(&self, row: JobRow) -> ScheduledJobSpec {
        let per_job = Duration::from_secs(self.config.per_job_timeout_secs);

        let (interval, crons) = tokio::join!(
            tokio::time::timeout(per_job, self.store.find_interval(row.id)),
            tokio::time::timeout(per_job, self.store.find_crons(row.id)),
        );

        let interval = match interval {
            Ok(Ok(found)) => found,
            Ok(Err(error)) => {
                error!(job = %row.name, %error, "interval load failed, treating as absent");
                None
            }
            Err(_) => {
                error!(job = %row.name, "interval load timed out, treating as absent");
                None
            }
        };

        let crons = match crons {
            Ok(Ok(found)) => found,
            Ok(Err(error)) => {
                error!(job = %row.name, %error, "cron load failed, treating as empty");
                Vec::new()
            }
            Err(_) => {
                error!(job = %row.name, "cron load timed out, treating as empty");
                Vec::new()
            }
        };

        ScheduledJobSpec::from_parts(row, interval, crons)
    }

    /// Merge a freshly added job into the cached view.
    ///
    /// Notifications are delivered at-least-once, so a job already present
    /// is replaced rather than appended; the view never holds two specs for
    /// the same id.
    pub async fn on_job_added(&self, row: JobRow) {
        let bound = Duration::from_secs(self.config.event_timeout_secs);
        match tokio::time::timeout(bound, self.assemble(row)).await {
            Ok(spec) => {
                let mut jobs = self.jobs.write().await;
                if let Some(existing) = jobs.iter_mut().find(|job| job.id == spec.id) {
                    info!(job = %spec.name, "added job was already in the desired schedule, replacing it");
                    *existing = spec;
                } else {
                    info!(job = %spec.name, "adding job to the desired schedule");
                    jobs.push(spec);
                }
            }
            Err(_) => error!("handling of job-added event timed out"),
        }
    }

    /// Re-resolve a modified job and replace it in the cached view.
    ///
    /// Replaces every entry carrying the job's id, so a duplicate left by
    /// redelivered notifications can never shadow the fresh spec.
    pub async fn on_job_modified(&self, row: JobRow) {
        let bound = Duration::from_secs(self.config.event_timeout_secs);
        match tokio::time::timeout(bound, self.assemble(row)).await {
            Ok(spec) => {
                let mut jobs = self.jobs.write().await;
                let mut replaced = 0;
                for existing in jobs.iter_mut().filter(|job| job.id == spec.id) {
                    *existing = spec.clone();
                    replaced += 1;
                }
                if replaced > 0 {
                    info!(job = %spec.name, "re-adding job to the desired schedule after modification");
                } else {
                    warn!(job = %spec.name, "modified job was not in the desired schedule, adding it");
                    jobs.push(spec);
                }
            }
            Err(_) => error!("handling of job-modified event timed out"),
        }
    }

    /// Drop a removed job from the cached view.
    pub async fn on_job_removed(&self, job_id: i64) {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|job| job.id != job_id);
        if jobs.len() < before {
            info!(job_id, "job removed from the desired schedule");
        } else {
            warn!(job_id, "job to remove was not in the desired schedule");
        }
    }

    /// Snapshot of the cached desired schedule.
    pub async fn scheduled_jobs(&self) -> SchedulerResult<Vec<ScheduledJobSpec>> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(SchedulerError::NotInitialized);
        }
        Ok(self.jobs.read().await.clone())
    }
}

/// Exponential backoff with jitter spread around the capped delay.
fn backoff_delay(attempt: u32, retry: &RetryConfig) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let base = retry
        .initial_backoff_ms
        .saturating_mul(1u64 << exponent)
        .min(retry.max_backoff_ms);

    let spread = (base as f64 * retry.jitter.clamp(0.0, 1.0)).round() as u64;
    let delay_ms = if spread == 0 {
        base
    } else {
        base.saturating_sub(spread / 2) + rand::thread_rng().gen_range(0..=spread)
    };

    Duration::from_millis(delay_ms)
}
