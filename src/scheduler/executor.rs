//! Task-execution port: arming and cancelling cron and fixed-rate timers.

use async_trait::async_trait;
use std::time::Duration;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::error::{SchedulerError, SchedulerResult};
use super::scanner::JobHandler;

/// Handle to one armed timer.
///
/// Cancellation is cooperative: it prevents future firings but never
/// interrupts a firing already in progress.
#[async_trait]
pub trait TimerHandle: Send + Sync {
    async fn cancel(&self);
}

/// Port over the timer facility consumed by the reconciliation engine.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Arm a recurring timer driven by a cron expression.
    async fn schedule_cron(
        &self,
        job_name: &str,
        expression: &str,
        handler: JobHandler,
    ) -> SchedulerResult<Box<dyn TimerHandle>>;

    /// Arm a fixed-rate timer.
    async fn schedule_fixed_rate(
        &self,
        job_name: &str,
        period: Duration,
        handler: JobHandler,
    ) -> SchedulerResult<Box<dyn TimerHandle>>;
}

/// Timer facility backed by `tokio-cron-scheduler` for cron triggers and
/// plain `tokio::time::interval` loops for fixed-rate triggers.
///
/// Job bodies run fire-and-forget on the runtime; the engine never awaits
/// their completion.
pub struct TokioTaskExecutor {
    cron: JobScheduler,
}

impl TokioTaskExecutor {
    pub async fn start() -> SchedulerResult<Self> {
        let cron = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::StartupFailed(e.to_string()))?;
        cron.start()
            .await
            .map_err(|e| SchedulerError::StartupFailed(e.to_string()))?;
        Ok(Self { cron })
    }

    pub async fn shutdown(&self) -> SchedulerResult<()> {
        // JobScheduler is a cheap handle over shared state; shutting a clone
        // down stops the underlying scheduler.
        let mut cron = self.cron.clone();
        cron.shutdown()
            .await
            .map_err(|e| SchedulerError::ShutdownFailed(e.to_string()))
    }
}

#[async_trait]
impl TaskExecutor for TokioTaskExecutor {
    async fn schedule_cron(
        &self,
        job_name: &str,
        expression: &str,
        handler: JobHandler,
    ) -> SchedulerResult<Box<dyn TimerHandle>> {
        let name = job_name.to_string();
        let job = CronJob::new_async(expression, move |_uuid, _lock| {
            let handler = handler.clone();
            let name = name.clone();
            Box::pin(async move {
                fire(&name, handler).await;
            })
        })
        .map_err(|e| SchedulerError::InvalidCronExpression {
            expression: expression.to_string(),
            message: e.to_string(),
        })?;

        let id = self.cron.add(job).await?;
        debug!(job = job_name, cron = expression, timer_id = %id, "cron timer armed");

        Ok(Box::new(CronTimerHandle {
            cron: self.cron.clone(),
            id,
            job_name: job_name.to_string(),
        }))
    }

    async fn schedule_fixed_rate(
        &self,
        job_name: &str,
        period: Duration,
        handler: JobHandler,
    ) -> SchedulerResult<Box<dyn TimerHandle>> {
        let name = job_name.to_string();
        let ticker_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The immediate first tick; firing starts one period in.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let handler = handler.clone();
                let name = name.clone();
                // Fire-and-forget so cancelling the ticker never interrupts
                // a run already in progress.
                tokio::spawn(async move {
                    fire(&name, handler).await;
                });
            }
        });

        debug!(
            job = job_name,
            period_ms = period.as_millis() as u64,
            "fixed-rate timer armed"
        );

        Ok(Box::new(FixedTimerHandle { ticker_task }))
    }
}

async fn fire(job_name: &str, handler: JobHandler) {
    let started = std::time::Instant::now();
    match handler().await {
        Ok(()) => debug!(
            job = job_name,
            duration_ms = started.elapsed().as_millis() as u64,
            "job run finished"
        ),
        Err(error) => error!(
            job = job_name,
            %error,
            duration_ms = started.elapsed().as_millis() as u64,
            "job run failed"
        ),
    }
}

struct CronTimerHandle {
    cron: JobScheduler,
    id: Uuid,
    job_name: String,
}

#[async_trait]
impl TimerHandle for CronTimerHandle {
    async fn cancel(&self) {
        if let Err(error) = self.cron.remove(&self.id).await {
            warn!(job = %self.job_name, timer_id = %self.id, %error, "failed to remove cron timer");
        }
    }
}

struct FixedTimerHandle {
    ticker_task: tokio::task::JoinHandle<()>,
}

#[async_trait]
impl TimerHandle for FixedTimerHandle {
    async fn cancel(&self) {
        // Stops the ticker; in-flight runs were spawned separately and
        // continue to completion.
        self.ticker_task.abort();
    }
}
