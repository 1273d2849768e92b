//! Shared test doubles: a fault-injecting job store and a recording timer
//! facility.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use railway_collector_core::scheduler::{
    CronRow, IntervalRow, JobHandler, JobRow, JobStore, SchedulerResult, StoreError, StoreResult,
    TaskExecutor, TimerHandle,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct MockState {
    jobs: Vec<JobRow>,
    intervals: HashMap<i64, Duration>,
    crons: HashMap<i64, Vec<String>>,
    fail_interval_for: HashSet<i64>,
    fail_crons_for: HashSet<i64>,
    fail_listing: bool,
}

/// Job store with per-call fault injection
#[derive(Default)]
pub struct MockJobStore {
    state: RwLock<MockState>,
    not_ready_remaining: AtomicU32,
    list_calls: AtomicU32,
}

impl MockJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_job(&self, id: i64, name: &str) {
        self.state.write().jobs.push(JobRow {
            id,
            name: name.to_string(),
        });
    }

    pub fn set_interval(&self, id: i64, every: Duration) {
        self.state.write().intervals.insert(id, every);
    }

    pub fn clear_interval(&self, id: i64) {
        self.state.write().intervals.remove(&id);
    }

    pub fn set_crons(&self, id: i64, crons: &[&str]) {
        self.state
            .write()
            .crons
            .insert(id, crons.iter().map(|s| s.to_string()).collect());
    }

    pub fn remove_job(&self, id: i64) {
        let mut state = self.state.write();
        state.jobs.retain(|job| job.id != id);
        state.intervals.remove(&id);
        state.crons.remove(&id);
    }

    /// The next `count` `list_jobs` calls answer `StoreError::NotReady`.
    pub fn not_ready_for(&self, count: u32) {
        self.not_ready_remaining.store(count, Ordering::SeqCst);
    }

    pub fn fail_listing(&self) {
        self.state.write().fail_listing = true;
    }

    pub fn fail_interval_for(&self, id: i64) {
        self.state.write().fail_interval_for.insert(id);
    }

    pub fn fail_crons_for(&self, id: i64) {
        self.state.write().fail_crons_for.insert(id);
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStore for MockJobStore {
    async fn list_jobs(&self) -> StoreResult<Vec<JobRow>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.not_ready_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.not_ready_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::NotReady);
        }

        let state = self.state.read();
        if state.fail_listing {
            return Err(StoreError::Backend("listing failed".to_string()));
        }
        Ok(state.jobs.clone())
    }

    async fn find_interval(&self, job_id: i64) -> StoreResult<Option<IntervalRow>> {
        let state = self.state.read();
        if state.fail_interval_for.contains(&job_id) {
            return Err(StoreError::Backend("interval read failed".to_string()));
        }
        Ok(state
            .intervals
            .get(&job_id)
            .map(|every| IntervalRow { job_id, every: *every }))
    }

    async fn find_crons(&self, job_id: i64) -> StoreResult<Vec<CronRow>> {
        let state = self.state.read();
        if state.fail_crons_for.contains(&job_id) {
            return Err(StoreError::Backend("cron read failed".to_string()));
        }
        Ok(state
            .crons
            .get(&job_id)
            .map(|crons| {
                crons
                    .iter()
                    .map(|expression| CronRow {
                        job_id,
                        expression: expression.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// One observed interaction with the timer facility
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorEvent {
    ScheduledCron { job: String, expression: String },
    ScheduledFixed { job: String, period: Duration },
    Cancelled { label: String },
}

/// Timer facility that records every schedule and cancel instead of running
/// timers.
#[derive(Default)]
pub struct RecordingExecutor {
    log: Arc<Mutex<Vec<ExecutorEvent>>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ExecutorEvent> {
        self.log.lock().clone()
    }

    pub fn schedule_count(&self) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|event| !matches!(event, ExecutorEvent::Cancelled { .. }))
            .count()
    }

    pub fn cancel_count(&self) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|event| matches!(event, ExecutorEvent::Cancelled { .. }))
            .count()
    }
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
    async fn schedule_cron(
        &self,
        job_name: &str,
        expression: &str,
        _handler: JobHandler,
    ) -> SchedulerResult<Box<dyn TimerHandle>> {
        self.log.lock().push(ExecutorEvent::ScheduledCron {
            job: job_name.to_string(),
            expression: expression.to_string(),
        });
        Ok(Box::new(RecordingHandle {
            label: format!("{job_name}/{expression}"),
            log: self.log.clone(),
        }))
    }

    async fn schedule_fixed_rate(
        &self,
        job_name: &str,
        period: Duration,
        _handler: JobHandler,
    ) -> SchedulerResult<Box<dyn TimerHandle>> {
        self.log.lock().push(ExecutorEvent::ScheduledFixed {
            job: job_name.to_string(),
            period,
        });
        Ok(Box::new(RecordingHandle {
            label: format!("{job_name}/fixed"),
            log: self.log.clone(),
        }))
    }
}

struct RecordingHandle {
    label: String,
    log: Arc<Mutex<Vec<ExecutorEvent>>>,
}

#[async_trait]
impl TimerHandle for RecordingHandle {
    async fn cancel(&self) {
        self.log.lock().push(ExecutorEvent::Cancelled {
            label: self.label.clone(),
        });
    }
}
