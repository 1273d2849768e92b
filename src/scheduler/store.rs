//! Job persistence port and the in-memory backend.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use thiserror::Error;

use super::model::{CronRow, IntervalRow, JobRow};

/// Errors surfaced by the job store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store is reachable but cannot serve reads yet (e.g. migrations
    /// still running). The only retryable failure class.
    #[error("job store is not ready yet")]
    NotReady,

    /// Any other backend failure
    #[error("job store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Read-only port over the schedule persistence. The core never writes here.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn list_jobs(&self) -> StoreResult<Vec<JobRow>>;

    async fn find_interval(&self, job_id: i64) -> StoreResult<Option<IntervalRow>>;

    async fn find_crons(&self, job_id: i64) -> StoreResult<Vec<CronRow>>;
}

#[derive(Default)]
struct StoreState {
    jobs: Vec<JobRow>,
    intervals: HashMap<i64, IntervalRow>,
    crons: HashMap<i64, Vec<CronRow>>,
}

/// In-memory job store for local development and tests
#[derive(Default)]
pub struct InMemoryJobStore {
    state: RwLock<StoreState>,
    next_id: AtomicI64,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn insert_job(&self, name: impl Into<String>) -> JobRow {
        let row = JobRow {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
        };
        self.state.write().jobs.push(row.clone());
        row
    }

    pub fn set_interval(&self, job_id: i64, every: Duration) {
        self.state
            .write()
            .intervals
            .insert(job_id, IntervalRow { job_id, every });
    }

    pub fn clear_interval(&self, job_id: i64) {
        self.state.write().intervals.remove(&job_id);
    }

    pub fn add_cron(&self, job_id: i64, expression: impl Into<String>) {
        self.state.write().crons.entry(job_id).or_default().push(CronRow {
            job_id,
            expression: expression.into(),
        });
    }

    pub fn clear_crons(&self, job_id: i64) {
        self.state.write().crons.remove(&job_id);
    }

    pub fn remove_job(&self, job_id: i64) {
        let mut state = self.state.write();
        state.jobs.retain(|job| job.id != job_id);
        state.intervals.remove(&job_id);
        state.crons.remove(&job_id);
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn list_jobs(&self) -> StoreResult<Vec<JobRow>> {
        Ok(self.state.read().jobs.clone())
    }

    async fn find_interval(&self, job_id: i64) -> StoreResult<Option<IntervalRow>> {
        Ok(self.state.read().intervals.get(&job_id).cloned())
    }

    async fn find_crons(&self, job_id: i64) -> StoreResult<Vec<CronRow>> {
        Ok(self.state.read().crons.get(&job_id).cloned().unwrap_or_default())
    }
}
