//! Rows, desired-state specs, deltas, and change notifications

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Persisted job row: a stable id and a unique name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRow {
    pub id: i64,
    pub name: String,
}

/// Persisted fixed-interval row for a job (at most one per job)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalRow {
    pub job_id: i64,
    pub every: Duration,
}

/// Persisted cron row for a job (any number per job)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronRow {
    pub job_id: i64,
    pub expression: String,
}

/// Desired state for one job, assembled from its rows.
///
/// A job with neither an interval nor cron expressions is part of the desired
/// set but carries no timers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJobSpec {
    pub id: i64,
    pub name: String,
    pub fixed_interval: Option<Duration>,
    pub cron_expressions: HashSet<String>,
}

impl ScheduledJobSpec {
    pub fn from_parts(job: JobRow, interval: Option<IntervalRow>, crons: Vec<CronRow>) -> Self {
        Self {
            id: job.id,
            name: job.name,
            fixed_interval: interval.map(|row| row.every),
            cron_expressions: crons.into_iter().map(|row| row.expression).collect(),
        }
    }
}

/// Per-job difference between desired and armed state.
///
/// Computed by [`diff`](super::diff), never persisted. An interval change is
/// expressed as a remove of the old value plus an add of the new one; the
/// apply step runs removes before adds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleDelta {
    pub fixed_to_add: Option<Duration>,
    pub fixed_to_remove: Option<Duration>,
    pub crons_to_add: HashSet<String>,
    pub crons_to_remove: HashSet<String>,
}

impl ScheduleDelta {
    pub fn is_empty(&self) -> bool {
        self.fixed_to_add.is_none()
            && self.fixed_to_remove.is_none()
            && self.crons_to_add.is_empty()
            && self.crons_to_remove.is_empty()
    }
}

/// Change notification consumed by the reconciliation engine.
///
/// Delivered at-least-once over an mpsc channel, after the triggering
/// transaction has committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// The hosting process finished starting up; load the full schedule.
    StartupComplete,
    /// A job row was inserted.
    Added(JobRow),
    /// A job row or its interval/cron rows changed.
    Modified(JobRow),
    /// A job row was deleted.
    Removed(i64),
}
