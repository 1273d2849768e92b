//! Bookkeeping of currently armed timers, per job.

use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::executor::TimerHandle;

/// Armed timers for one job: at most one fixed-rate timer (kept with its
/// interval for equality checks) plus one timer per cron expression.
#[derive(Default)]
struct ArmedJobEntry {
    fixed: Option<(Duration, Box<dyn TimerHandle>)>,
    crons: HashMap<String, Box<dyn TimerHandle>>,
}

impl ArmedJobEntry {
    fn is_empty(&self) -> bool {
        self.fixed.is_none() && self.crons.is_empty()
    }
}

/// Handle-free view of a job's armed timers, used for diffing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArmedState {
    pub fixed_interval: Option<Duration>,
    pub cron_expressions: HashSet<String>,
}

/// Concurrency-safe map from job name to its armed timers.
///
/// Reads and per-key writes are safe under concurrency; reconciliation
/// passes themselves are serialized by the engine's event loop, so no
/// fine-grained coordination beyond the sharded map is needed. An entry
/// whose last timer is removed is garbage-collected via
/// [`remove_if_empty`](Self::remove_if_empty).
#[derive(Default)]
pub struct ArmedJobRegistry {
    entries: DashMap<String, ArmedJobEntry>,
}

impl ArmedJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn armed_names(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn armed_state(&self, name: &str) -> Option<ArmedState> {
        self.entries.get(name).map(|entry| ArmedState {
            fixed_interval: entry.fixed.as_ref().map(|(every, _)| *every),
            cron_expressions: entry.crons.keys().cloned().collect(),
        })
    }

    /// Handle-free view of every armed job, taken at the start of a
    /// reconciliation pass.
    pub fn snapshot(&self) -> HashMap<String, ArmedState> {
        self.entries
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    ArmedState {
                        fixed_interval: entry.fixed.as_ref().map(|(every, _)| *every),
                        cron_expressions: entry.crons.keys().cloned().collect(),
                    },
                )
            })
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Arm the fixed timer, returning a displaced handle for cancellation.
    pub fn set_fixed(
        &self,
        name: &str,
        every: Duration,
        handle: Box<dyn TimerHandle>,
    ) -> Option<Box<dyn TimerHandle>> {
        let mut entry = self.entries.entry(name.to_string()).or_default();
        entry
            .fixed
            .replace((every, handle))
            .map(|(_, displaced)| displaced)
    }

    pub fn clear_fixed(&self, name: &str) -> Option<Box<dyn TimerHandle>> {
        let mut entry = self.entries.get_mut(name)?;
        entry.fixed.take().map(|(_, handle)| handle)
    }

    /// Arm a cron timer, returning a displaced handle for cancellation.
    pub fn insert_cron(
        &self,
        name: &str,
        expression: &str,
        handle: Box<dyn TimerHandle>,
    ) -> Option<Box<dyn TimerHandle>> {
        let mut entry = self.entries.entry(name.to_string()).or_default();
        entry.crons.insert(expression.to_string(), handle)
    }

    pub fn remove_cron(&self, name: &str, expression: &str) -> Option<Box<dyn TimerHandle>> {
        let mut entry = self.entries.get_mut(name)?;
        entry.crons.remove(expression)
    }

    /// Drop the job's entry when it holds no timers. Returns whether an
    /// entry was removed.
    pub fn remove_if_empty(&self, name: &str) -> bool {
        self.entries
            .remove_if(name, |_, entry| entry.is_empty())
            .is_some()
    }

    /// Tear down all bookkeeping, yielding every handle for cancellation.
    pub fn drain(&self) -> Vec<Box<dyn TimerHandle>> {
        let names = self.armed_names();
        let mut handles = Vec::new();
        for name in names {
            if let Some((_, entry)) = self.entries.remove(&name) {
                let ArmedJobEntry { fixed, crons } = entry;
                if let Some((_, handle)) = fixed {
                    handles.push(handle);
                }
                handles.extend(crons.into_values());
            }
        }
        handles
    }
}
