//! Reconciliation of desired schedule against armed timers.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::config::SchedulerConfig;
use super::error::{SchedulerError, SchedulerResult};
use super::executor::{TaskExecutor, TokioTaskExecutor};
use super::model::{JobEvent, ScheduleDelta, ScheduledJobSpec};
use super::registry::{ArmedJobRegistry, ArmedState};
use super::scanner::{JobHandler, JobScanner};
use super::source::CompositeJobSource;
use super::store::JobStore;

/// Compute the per-job difference between desired and armed state.
///
/// Pure and deterministic. An absent side is treated as "no interval, no
/// crons"; an interval change yields both a remove of the old value and an
/// add of the new one; cron sets compare by plain set difference.
pub fn diff(wanted: Option<&ScheduledJobSpec>, armed: Option<&ArmedState>) -> ScheduleDelta {
    let wanted_interval = wanted.and_then(|spec| spec.fixed_interval);
    let armed_interval = armed.and_then(|state| state.fixed_interval);

    let empty = HashSet::new();
    let wanted_crons = wanted.map(|spec| &spec.cron_expressions).unwrap_or(&empty);
    let armed_crons = armed.map(|state| &state.cron_expressions).unwrap_or(&empty);

    let mut delta = ScheduleDelta::default();
    if wanted_interval != armed_interval {
        delta.fixed_to_add = wanted_interval;
        delta.fixed_to_remove = armed_interval;
    }
    delta.crons_to_add = wanted_crons.difference(armed_crons).cloned().collect();
    delta.crons_to_remove = armed_crons.difference(wanted_crons).cloned().collect();
    delta
}

/// Drives desired state into the armed registry.
///
/// All passes run on one event loop ([`run`](Self::run)), so no two passes
/// ever observe a half-applied armed state. Failures inside a pass are
/// logged and swallowed; the engine never takes down the hosting process.
pub struct ReconciliationEngine {
    source: Arc<CompositeJobSource>,
    executor: Arc<dyn TaskExecutor>,
    handlers: HashMap<String, JobHandler>,
    armed: Arc<ArmedJobRegistry>,
}

impl ReconciliationEngine {
    pub fn new(
        source: Arc<CompositeJobSource>,
        executor: Arc<dyn TaskExecutor>,
        handlers: HashMap<String, JobHandler>,
        armed: Arc<ArmedJobRegistry>,
    ) -> Self {
        Self {
            source,
            executor,
            handlers,
            armed,
        }
    }

    pub fn armed(&self) -> &ArmedJobRegistry {
        &self.armed
    }

    /// Single-consumer event loop; serializes reconciliation passes.
    pub async fn run(self, mut events: mpsc::Receiver<JobEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        debug!("scheduler event channel closed, reconciliation loop exiting");
    }

    pub async fn handle_event(&self, event: JobEvent) {
        match event {
            JobEvent::StartupComplete => {
                info!("scheduling jobs after startup");
                self.source.load().await;
                self.reconcile().await;
            }
            JobEvent::Added(row) => {
                info!(job = %row.name, "scheduling jobs after addition");
                self.source.on_job_added(row).await;
                self.reconcile().await;
            }
            JobEvent::Modified(row) => {
                info!(job = %row.name, "scheduling jobs after modification");
                self.source.on_job_modified(row).await;
                self.reconcile().await;
            }
            JobEvent::Removed(job_id) => {
                info!(job_id, "scheduling jobs after removal");
                self.source.on_job_removed(job_id).await;
                self.reconcile().await;
            }
        }
    }

    /// One full diff/apply pass over the union of desired and armed jobs.
    ///
    /// Idempotent: a second pass with unchanged state computes only empty
    /// deltas and issues no scheduling commands.
    pub async fn reconcile(&self) {
        let desired = match self.source.scheduled_jobs().await {
            Ok(specs) => specs,
            Err(error) => {
                error!(%error, "desired schedule unavailable, skipping reconciliation pass");
                return;
            }
        };

        let wanted: HashMap<&str, &ScheduledJobSpec> = desired
            .iter()
            .map(|spec| (spec.name.as_str(), spec))
            .collect();

        let armed = self.armed.snapshot();
        let mut names: BTreeSet<String> = wanted.keys().map(|name| name.to_string()).collect();
        names.extend(armed.keys().cloned());

        for name in &names {
            let delta = diff(wanted.get(name.as_str()).copied(), armed.get(name.as_str()));
            if delta.is_empty() {
                continue;
            }
            self.apply(name, &delta).await;
        }
    }

    async fn apply(&self, name: &str, delta: &ScheduleDelta) {
        let Some(handler) = self.handlers.get(name) else {
            warn!(
                job = name,
                "no registered handler for desired job, skipping its schedule"
            );
            return;
        };

        // Removes strictly before adds, so a changed interval never leaves
        // two live timers for the same job.
        for expression in &delta.crons_to_remove {
            if let Some(handle) = self.armed.remove_cron(name, expression) {
                handle.cancel().await;
                info!(job = name, cron = %expression, "cancelled cron timer");
            }
        }

        if let Some(every) = delta.fixed_to_remove {
            if let Some(handle) = self.armed.clear_fixed(name) {
                handle.cancel().await;
                info!(
                    job = name,
                    interval_ms = every.as_millis() as u64,
                    "cancelled fixed-rate timer"
                );
            }
        }

        for expression in &delta.crons_to_add {
            match self
                .executor
                .schedule_cron(name, expression, handler.clone())
                .await
            {
                Ok(handle) => {
                    if let Some(displaced) = self.armed.insert_cron(name, expression, handle) {
                        displaced.cancel().await;
                    }
                    info!(job = name, cron = %expression, "armed cron timer");
                }
                Err(error) => {
                    error!(job = name, cron = %expression, %error, "failed to arm cron timer");
                }
            }
        }

        if let Some(every) = delta.fixed_to_add {
            match self
                .executor
                .schedule_fixed_rate(name, every, handler.clone())
                .await
            {
                Ok(handle) => {
                    if let Some(displaced) = self.armed.set_fixed(name, every, handle) {
                        displaced.cancel().await;
                    }
                    info!(
                        job = name,
                        interval_ms = every.as_millis() as u64,
                        "armed fixed-rate timer"
                    );
                }
                Err(error) => {
                    error!(job = name, %error, "failed to arm fixed-rate timer");
                }
            }
        }

        if self.armed.remove_if_empty(name) {
            debug!(job = name, "dropped empty armed entry");
        }
    }
}

/// Wires scanner, source, engine, and executor together for a service
/// process. Constructed at startup, torn down at shutdown.
pub struct SchedulerService {
    events: mpsc::Sender<JobEvent>,
    armed: Arc<ArmedJobRegistry>,
    executor: Arc<TokioTaskExecutor>,
    worker: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
    running: AtomicBool,
}

impl SchedulerService {
    /// Start the scheduler over the default tokio-backed timer facility.
    ///
    /// Spawns the engine's event loop in the background; feed it through
    /// [`notify`](Self::notify), beginning with [`JobEvent::StartupComplete`]
    /// once the hosting process is up.
    pub async fn start(
        config: SchedulerConfig,
        store: Arc<dyn JobStore>,
        scanner: JobScanner,
    ) -> SchedulerResult<Self> {
        if !config.enabled {
            info!("scheduler is disabled in configuration");
        }

        let executor = Arc::new(TokioTaskExecutor::start().await?);
        let handlers = scanner.scan()?;
        info!(handlers = handlers.len(), "job handler scan complete");

        let armed = Arc::new(ArmedJobRegistry::new());
        let source = Arc::new(CompositeJobSource::new(store, config.clone()));
        let engine = ReconciliationEngine::new(
            source,
            executor.clone() as Arc<dyn TaskExecutor>,
            handlers,
            armed.clone(),
        );

        let (tx, rx) = mpsc::channel(config.event_buffer);
        let enabled = config.enabled;
        let worker = tokio::spawn(async move {
            if enabled {
                engine.run(rx).await;
            } else {
                // Disabled: notifications are still accepted, just dropped.
                let mut events = rx;
                while let Some(event) = events.recv().await {
                    debug!(?event, "scheduler disabled, dropping change notification");
                }
            }
        });

        Ok(Self {
            events: tx,
            armed,
            executor,
            worker: parking_lot::Mutex::new(Some(worker)),
            running: AtomicBool::new(true),
        })
    }

    /// Sender half of the change-notification channel, for messaging glue.
    pub fn event_sender(&self) -> mpsc::Sender<JobEvent> {
        self.events.clone()
    }

    /// Deliver one change notification to the engine.
    pub async fn notify(&self, event: JobEvent) -> SchedulerResult<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| SchedulerError::EventLoopStopped)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Names of jobs with at least one armed timer.
    pub fn armed_jobs(&self) -> Vec<String> {
        self.armed.armed_names()
    }

    /// Stop the event loop and cancel every armed timer.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            warn!("scheduler is not running");
            return;
        }
        info!("shutting down scheduler");

        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }

        for handle in self.armed.drain() {
            handle.cancel().await;
        }

        if let Err(error) = self.executor.shutdown().await {
            warn!(%error, "timer facility shutdown reported an error");
        }
        info!("scheduler shut down");
    }
}
