//! Reconciling job scheduler for the data-collection services.
//!
//! The scheduler keeps the set of live timers converged on a desired schedule
//! held in an external store:
//!
//! - [`JobScanner`] discovers the locally registered job handlers once per
//!   process and maps each to a stable job name.
//! - [`CompositeJobSource`] loads and caches the desired schedule from the
//!   [`JobStore`] port, degrading per-field on partial failure and retrying
//!   a not-ready store with backoff and jitter.
//! - [`ReconciliationEngine`] diffs desired state against the
//!   [`ArmedJobRegistry`] and applies the delta through the [`TaskExecutor`]
//!   port, serialized on a single event loop.
//! - [`SchedulerService`] wires the pieces together for a service process.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use railway_collector_core::scheduler::{
//!     InMemoryJobStore, JobEvent, JobScanner, SchedulerConfig, SchedulerService,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryJobStore::new());
//!     let scanner = JobScanner::new().register("DelayCollector", "poll_delays", || async {
//!         // collect and publish delay observations
//!         Ok(())
//!     });
//!
//!     let service = SchedulerService::start(SchedulerConfig::default(), store, scanner).await?;
//!     service.notify(JobEvent::StartupComplete).await?;
//!
//!     // ... run the service ...
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

mod config;
mod engine;
mod error;
mod executor;
mod model;
mod registry;
mod scanner;
mod source;
mod store;

pub use config::{RetryConfig, SchedulerConfig, SchedulerConfigBuilder};
pub use engine::{diff, ReconciliationEngine, SchedulerService};
pub use error::{SchedulerError, SchedulerResult};
pub use executor::{TaskExecutor, TimerHandle, TokioTaskExecutor};
pub use model::{CronRow, IntervalRow, JobEvent, JobRow, ScheduleDelta, ScheduledJobSpec};
pub use registry::{ArmedJobRegistry, ArmedState};
pub use scanner::{JobHandler, JobScanner};
pub use source::CompositeJobSource;
pub use store::{InMemoryJobStore, JobStore, StoreError, StoreResult};
