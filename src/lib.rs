//! Shared concurrency infrastructure for railway data-collection services.
//!
//! The data-collection landscape feeding the delay-prediction pipeline keeps
//! two cross-cutting pieces of machinery in this crate:
//!
//! - [`scheduler`] — a reconciling job scheduler. A background control loop
//!   keeps the set of live cron and fixed-rate timers converged on a desired
//!   schedule held in an external store, reacting to startup and to
//!   add/modify/remove change notifications.
//! - [`correlation`] — a request/response correlation registry. Callers park
//!   a future under a correlation key, publish an outbound request over a
//!   fire-and-forget transport, and the future settles when the matching
//!   inbound response (or failure, or the deadline) arrives.
//!
//! Message brokers, cron parsing, and persistence are consumed through narrow
//! ports ([`scheduler::JobStore`], [`scheduler::TaskExecutor`],
//! [`cache::ResponseCache`]); this crate owns no wire protocol of its own.

pub mod cache;
pub mod config;
pub mod correlation;
pub mod domain;
pub mod error;
pub mod scheduler;
pub mod telemetry;

pub use config::Config;
pub use error::AppError;
