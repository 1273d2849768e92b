//! Error types for the scheduler module

use super::store::StoreError;

/// Result type for scheduler operations
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

/// Errors that can occur in scheduler operations
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Scheduler failed to start
    #[error("Failed to start scheduler: {0}")]
    StartupFailed(String),

    /// Scheduler failed to shut down
    #[error("Failed to shut down scheduler: {0}")]
    ShutdownFailed(String),

    /// Invalid cron expression
    #[error("Invalid cron expression '{expression}': {message}")]
    InvalidCronExpression { expression: String, message: String },

    /// Two registered handlers resolved to the same job name
    #[error("Duplicate job name: {0}")]
    DuplicateJobName(String),

    /// The job store is not ready to serve reads yet
    #[error("Job store is not ready yet")]
    StoreNotReady,

    /// The job store failed
    #[error("Job store failure: {0}")]
    Store(String),

    /// The desired schedule has not been loaded yet
    #[error("Desired schedule is not loaded yet")]
    NotInitialized,

    /// The engine's event loop has stopped
    #[error("Scheduler event loop is not running")]
    EventLoopStopped,

    /// Internal scheduler backend error
    #[error("Scheduler backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for SchedulerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotReady => SchedulerError::StoreNotReady,
            StoreError::Backend(message) => SchedulerError::Store(message),
        }
    }
}

impl From<tokio_cron_scheduler::JobSchedulerError> for SchedulerError {
    fn from(err: tokio_cron_scheduler::JobSchedulerError) -> Self {
        SchedulerError::Backend(format!("tokio-cron-scheduler error: {}", err))
    }
}
