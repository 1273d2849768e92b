use thiserror::Error;

use crate::correlation::CorrelationError;
use crate::scheduler::SchedulerError;

/// Application error umbrella shared by the collector services
#[derive(Error, Debug)]
pub enum AppError {
    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Scheduler errors
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Correlation errors
    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable error code string, used in log fields and message envelopes
    pub fn error_code(&self) -> &str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Scheduler(_) => "SCHEDULER_ERROR",
            AppError::Correlation(CorrelationError::Timeout { .. }) => "CORRELATION_TIMEOUT",
            AppError::Correlation(_) => "CORRELATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
