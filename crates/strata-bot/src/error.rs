//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Market error: {0}")]
    Market(#[from] strata_core::CoreError),

    #[error("Executor error: {0}")]
    Executor(#[from] strata_executor::ExecutorError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] strata_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
