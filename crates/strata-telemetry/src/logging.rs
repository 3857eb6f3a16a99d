//! Structured logging initialization.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{TelemetryError, TelemetryResult};

/// Output format of the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// JSON when `RUST_ENV` is `production`, pretty otherwise.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_rust_env(std::env::var("RUST_ENV").ok().as_deref())
    }

    fn from_rust_env(value: Option<&str>) -> Self {
        match value {
            Some("production") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Build the filter: `RUST_LOG` wins, `default_filter` otherwise.
fn build_filter(default_filter: &str) -> TelemetryResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_filter).map_err(|e| TelemetryError::InvalidFilter {
        filter: default_filter.to_string(),
        reason: e.to_string(),
    })
}

/// Install the global tracing subscriber.
///
/// # Errors
/// `TelemetryError::LoggingInit` if a global subscriber is already set,
/// `TelemetryError::InvalidFilter` if `default_filter` does not parse.
pub fn init_logging(default_filter: &str) -> TelemetryResult<()> {
    let env_filter = build_filter(default_filter)?;

    let result = match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init(),
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}
