//! Structured logging for the strata execution scheduler.
//!
//! JSON output in production (`RUST_ENV=production`), pretty output
//! otherwise, filtered by `RUST_LOG` or the host's configured default.

pub mod error;
pub mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, LogFormat};
