//! Host application for the strata execution scheduler.
//!
//! Wires the executor to paper collaborators and drives it:
//! - TOML configuration with CLI/env path selection
//! - Paper signer and simulated venue
//! - Demo action producer
//! - Fixed-cadence tick loop with graceful shutdown

pub mod app;
pub mod config;
pub mod error;
pub mod paper;
pub mod producer;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
