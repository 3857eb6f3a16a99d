//! Core domain types for the strata execution scheduler.
//!
//! This crate provides the types shared by the scheduler and its hosts:
//! - `MarketKey`: Venue + asset identifier
//! - `Price`, `Size`: Precision-safe numeric types
//! - `PendingOrder`, `PendingCancel`: Caller-supplied units of work
//! - `Action`, `ActionBatch`: Tagged actions and the one-request batch
//! - `EnqueueResult`: Backpressure outcome of an enqueue call

pub mod decimal;
pub mod error;
pub mod execution;
pub mod market;
pub mod order;

pub use decimal::{Price, Size};
pub use error::CoreError;
pub use market::{AssetId, MarketKey, VenueId};
pub use order::{ClientOrderId, OrderSide};

// Execution types
pub use execution::{
    Action, ActionBatch, ActionKind, EnqueueResult, PendingCancel, PendingOrder,
};
