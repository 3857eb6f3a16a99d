//! Error types for strata-core.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Not of the form `venue:asset` with numeric indices in range.
    #[error("Invalid market key: {0}")]
    InvalidMarketKey(String),
}
