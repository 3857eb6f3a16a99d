//! Order side and client order ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const CLOID_PREFIX: &str = "strata";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }

    /// The side that flattens a position opened on `self`.
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-assigned order id, `strata_{unix_ms}_{8 hex chars}`.
///
/// Assigned once when the order is built. A reduce-only order that is
/// re-queued after a transport failure goes out again under the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    pub fn new() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        let ts = chrono::Utc::now().timestamp_millis();
        Self(format!("{CLOID_PREFIX}_{ts}_{}", &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for ClientOrderId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_side() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite().to_string(), "buy");
    }

    #[test]
    fn test_cloid_shape() {
        let cloid = ClientOrderId::new();
        let parts: Vec<_> = cloid.as_str().split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "strata");
        assert!(parts[1].parse::<i64>().unwrap() > 0);
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_cloids_are_unique() {
        assert_ne!(ClientOrderId::new(), ClientOrderId::new());
    }
}
