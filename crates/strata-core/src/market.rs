//! Market identification types.
//!
//! A market is addressed by the venue it trades on plus the venue's asset
//! index. The scheduler only uses the key for logging and for handing the
//! payload to the signing collaborator.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Venue identifier (index of the exchange sub-venue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VenueId(pub u16);

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset identifier within a venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId(pub u32);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique market identifier combining venue and asset.
///
/// Format: `{venue}:{asset}` (e.g., "0:42").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketKey {
    pub venue: VenueId,
    pub asset: AssetId,
}

impl MarketKey {
    /// Create from venue index and asset index.
    pub fn from_indices(venue_idx: u16, asset_idx: u32) -> Self {
        Self {
            venue: VenueId(venue_idx),
            asset: AssetId(asset_idx),
        }
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.venue, self.asset)
    }
}

impl FromStr for MarketKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (venue, asset) = s
            .split_once(':')
            .ok_or_else(|| CoreError::InvalidMarketKey(s.to_string()))?;

        let venue = venue
            .trim()
            .parse::<u16>()
            .map_err(|_| CoreError::InvalidMarketKey(s.to_string()))?;
        let asset = asset
            .trim()
            .parse::<u32>()
            .map_err(|_| CoreError::InvalidMarketKey(s.to_string()))?;

        Ok(Self::from_indices(venue, asset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_key_display() {
        let key = MarketKey::from_indices(1, 27);
        assert_eq!(key.to_string(), "1:27");
    }

    #[test]
    fn test_market_key_parse_roundtrip() {
        let key: MarketKey = "3:110027".parse().unwrap();
        assert_eq!(key.venue, VenueId(3));
        assert_eq!(key.asset, AssetId(110027));
        assert_eq!(key.to_string().parse::<MarketKey>().unwrap(), key);
    }

    #[test]
    fn test_market_key_parse_rejects_garbage() {
        assert!(matches!(
            "btc".parse::<MarketKey>(),
            Err(CoreError::InvalidMarketKey(_))
        ));
        assert!(matches!(
            "0:-1".parse::<MarketKey>(),
            Err(CoreError::InvalidMarketKey(_))
        ));
        assert!(matches!(
            "70000:1".parse::<MarketKey>(),
            Err(CoreError::InvalidMarketKey(_))
        ));
    }
}
