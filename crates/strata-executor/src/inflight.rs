//! Bounded, non-blocking counter of requests awaiting an exchange response.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;
use tracing::warn;

/// Point-in-time view of the inflight counter.
///
/// `ActionQueue::collect` decides on a snapshot so that "what is scheduled"
/// never mutates "what is outstanding".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InflightState {
    pub current: u32,
    pub limit: u32,
}

impl InflightState {
    #[must_use]
    pub fn new(current: u32, limit: u32) -> Self {
        Self { current, limit }
    }

    /// No slot is left for any request, whatever its tier.
    #[must_use]
    pub fn is_at_limit(&self) -> bool {
        self.current >= self.limit
    }
}

/// Thread-safe tracker for in-flight request count.
///
/// The value equals the number of pending requests confirmed as written to
/// the transport. Only the executor mutates it: once on a confirmed send and
/// once when such a request is resolved.
#[derive(Debug)]
pub struct InflightTracker {
    count: AtomicU32,
    limit: u32,
}

impl InflightTracker {
    /// Create a new inflight tracker with the given limit.
    ///
    /// # Arguments
    /// * `limit` - Maximum number of in-flight requests allowed (typically 100)
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            limit,
        }
    }

    /// Get the current in-flight count.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Get the configured limit.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    #[must_use]
    pub fn snapshot(&self) -> InflightState {
        InflightState::new(self.current(), self.limit)
    }

    /// Try to increment the in-flight count.
    ///
    /// Lock-free CAS loop. Returns `false` without mutation when already at
    /// the limit.
    pub fn increment(&self) -> bool {
        loop {
            let current = self.count.load(Ordering::Acquire);
            if current >= self.limit {
                return false;
            }

            match self.count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(_) => continue,
            }
        }
    }

    /// Decrement the in-flight count.
    ///
    /// Returns `false` without mutation when already at 0. An underflow means
    /// some path released a slot it never took, so it is logged rather than
    /// clamped silently.
    pub fn decrement(&self) -> bool {
        loop {
            let current = self.count.load(Ordering::Acquire);
            if current == 0 {
                warn!(limit = self.limit, "inflight decrement refused: counter already 0");
                return false;
            }

            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(_) => continue,
            }
        }
    }
}
