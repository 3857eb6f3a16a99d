//! Nonce manager for signed action submission with monotonic guarantees.
//!
//! Provides unique, strictly increasing nonces anchored to wall-clock time
//! that track the exchange's clock once synced, while keeping ordering even
//! when the local clock jumps backwards.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Error types for nonce management.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NonceError {
    /// Time drift between local and server clocks exceeds acceptable threshold.
    #[error("time drift too large: {0}ms")]
    TimeDriftTooLarge(i64),
}

/// Trait for obtaining current time, enabling deterministic tests.
pub trait Clock: Send + Sync {
    /// Returns current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        // Pre-epoch clocks clamp to zero; the nonce counter never regresses anyway.
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Manually driven clock.
///
/// Share it as `Arc<ManualClock>` between the nonce manager, the executor
/// and the test (or simulation) that advances time.
#[derive(Debug, Default)]
pub struct ManualClock {
    time_ms: AtomicU64,
}

impl ManualClock {
    #[must_use]
    pub fn new(initial_ms: u64) -> Self {
        Self {
            time_ms: AtomicU64::new(initial_ms),
        }
    }

    pub fn set(&self, time_ms: u64) {
        self.time_ms.store(time_ms, Ordering::Release);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.time_ms.fetch_add(delta_ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.time_ms.load(Ordering::Acquire)
    }
}

/// Manages nonce generation with monotonic and server-time-tracking guarantees.
///
/// # Guarantees
/// - Nonces are strictly increasing, across threads and clock regressions
/// - The first nonce is anchored to wall-clock time, never zero
/// - After `sync_with_server(t)`, every nonce is `>= t`
///
/// # Offset Convention
/// `server_offset_ms = server_time - local_time`
/// - Positive: server clock is ahead of local
/// - Negative: server clock is behind local
pub struct NonceManager<C: Clock = SystemClock> {
    /// Last issued nonce (monotonically increasing counter).
    counter: AtomicU64,
    /// Offset: server_time - local_time (positive = server ahead).
    server_offset_ms: AtomicI64,
    /// Last sync timestamp in local time.
    last_sync_ms: AtomicU64,
    /// Clock source for current time.
    clock: C,
}

impl<C: Clock> NonceManager<C> {
    /// Threshold for warning about time drift (2 seconds).
    pub const DRIFT_WARN_THRESHOLD_MS: i64 = 2000;
    /// Threshold for refusing a sync (5 seconds).
    pub const DRIFT_ERROR_THRESHOLD_MS: i64 = 5000;

    /// Creates a new `NonceManager` with the given clock.
    ///
    /// The counter is initialized to the current Unix timestamp in milliseconds.
    #[must_use]
    pub fn new(clock: C) -> Self {
        let now = clock.now_ms();
        Self {
            counter: AtomicU64::new(now),
            server_offset_ms: AtomicI64::new(0),
            last_sync_ms: AtomicU64::new(0),
            clock,
        }
    }

    /// The clock this manager reads.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Returns approximate server time based on local time and known offset.
    ///
    /// `approx_server_time = local_time + server_offset`
    #[must_use]
    pub fn approx_server_time_ms(&self) -> u64 {
        let local = self.clock.now_ms();
        let offset = self.server_offset_ms.load(Ordering::Acquire);
        if offset >= 0 {
            local.saturating_add(offset as u64)
        } else {
            local.saturating_sub(offset.unsigned_abs())
        }
    }

    /// Generates the next nonce value.
    ///
    /// Returns `max(last_nonce + 1, approx_server_time_ms())`. Thread-safe via
    /// CAS loop: concurrent callers never observe a duplicate.
    pub fn next(&self) -> u64 {
        let target = self.approx_server_time_ms();

        loop {
            let current = self.counter.load(Ordering::Acquire);
            let next_val = current.saturating_add(1).max(target);

            match self.counter.compare_exchange_weak(
                current,
                next_val,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next_val,
                Err(_) => continue,
            }
        }
    }

    /// Synchronizes with server time and updates the offset.
    ///
    /// # Errors
    /// Returns `NonceError::TimeDriftTooLarge` if drift exceeds 5 seconds. The
    /// offset and counter are left untouched in that case; the fault is for
    /// the host to act on.
    pub fn sync_with_server(&self, server_time_ms: u64) -> Result<(), NonceError> {
        let local_time = self.clock.now_ms();
        // Compared unsigned so no difference can overflow the check.
        let drift = server_time_ms.abs_diff(local_time);
        let magnitude = i64::try_from(drift).unwrap_or(i64::MAX);
        let offset = if server_time_ms >= local_time {
            magnitude
        } else {
            -magnitude
        };

        if drift > Self::DRIFT_ERROR_THRESHOLD_MS.unsigned_abs() {
            return Err(NonceError::TimeDriftTooLarge(offset));
        }

        if drift > Self::DRIFT_WARN_THRESHOLD_MS.unsigned_abs() {
            tracing::warn!(
                offset_ms = offset,
                "significant time drift detected with server"
            );
        }

        self.server_offset_ms.store(offset, Ordering::Release);
        self.last_sync_ms.store(local_time, Ordering::Release);

        self.fast_forward_counter(server_time_ms);

        Ok(())
    }

    /// Fast-forwards the counter to at least the given value.
    fn fast_forward_counter(&self, min_value: u64) {
        loop {
            let current = self.counter.load(Ordering::Acquire);
            if current >= min_value {
                break;
            }

            match self.counter.compare_exchange_weak(
                current,
                min_value,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(_) => continue,
            }
        }
    }

    /// Returns the current server offset in milliseconds.
    #[must_use]
    pub fn server_offset_ms(&self) -> i64 {
        self.server_offset_ms.load(Ordering::Acquire)
    }

    /// Returns the last sync timestamp in local time (0 if never synced).
    #[must_use]
    pub fn last_sync_ms(&self) -> u64 {
        self.last_sync_ms.load(Ordering::Acquire)
    }
}

impl NonceManager<SystemClock> {
    /// Creates a new `NonceManager` with the system clock.
    #[must_use]
    pub fn with_system_clock() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> std::fmt::Debug for NonceManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceManager")
            .field("counter", &self.counter.load(Ordering::Acquire))
            .field("server_offset_ms", &self.server_offset_ms())
            .field("last_sync_ms", &self.last_sync_ms())
            .finish()
    }
}
