//! Emergency halt for new risk.
//!
//! `HardStopLatch` is a one-way switch shared by the queue and the executor
//! loop. While set, new orders are neither collected nor kept queued; cancels
//! and reduce-only orders keep flowing so positions can still be flattened.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, warn};

/// Context recorded by the first trigger.
#[derive(Debug, Clone)]
struct TriggerInfo {
    reason: String,
    at: Instant,
}

/// Hard stop latch for the emergency circuit breaker.
///
/// Stays triggered until an operator calls [`HardStopLatch::reset`].
/// Repeated triggers keep the original reason.
///
/// # Example
/// ```
/// use strata_executor::HardStopLatch;
///
/// let latch = HardStopLatch::new();
/// assert!(latch.trigger("margin breach"));
/// assert!(!latch.trigger("again"));
/// assert_eq!(latch.trigger_reason().as_deref(), Some("margin breach"));
/// ```
#[derive(Debug, Default)]
pub struct HardStopLatch {
    triggered: AtomicBool,
    info: Mutex<Option<TriggerInfo>>,
}

impl HardStopLatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Set the latch.
    ///
    /// Returns `true` only for the call that actually flipped it.
    pub fn trigger(&self, reason: &str) -> bool {
        let mut info = self.info.lock();
        if info.is_some() {
            return false;
        }

        // Reason is in place before the flag becomes visible.
        *info = Some(TriggerInfo {
            reason: reason.to_string(),
            at: Instant::now(),
        });
        self.triggered.store(true, Ordering::Release);
        drop(info);

        error!(reason, "HARD STOP TRIGGERED: new orders halted");
        true
    }

    #[must_use]
    pub fn trigger_reason(&self) -> Option<String> {
        self.info.lock().as_ref().map(|info| info.reason.clone())
    }

    /// Time since the first trigger, `None` while clear.
    #[must_use]
    pub fn elapsed_since_trigger(&self) -> Option<Duration> {
        self.info.lock().as_ref().map(|info| info.at.elapsed())
    }

    /// Clear the latch. Operator action only.
    pub fn reset(&self) {
        let previous = {
            let mut info = self.info.lock();
            self.triggered.store(false, Ordering::Release);
            info.take()
        };
        warn!(
            previous_reason = previous.as_ref().map(|i| i.reason.as_str()),
            "HardStop reset by operator, new orders resume"
        );
    }
}
