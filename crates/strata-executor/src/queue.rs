//! Three-tier action queue with priority and backpressure.
//!
//! This module implements the queue that sits between producers and the
//! executor tick:
//!
//! - Three capacity-bounded FIFO tiers (cancels > reduce_only > new_orders)
//! - Inflight-aware admission for new orders (hard limit + high watermark)
//! - Strict-priority collection of one batch per tick
//! - Front re-queue for recovered cancels and reduce-only orders
//!
//! Enqueue may be called from any thread; each tier is guarded by its own
//! short-held `parking_lot::Mutex`, and no lock is held across an `.await`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use strata_core::{ActionBatch, EnqueueResult, PendingCancel, PendingOrder};

use crate::error::{ExecutorError, ExecutorResult};
use crate::inflight::{InflightState, InflightTracker};
use crate::risk::HardStopLatch;

// ============================================================================
// QueueConfig
// ============================================================================

/// Configuration for the action queue and the tick that drains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Interval between ticks in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Hard cap on concurrently outstanding requests.
    #[serde(default = "default_inflight_limit")]
    pub inflight_limit: u32,
    /// Inflight level at which new orders are held back (degraded mode).
    #[serde(default = "default_inflight_high_watermark")]
    pub inflight_high_watermark: u32,
    /// Maximum cancels per batch.
    #[serde(default = "default_max_per_batch")]
    pub max_cancels_per_batch: usize,
    /// Maximum orders (reduce-only + new) per batch.
    #[serde(default = "default_max_per_batch")]
    pub max_orders_per_batch: usize,
    /// Capacity of the cancel queue.
    #[serde(default = "default_cancel_queue_capacity")]
    pub cancel_queue_capacity: usize,
    /// Capacity of the reduce_only order queue.
    #[serde(default = "default_reduce_only_queue_capacity")]
    pub reduce_only_queue_capacity: usize,
    /// Capacity of the new order queue.
    #[serde(default = "default_new_order_queue_capacity")]
    pub new_order_queue_capacity: usize,
    /// Age after which a pending request is resolved as timed out.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_interval_ms() -> u64 {
    100
}

fn default_inflight_limit() -> u32 {
    100
}

fn default_inflight_high_watermark() -> u32 {
    80
}

fn default_max_per_batch() -> usize {
    50
}

fn default_cancel_queue_capacity() -> usize {
    200
}

fn default_reduce_only_queue_capacity() -> usize {
    500
}

fn default_new_order_queue_capacity() -> usize {
    1000
}

fn default_request_timeout_ms() -> u64 {
    5000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            inflight_limit: default_inflight_limit(),
            inflight_high_watermark: default_inflight_high_watermark(),
            max_cancels_per_batch: default_max_per_batch(),
            max_orders_per_batch: default_max_per_batch(),
            cancel_queue_capacity: default_cancel_queue_capacity(),
            reduce_only_queue_capacity: default_reduce_only_queue_capacity(),
            new_order_queue_capacity: default_new_order_queue_capacity(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl QueueConfig {
    /// Tick interval as a `Duration`.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Reject configurations under which the scheduler cannot make progress.
    pub fn validate(&self) -> ExecutorResult<()> {
        let invalid = |msg: String| Err(ExecutorError::InvalidConfig(msg));

        if self.interval_ms == 0 {
            return invalid("interval_ms must be > 0".to_string());
        }
        if self.inflight_limit == 0 {
            return invalid("inflight_limit must be > 0".to_string());
        }
        if self.inflight_high_watermark > self.inflight_limit {
            return invalid(format!(
                "inflight_high_watermark ({}) must not exceed inflight_limit ({})",
                self.inflight_high_watermark, self.inflight_limit
            ));
        }
        if self.max_cancels_per_batch == 0 || self.max_orders_per_batch == 0 {
            return invalid("per-batch caps must be > 0".to_string());
        }
        if self.cancel_queue_capacity == 0
            || self.reduce_only_queue_capacity == 0
            || self.new_order_queue_capacity == 0
        {
            return invalid("queue capacities must be > 0".to_string());
        }
        if self.request_timeout_ms == 0 {
            return invalid("request_timeout_ms must be > 0".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// ActionQueue
// ============================================================================

/// Three-tier priority queue for cancels, reduce-only and new orders.
///
/// # Priority Rules
///
/// - At the inflight hard limit nothing is collected, cancels included:
///   every request consumes one slot, whatever it carries
/// - Otherwise a batch takes cancels first, then reduce-only orders
/// - New orders are only added while inflight is below the high watermark
///   and the hard stop latch is clear
///
/// Collection never touches the inflight counter; the executor increments
/// it only after the transport confirms the write.
#[derive(Debug)]
pub struct ActionQueue {
    /// Queue of pending cancel requests (highest priority).
    cancels: Mutex<VecDeque<PendingCancel>>,
    /// Queue of pending reduce-only orders (medium priority).
    reduce_only: Mutex<VecDeque<PendingOrder>>,
    /// Queue of pending new orders (lowest priority).
    new_orders: Mutex<VecDeque<PendingOrder>>,
    /// Shared inflight tracker, read for admission decisions.
    inflight: Arc<InflightTracker>,
    /// Hard stop latch for emergency mode.
    hard_stop: Arc<HardStopLatch>,
    config: QueueConfig,
}

impl ActionQueue {
    /// Create a new action queue.
    #[must_use]
    pub fn new(
        config: QueueConfig,
        inflight: Arc<InflightTracker>,
        hard_stop: Arc<HardStopLatch>,
    ) -> Self {
        Self {
            cancels: Mutex::new(VecDeque::with_capacity(config.cancel_queue_capacity)),
            reduce_only: Mutex::new(VecDeque::with_capacity(config.reduce_only_queue_capacity)),
            new_orders: Mutex::new(VecDeque::with_capacity(config.new_order_queue_capacity)),
            inflight,
            hard_stop,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Enqueue a new order.
    ///
    /// # Returns
    /// - `InflightFull` - inflight is at the hard limit (nothing queued)
    /// - `QueueFull` - tier capacity exceeded
    /// - `QueuedDegraded` - queued, but inflight is at or above the high
    ///   watermark so the order is likely to be delayed
    /// - `Queued` - queued
    pub fn enqueue_new_order(&self, order: PendingOrder) -> EnqueueResult {
        let inflight = self.inflight.current();
        let limit = self.inflight.limit();

        if inflight >= limit {
            debug!(
                cloid = %order.cloid,
                inflight,
                limit,
                "New order rejected: inflight at limit"
            );
            return EnqueueResult::InflightFull;
        }

        let mut queue = self.new_orders.lock();

        if queue.len() >= self.config.new_order_queue_capacity {
            debug!(
                cloid = %order.cloid,
                queue_len = queue.len(),
                capacity = self.config.new_order_queue_capacity,
                "New order rejected: queue full"
            );
            return EnqueueResult::QueueFull;
        }

        queue.push_back(order);

        if inflight >= self.config.inflight_high_watermark {
            EnqueueResult::QueuedDegraded
        } else {
            EnqueueResult::Queued
        }
    }

    /// Enqueue a reduce-only order.
    ///
    /// Accepted up to tier capacity regardless of inflight state. The order's
    /// `reduce_only` flag is forced on: anything in this tier is re-queued on
    /// transport failures and must never be able to open a position.
    ///
    /// # Returns
    /// - `Queued` - queued for submission
    /// - `QueueFull` - queue capacity exceeded (CRITICAL)
    pub fn enqueue_reduce_only(&self, mut order: PendingOrder) -> EnqueueResult {
        if !order.reduce_only {
            warn!(cloid = %order.cloid, "enqueue_reduce_only: forcing reduce_only flag");
            order.reduce_only = true;
        }

        let mut queue = self.reduce_only.lock();

        if queue.len() >= self.config.reduce_only_queue_capacity {
            error!(
                cloid = %order.cloid,
                market = %order.market,
                queue_len = queue.len(),
                capacity = self.config.reduce_only_queue_capacity,
                "CRITICAL: reduce_only queue full - cannot close position"
            );
            return EnqueueResult::QueueFull;
        }

        queue.push_back(order);
        EnqueueResult::Queued
    }

    /// Enqueue a cancel request.
    ///
    /// Never consults inflight state; only tier capacity can reject it.
    ///
    /// # Returns
    /// - `Queued` - queued for submission
    /// - `QueueFull` - queue capacity exceeded (CRITICAL)
    pub fn enqueue_cancel(&self, cancel: PendingCancel) -> EnqueueResult {
        let mut queue = self.cancels.lock();

        if queue.len() >= self.config.cancel_queue_capacity {
            error!(
                oid = cancel.oid,
                market = %cancel.market,
                queue_len = queue.len(),
                capacity = self.config.cancel_queue_capacity,
                "CRITICAL: cancel queue full - cancels cannot keep up"
            );
            return EnqueueResult::QueueFull;
        }

        queue.push_back(cancel);
        EnqueueResult::Queued
    }

    /// Collect the next batch under the given inflight state.
    ///
    /// Returns `None` at the hard limit or when nothing is eligible.
    #[must_use]
    pub fn collect(&self, state: InflightState) -> Option<ActionBatch> {
        if state.is_at_limit() {
            debug!(
                inflight = state.current,
                limit = state.limit,
                "collect: at inflight limit, returning None"
            );
            return None;
        }

        let cancels: Vec<_> = {
            let mut queue = self.cancels.lock();
            let n = queue.len().min(self.config.max_cancels_per_batch);
            queue.drain(..n).collect()
        };

        let max_orders = self.config.max_orders_per_batch;

        let reduce_only: Vec<_> = {
            let mut queue = self.reduce_only.lock();
            let n = queue.len().min(max_orders);
            queue.drain(..n).collect()
        };

        let is_high_watermark = state.current >= self.config.inflight_high_watermark;
        let is_hard_stop = self.hard_stop.is_triggered();

        let new_orders: Vec<_> = if !is_high_watermark && !is_hard_stop {
            let mut queue = self.new_orders.lock();
            let n = queue.len().min(max_orders - reduce_only.len());
            queue.drain(..n).collect()
        } else {
            if is_hard_stop {
                debug!("collect: HardStop active, skipping new_orders");
            } else {
                debug!(inflight = state.current, "collect: high watermark, skipping new_orders");
            }
            Vec::new()
        };

        if cancels.is_empty() && reduce_only.is_empty() && new_orders.is_empty() {
            return None;
        }

        let batch = ActionBatch::from_tiers(cancels, reduce_only, new_orders);
        let (c, r, n) = batch.counts();
        debug!(cancels = c, reduce_only = r, new_orders = n, "collect: returning batch");
        Some(batch)
    }

    /// Put recovered cancels back at the front of their queue.
    ///
    /// Capacity is not enforced here: a recovered cancel must not be lost.
    pub fn requeue_cancels(&self, cancels: Vec<PendingCancel>) {
        if cancels.is_empty() {
            return;
        }

        let mut queue = self.cancels.lock();
        for cancel in cancels.into_iter().rev() {
            queue.push_front(cancel);
        }

        if queue.len() > self.config.cancel_queue_capacity {
            warn!(
                queue_len = queue.len(),
                capacity = self.config.cancel_queue_capacity,
                "cancel queue over capacity after requeue"
            );
        }
    }

    /// Put recovered reduce-only orders back at the front of their queue.
    ///
    /// Capacity is not enforced here: a recovered reduce-only must not be lost.
    pub fn requeue_reduce_only(&self, orders: Vec<PendingOrder>) {
        if orders.is_empty() {
            return;
        }

        let mut queue = self.reduce_only.lock();
        for order in orders.into_iter().rev() {
            debug_assert!(order.reduce_only, "requeue_reduce_only with non-reduce_only order");
            queue.push_front(order);
        }

        if queue.len() > self.config.reduce_only_queue_capacity {
            warn!(
                queue_len = queue.len(),
                capacity = self.config.reduce_only_queue_capacity,
                "reduce_only queue over capacity after requeue"
            );
        }
    }

    /// Remove and return every queued new order (HardStop cleanup).
    #[must_use]
    pub fn drain_new_orders(&self) -> Vec<PendingOrder> {
        self.new_orders.lock().drain(..).collect()
    }

    /// Returns (cancels, reduce_only, new_orders) queue lengths.
    #[must_use]
    pub fn queue_lengths(&self) -> (usize, usize, usize) {
        let cancels = self.cancels.lock().len();
        let reduce_only = self.reduce_only.lock().len();
        let new_orders = self.new_orders.lock().len();
        (cancels, reduce_only, new_orders)
    }
}

// ============================================================================
// Tests
// ============================================================================
