//! Executor loop for periodic batch processing.
//!
//! One `tick` per interval:
//! - Sweeps timed out requests
//! - Collects one batch from the action queue under the inflight budget
//! - Allocates correlation id and nonce, signs, registers, sends
//! - Takes an inflight slot only once the transport confirmed the write
//!
//! Responses and disconnects arrive through `on_response` and
//! `on_disconnect`. Every completion goes through the registry, which is the
//! only place that knows whether a slot has to be released.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use strata_core::{
    Action, ActionBatch, ClientOrderId, EnqueueResult, MarketKey, PendingCancel, PendingOrder,
};

use crate::error::ExecutorResult;
use crate::inflight::InflightTracker;
use crate::nonce::{Clock, NonceError, NonceManager, SystemClock};
use crate::queue::{ActionQueue, QueueConfig};
use crate::registry::{PendingRequestRegistry, Resolution};
use crate::risk::HardStopLatch;
use crate::signer::ActionSigner;
use crate::transport::DynTransport;

// ============================================================================
// Failures and responses
// ============================================================================

/// Why a new order did not make it to an accepted response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    SendError(String),
    Timeout,
    Disconnected,
    Rejected(String),
    SigningFailed(String),
    HardStop,
}

/// A new order handed back to the caller. It is never retried by the
/// executor; re-submitting is the caller's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderFailure {
    pub cloid: ClientOrderId,
    pub market: MarketKey,
    /// Request the order travelled in, if one was allocated and is known.
    pub correlation_id: Option<u64>,
    pub reason: FailureReason,
}

/// Exchange-level answer to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    Accepted,
    Rejected(String),
}

/// Point-in-time executor state for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    pub inflight: u32,
    pub inflight_limit: u32,
    pub pending_requests: usize,
    pub sent_requests: usize,
    pub queued_cancels: usize,
    pub queued_reduce_only: usize,
    pub queued_new_orders: usize,
    pub hard_stop: bool,
    /// Milliseconds since the hard stop fired, if it is set.
    pub hard_stop_elapsed_ms: Option<u64>,
}

// ============================================================================
// ExecutorLoop
// ============================================================================

/// The execution orchestrator.
pub struct ExecutorLoop<C: Clock = SystemClock> {
    nonce_manager: Arc<NonceManager<C>>,
    inflight: Arc<InflightTracker>,
    hard_stop: Arc<HardStopLatch>,
    queue: ActionQueue,
    registry: PendingRequestRegistry,
    signer: Arc<dyn ActionSigner>,
    transport: DynTransport,
    failures: mpsc::UnboundedSender<OrderFailure>,
    interval: Duration,
}

impl<C: Clock> ExecutorLoop<C> {
    /// Create a new executor loop.
    ///
    /// Returns the loop and the receiving end of the new-order failure
    /// channel.
    ///
    /// # Errors
    /// `ExecutorError::InvalidConfig` if the queue configuration is unusable.
    pub fn new(
        config: QueueConfig,
        nonce_manager: Arc<NonceManager<C>>,
        signer: Arc<dyn ActionSigner>,
        transport: DynTransport,
    ) -> ExecutorResult<(Self, mpsc::UnboundedReceiver<OrderFailure>)> {
        config.validate()?;

        let inflight = Arc::new(InflightTracker::new(config.inflight_limit));
        let hard_stop = Arc::new(HardStopLatch::new());
        let (failures, failures_rx) = mpsc::unbounded_channel();

        let executor = Self {
            interval: config.interval(),
            registry: PendingRequestRegistry::new(config.request_timeout_ms),
            queue: ActionQueue::new(config, Arc::clone(&inflight), Arc::clone(&hard_stop)),
            nonce_manager,
            inflight,
            hard_stop,
            signer,
            transport,
            failures,
        };
        Ok((executor, failures_rx))
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    #[must_use]
    pub fn registry(&self) -> &PendingRequestRegistry {
        &self.registry
    }

    #[must_use]
    pub fn inflight(&self) -> &Arc<InflightTracker> {
        &self.inflight
    }

    #[must_use]
    pub fn hard_stop(&self) -> &Arc<HardStopLatch> {
        &self.hard_stop
    }

    #[must_use]
    pub fn nonce_manager(&self) -> &Arc<NonceManager<C>> {
        &self.nonce_manager
    }

    // ------------------------------------------------------------------------
    // Enqueue
    // ------------------------------------------------------------------------

    pub fn enqueue_new_order(&self, order: PendingOrder) -> EnqueueResult {
        self.queue.enqueue_new_order(order)
    }

    pub fn enqueue_reduce_only(&self, order: PendingOrder) -> EnqueueResult {
        self.queue.enqueue_reduce_only(order)
    }

    pub fn enqueue_cancel(&self, cancel: PendingCancel) -> EnqueueResult {
        self.queue.enqueue_cancel(cancel)
    }

    /// Route an action to its tier.
    pub fn enqueue(&self, action: Action) -> EnqueueResult {
        match action {
            Action::Cancel(cancel) => self.enqueue_cancel(cancel),
            Action::ReduceOnly(order) => self.enqueue_reduce_only(order),
            Action::NewOrder(order) => self.enqueue_new_order(order),
        }
    }

    // ------------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------------

    /// Process one tick.
    ///
    /// Returns the correlation id of the request written to the transport,
    /// or `None` when nothing was sent.
    pub async fn tick(&self) -> Option<u64> {
        let now_ms = self.nonce_manager.clock().now_ms();

        // 1. Timeouts
        self.handle_timeouts(now_ms);

        // 2. New orders enqueued after a hard stop never leave the queue
        if self.hard_stop.is_triggered() {
            self.drop_queued_new_orders();
        }

        // 3. Collect
        let batch = self.queue.collect(self.inflight.snapshot())?;

        // 4. Allocate
        let correlation_id = self.registry.next_correlation_id();
        let nonce = self.nonce_manager.next();

        // 5. Build and sign
        let payload = match self.signer.sign_and_build(&batch, nonce, correlation_id) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(correlation_id, nonce, error = %e, "Failed to sign batch");
                self.recover(
                    vec![(Some(correlation_id), batch)],
                    FailureReason::SigningFailed(e.to_string()),
                );
                return None;
            }
        };

        // 6. Register (sent = false). Completion is driven through the
        // registry, so the handle is not awaited here.
        if let Err(e) = self.registry.register(correlation_id, nonce, batch.clone(), now_ms) {
            error!(correlation_id, error = %e, "Failed to register request");
            self.recover(
                vec![(Some(correlation_id), batch)],
                FailureReason::SendError(e.to_string()),
            );
            return None;
        }

        // 7. Send
        if !self.transport.is_ready() {
            debug!(correlation_id, "Transport not ready, skipping send");
            self.fail_send(correlation_id, "transport not ready".to_string());
            return None;
        }

        match self.transport.send(payload).await {
            Ok(()) => {
                self.on_confirmed_send(correlation_id);
                trace!(correlation_id, nonce, "Batch sent");
                Some(correlation_id)
            }
            Err(e) => {
                warn!(correlation_id, error = %e, retryable = e.is_retryable(), "Send failed");
                self.fail_send(correlation_id, e.to_string());
                None
            }
        }
    }

    /// Take the inflight slot for a written request.
    fn on_confirmed_send(&self, correlation_id: u64) {
        if !self.inflight.increment() {
            // Leave the entry unsent so no completion releases a slot it never had.
            error!(
                correlation_id,
                inflight = self.inflight.current(),
                limit = self.inflight.limit(),
                "Inflight increment failed after confirmed send"
            );
            return;
        }

        if !self.registry.mark_sent(correlation_id) {
            // A response or disconnect completed it while the write was in flight.
            self.inflight.decrement();
        }
    }

    fn fail_send(&self, correlation_id: u64, reason: String) {
        if let Some((batch, was_sent)) = self
            .registry
            .resolve(correlation_id, Resolution::SendError(reason.clone()))
        {
            if was_sent {
                self.inflight.decrement();
            }
            self.recover(vec![(Some(correlation_id), batch)], FailureReason::SendError(reason));
        }
    }

    fn handle_timeouts(&self, now_ms: u64) {
        let timed_out = self.registry.sweep_timeouts(now_ms);
        if timed_out.is_empty() {
            return;
        }

        let mut batches = Vec::with_capacity(timed_out.len());
        for (correlation_id, batch, was_sent) in timed_out {
            warn!(correlation_id, was_sent, items = batch.len(), "Request timed out");
            if was_sent {
                self.inflight.decrement();
            }
            batches.push((Some(correlation_id), batch));
        }

        self.recover(batches, FailureReason::Timeout);
    }

    // ------------------------------------------------------------------------
    // Transport callbacks
    // ------------------------------------------------------------------------

    /// Handle an exchange response.
    ///
    /// Returns `false` if the request was unknown or already completed.
    pub fn on_response(&self, correlation_id: u64, outcome: ResponseOutcome) -> bool {
        let resolution = match &outcome {
            ResponseOutcome::Accepted => Resolution::Accepted,
            ResponseOutcome::Rejected(reason) => Resolution::Rejected(reason.clone()),
        };

        let Some((batch, was_sent)) = self.registry.resolve(correlation_id, resolution) else {
            debug!(correlation_id, "Response for unknown or completed request");
            return false;
        };

        if was_sent {
            self.inflight.decrement();
        }

        if let ResponseOutcome::Rejected(reason) = outcome {
            self.handle_rejected(correlation_id, batch, reason);
        } else {
            trace!(correlation_id, "Request accepted");
        }
        true
    }

    /// A rejection is final: nothing is re-queued.
    fn handle_rejected(&self, correlation_id: u64, batch: ActionBatch, reason: String) {
        let (cancels, reduce_only, new_orders) = batch.split_for_recovery();

        for cancel in &cancels {
            error!(
                correlation_id,
                oid = cancel.oid,
                market = %cancel.market,
                reason = %reason,
                "Cancel rejected by exchange"
            );
        }
        for order in &reduce_only {
            error!(
                correlation_id,
                cloid = %order.cloid,
                market = %order.market,
                reason = %reason,
                "Reduce-only order rejected by exchange"
            );
        }
        if !new_orders.is_empty() {
            warn!(correlation_id, count = new_orders.len(), reason = %reason, "New orders rejected");
        }

        self.report_failures(Some(correlation_id), new_orders, &FailureReason::Rejected(reason));
    }

    /// Handle transport loss.
    ///
    /// Every pending request is resolved as disconnected and exactly as many
    /// inflight slots are released as were held. Returns the number of
    /// requests resolved.
    pub fn on_disconnect(&self) -> usize {
        let (batches, sent_count) = self.registry.resolve_all_on_disconnect();
        let resolved = batches.len();

        for _ in 0..sent_count {
            self.inflight.decrement();
        }

        warn!(
            resolved,
            sent_count,
            inflight = self.inflight.current(),
            "Disconnected, recovering pending requests"
        );

        self.recover(
            batches
                .into_iter()
                .map(|(correlation_id, batch)| (Some(correlation_id), batch))
                .collect(),
            FailureReason::Disconnected,
        );
        resolved
    }

    // ------------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------------

    /// Return guaranteed-delivery members to the front of their queues and
    /// report new orders.
    ///
    /// `batches` must be oldest first; the oldest request's items end up
    /// nearest the front.
    fn recover(&self, batches: Vec<(Option<u64>, ActionBatch)>, reason: FailureReason) {
        let mut requeue = Vec::with_capacity(batches.len());

        for (correlation_id, batch) in batches {
            let (cancels, reduce_only, new_orders) = batch.split_for_recovery();
            if !cancels.is_empty() || !reduce_only.is_empty() {
                debug!(
                    correlation_id,
                    cancels = cancels.len(),
                    reduce_only = reduce_only.len(),
                    ?reason,
                    "Requeuing guaranteed-delivery actions"
                );
            }
            self.report_failures(correlation_id, new_orders, &reason);
            requeue.push((cancels, reduce_only));
        }

        for (cancels, reduce_only) in requeue.into_iter().rev() {
            self.queue.requeue_cancels(cancels);
            self.queue.requeue_reduce_only(reduce_only);
        }
    }

    fn report_failures(
        &self,
        correlation_id: Option<u64>,
        orders: Vec<PendingOrder>,
        reason: &FailureReason,
    ) {
        for order in orders {
            let failure = OrderFailure {
                cloid: order.cloid,
                market: order.market,
                correlation_id,
                reason: reason.clone(),
            };
            if let Err(e) = self.failures.send(failure) {
                warn!(cloid = %e.0.cloid, "Order failure dropped: no receiver");
            }
        }
    }

    // ------------------------------------------------------------------------
    // Risk and clock
    // ------------------------------------------------------------------------

    /// Trigger the hard stop and drop every queued new order.
    ///
    /// Returns the number of new orders dropped.
    pub fn on_hard_stop(&self, reason: &str) -> usize {
        self.hard_stop.trigger(reason);
        self.drop_queued_new_orders()
    }

    fn drop_queued_new_orders(&self) -> usize {
        let dropped = self.queue.drain_new_orders();
        let count = dropped.len();
        if count > 0 {
            info!(count, "HardStop: dropping queued new orders");
            self.report_failures(None, dropped, &FailureReason::HardStop);
        }
        count
    }

    /// Re-anchor the nonce sequence to an observed server time.
    ///
    /// # Errors
    /// `NonceError::TimeDriftTooLarge` when the clocks are too far apart; the
    /// sequence is left as it was.
    pub fn on_server_time(&self, server_time_ms: u64) -> Result<(), NonceError> {
        self.nonce_manager
            .sync_with_server(server_time_ms)
            .map_err(|e| {
                error!(server_time_ms, error = %e, "Server time sync refused");
                e
            })
    }

    #[must_use]
    pub fn stats(&self) -> ExecutorStats {
        let (queued_cancels, queued_reduce_only, queued_new_orders) = self.queue.queue_lengths();
        ExecutorStats {
            inflight: self.inflight.current(),
            inflight_limit: self.inflight.limit(),
            pending_requests: self.registry.pending_count(),
            sent_requests: self.registry.sent_count(),
            queued_cancels,
            queued_reduce_only,
            queued_new_orders,
            hard_stop: self.hard_stop.is_triggered(),
            hard_stop_elapsed_ms: self
                .hard_stop
                .elapsed_since_trigger()
                .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}
