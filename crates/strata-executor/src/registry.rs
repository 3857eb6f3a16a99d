//! Pending request registry.
//!
//! Every collected batch is registered here under its correlation id before
//! the network write is attempted, and stays until exactly one completion
//! removes it: an exchange response, the timeout sweep or a disconnect.
//! Whether the entry was marked sent at removal time is what the caller uses
//! to decide whether an inflight slot must be released.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use strata_core::ActionBatch;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("correlation id {0} is already registered")]
    DuplicateCorrelationId(u64),
}

/// How a pending request was completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Resolution {
    Accepted,
    Rejected(String),
    SendError(String),
    Timeout,
    Disconnected,
}

/// A registered request awaiting completion.
pub struct PendingRequest {
    pub correlation_id: u64,
    pub nonce: u64,
    pub batch: ActionBatch,
    /// Registration time (Unix milliseconds).
    pub created_at: u64,
    /// Set only once the transport confirmed the write.
    pub sent: bool,
    /// Completion handle (consumed on first use).
    tx: Option<oneshot::Sender<Resolution>>,
}

impl PendingRequest {
    fn complete(mut self, resolution: Resolution) -> (ActionBatch, bool) {
        if let Some(tx) = self.tx.take() {
            // The caller may have dropped its receiver.
            let _ = tx.send(resolution);
        }
        (self.batch, self.sent)
    }
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("correlation_id", &self.correlation_id)
            .field("nonce", &self.nonce)
            .field("items", &self.batch.len())
            .field("created_at", &self.created_at)
            .field("sent", &self.sent)
            .field("has_tx", &self.tx.is_some())
            .finish()
    }
}

/// Tracks every registered request by correlation id.
#[derive(Debug)]
pub struct PendingRequestRegistry {
    pending: DashMap<u64, PendingRequest>,
    next_correlation_id: AtomicU64,
    timeout_ms: u64,
}

impl PendingRequestRegistry {
    /// # Arguments
    /// * `timeout_ms` - Age after which `sweep_timeouts` resolves an entry
    #[must_use]
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            pending: DashMap::new(),
            next_correlation_id: AtomicU64::new(1),
            timeout_ms,
        }
    }

    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Allocate a fresh correlation id. Ids start at 1 and never repeat.
    pub fn next_correlation_id(&self) -> u64 {
        self.next_correlation_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a batch with `sent = false`.
    ///
    /// Returns the receiving half of the completion handle. An id already in
    /// the registry is refused and the existing entry is left untouched.
    ///
    /// The handle is optional. Accounting does not depend on it, and a
    /// dropped receiver only means nobody observes the `Resolution`.
    pub fn register(
        &self,
        correlation_id: u64,
        nonce: u64,
        batch: ActionBatch,
        now_ms: u64,
    ) -> Result<oneshot::Receiver<Resolution>, RegistryError> {
        match self.pending.entry(correlation_id) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateCorrelationId(correlation_id)),
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(PendingRequest {
                    correlation_id,
                    nonce,
                    batch,
                    created_at: now_ms,
                    sent: false,
                    tx: Some(tx),
                });
                Ok(rx)
            }
        }
    }

    /// Flip an entry to `sent = true`.
    ///
    /// Returns `false` if the entry is gone (already resolved) or was already
    /// marked; in both cases the caller must not hold an inflight slot for it.
    pub fn mark_sent(&self, correlation_id: u64) -> bool {
        match self.pending.get_mut(&correlation_id) {
            Some(mut entry) if !entry.sent => {
                entry.sent = true;
                true
            }
            Some(_) => {
                warn!(correlation_id, "mark_sent called twice");
                false
            }
            None => {
                debug!(correlation_id, "mark_sent: request already resolved");
                false
            }
        }
    }

    /// Remove an entry and fire its handle.
    ///
    /// Returns the batch and whether it had been marked sent, or `None` when
    /// another completion got there first.
    pub fn resolve(&self, correlation_id: u64, resolution: Resolution) -> Option<(ActionBatch, bool)> {
        let (_, request) = self.pending.remove(&correlation_id)?;
        debug!(correlation_id, sent = request.sent, ?resolution, "request resolved");
        Some(request.complete(resolution))
    }

    /// Resolve every entry registered at least `timeout_ms` ago as `Timeout`,
    /// whether or not it was sent.
    ///
    /// Results are ordered by correlation id (oldest first).
    pub fn sweep_timeouts(&self, now_ms: u64) -> Vec<(u64, ActionBatch, bool)> {
        let expired: Vec<u64> = self
            .pending
            .iter()
            .filter(|entry| now_ms.saturating_sub(entry.created_at) >= self.timeout_ms)
            .map(|entry| *entry.key())
            .collect();

        let mut timed_out: Vec<_> = expired
            .into_iter()
            .filter_map(|id| {
                self.pending
                    .remove(&id)
                    .map(|(_, request)| {
                        let (batch, sent) = request.complete(Resolution::Timeout);
                        (id, batch, sent)
                    })
            })
            .collect();

        timed_out.sort_by_key(|(id, _, _)| *id);
        timed_out
    }

    /// Resolve everything as `Disconnected`.
    ///
    /// Returns `(correlation_id, batch)` pairs ordered by correlation id
    /// (oldest first) and how many of them had been marked sent, which is
    /// exactly the number of inflight slots to release.
    pub fn resolve_all_on_disconnect(&self) -> (Vec<(u64, ActionBatch)>, usize) {
        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();

        let mut resolved: Vec<(u64, ActionBatch, bool)> = ids
            .into_iter()
            .filter_map(|id| {
                self.pending.remove(&id).map(|(_, request)| {
                    let (batch, sent) = request.complete(Resolution::Disconnected);
                    (id, batch, sent)
                })
            })
            .collect();
        resolved.sort_by_key(|(id, _, _)| *id);

        let sent_count = resolved.iter().filter(|(_, _, sent)| *sent).count();
        let batches = resolved.into_iter().map(|(id, batch, _)| (id, batch)).collect();
        (batches, sent_count)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of entries currently marked sent.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.pending.iter().filter(|entry| entry.sent).count()
    }

    #[must_use]
    pub fn contains(&self, correlation_id: u64) -> bool {
        self.pending.contains_key(&correlation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use strata_core::{ClientOrderId, MarketKey, OrderSide, PendingCancel, PendingOrder, Price, Size};

    fn sample_batch() -> ActionBatch {
        let market = MarketKey::from_indices(0, 3);
        let order = PendingOrder::new(
            ClientOrderId::new(),
            market,
            OrderSide::Sell,
            Price::new(dec!(101.5)),
            Size::new(dec!(2)),
            true,
            0,
        );
        ActionBatch::from_tiers(vec![PendingCancel::new(market, 11, 0)], vec![order], vec![])
    }

    #[test]
    fn test_correlation_ids_start_at_one_and_increase() {
        let registry = PendingRequestRegistry::new(5000);
        assert_eq!(registry.next_correlation_id(), 1);
        assert_eq!(registry.next_correlation_id(), 2);
        assert_eq!(registry.next_correlation_id(), 3);
    }

    #[test]
    fn test_register_starts_unsent() {
        let registry = PendingRequestRegistry::new(5000);
        let _rx = registry.register(1, 100, sample_batch(), 0).unwrap();

        assert_eq!(registry.pending_count(), 1);
        assert_eq!(registry.sent_count(), 0);
        assert!(registry.contains(1));
    }

    #[test]
    fn test_register_duplicate_keeps_existing_entry() {
        let registry = PendingRequestRegistry::new(5000);
        let _rx = registry.register(1, 100, sample_batch(), 0).unwrap();
        assert!(registry.mark_sent(1));

        let err = registry.register(1, 200, sample_batch(), 10).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateCorrelationId(1));
        assert_eq!(registry.sent_count(), 1);
    }

    #[test]
    fn test_mark_sent_transitions_once() {
        let registry = PendingRequestRegistry::new(5000);
        let _rx = registry.register(1, 100, sample_batch(), 0).unwrap();

        assert!(registry.mark_sent(1));
        assert!(!registry.mark_sent(1));
        assert!(!registry.mark_sent(42));
        assert_eq!(registry.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_resolve_reports_was_sent_and_fires_handle() {
        let registry = PendingRequestRegistry::new(5000);
        let rx = registry.register(1, 100, sample_batch(), 0).unwrap();
        registry.mark_sent(1);

        let (batch, was_sent) = registry.resolve(1, Resolution::Accepted).unwrap();
        assert!(was_sent);
        assert_eq!(batch.counts(), (1, 1, 0));
        assert_eq!(rx.await.unwrap(), Resolution::Accepted);

        // Second completion finds nothing.
        assert!(registry.resolve(1, Resolution::Timeout).is_none());
    }

    #[test]
    fn test_resolve_unsent_entry() {
        let registry = PendingRequestRegistry::new(5000);
        let _rx = registry.register(1, 100, sample_batch(), 0).unwrap();

        let (_, was_sent) = registry
            .resolve(1, Resolution::SendError("broken pipe".to_string()))
            .unwrap();
        assert!(!was_sent);
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn test_resolve_with_dropped_receiver() {
        let registry = PendingRequestRegistry::new(5000);
        drop(registry.register(1, 100, sample_batch(), 0).unwrap());

        assert!(registry.resolve(1, Resolution::Accepted).is_some());
    }

    #[tokio::test]
    async fn test_sweep_timeouts_sent_and_unsent() {
        let registry = PendingRequestRegistry::new(5000);
        let rx1 = registry.register(1, 100, sample_batch(), 1_000).unwrap();
        let _rx2 = registry.register(2, 101, sample_batch(), 2_000).unwrap();
        let _rx3 = registry.register(3, 102, sample_batch(), 5_000).unwrap();
        registry.mark_sent(2);

        assert!(registry.sweep_timeouts(5_999).is_empty());

        let expired = registry.sweep_timeouts(7_000);
        let summary: Vec<_> = expired.iter().map(|(id, _, sent)| (*id, *sent)).collect();
        assert_eq!(summary, vec![(1, false), (2, true)]);
        assert_eq!(rx1.await.unwrap(), Resolution::Timeout);
        assert_eq!(registry.pending_count(), 1);
        assert!(registry.contains(3));
    }

    #[tokio::test]
    async fn test_resolve_all_on_disconnect() {
        let registry = PendingRequestRegistry::new(5000);
        let rxs: Vec<_> = (1..=3)
            .map(|id| registry.register(id, 100 + id, sample_batch(), 0).unwrap())
            .collect();
        registry.mark_sent(1);
        registry.mark_sent(3);

        let (batches, sent_count) = registry.resolve_all_on_disconnect();

        let ids: Vec<_> = batches.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(sent_count, 2);
        assert_eq!(registry.pending_count(), 0);
        for rx in rxs {
            assert_eq!(rx.await.unwrap(), Resolution::Disconnected);
        }
    }

    #[tokio::test]
    async fn test_send_error_after_mark_sent_reports_was_sent() {
        let registry = PendingRequestRegistry::new(5000);
        let rx = registry.register(1, 100, sample_batch(), 0).unwrap();
        assert!(registry.mark_sent(1));

        let (batch, was_sent) = registry
            .resolve(1, Resolution::SendError("reset by peer".to_string()))
            .unwrap();

        // The caller owes exactly one inflight release for this entry.
        assert!(was_sent);
        assert_eq!(batch.counts(), (1, 1, 0));
        assert_eq!(registry.sent_count(), 0);
        assert_eq!(
            rx.await.unwrap(),
            Resolution::SendError("reset by peer".to_string())
        );
    }
}
