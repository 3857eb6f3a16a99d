//! Execution-related types for the action scheduler.
//!
//! This module provides types for:
//! - Pending order/cancel payloads
//! - Tagged actions and their priority tier
//! - Action batching (one batch = one request = one nonce)
//! - Enqueue results

use serde::{Deserialize, Serialize};

use crate::market::MarketKey;
use crate::order::{ClientOrderId, OrderSide};
use crate::{Price, Size};

// ============================================================================
// Pending Order Types
// ============================================================================

/// Order waiting to be submitted to the exchange.
///
/// Used for both the reduce-only and the new-order tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOrder {
    /// Client order ID for idempotency.
    pub cloid: ClientOrderId,
    /// Target market.
    pub market: MarketKey,
    /// Order side (buy/sell).
    pub side: OrderSide,
    /// Limit price.
    pub price: Price,
    /// Order size.
    pub size: Size,
    /// Whether this is a reduce-only order.
    pub reduce_only: bool,
    /// Creation timestamp (Unix milliseconds).
    pub created_at: u64,
}

impl PendingOrder {
    /// Create a new pending order.
    #[must_use]
    pub fn new(
        cloid: ClientOrderId,
        market: MarketKey,
        side: OrderSide,
        price: Price,
        size: Size,
        reduce_only: bool,
        created_at: u64,
    ) -> Self {
        Self {
            cloid,
            market,
            side,
            price,
            size,
            reduce_only,
            created_at,
        }
    }
}

/// Cancel request waiting to be submitted to the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCancel {
    /// Target market.
    pub market: MarketKey,
    /// Exchange order ID to cancel.
    pub oid: u64,
    /// Creation timestamp (Unix milliseconds).
    pub created_at: u64,
}

impl PendingCancel {
    /// Create a new pending cancel request.
    #[must_use]
    pub fn new(market: MarketKey, oid: u64, created_at: u64) -> Self {
        Self {
            market,
            oid,
            created_at,
        }
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Priority tier of an action.
///
/// Variants are declared in priority order, so `Ord` sorts the most urgent
/// tier first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Cancel,
    ReduceOnly,
    NewOrder,
}

/// A caller-supplied unit of work, tagged by tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Action {
    Cancel(PendingCancel),
    ReduceOnly(PendingOrder),
    NewOrder(PendingOrder),
}

impl Action {
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Cancel(_) => ActionKind::Cancel,
            Self::ReduceOnly(_) => ActionKind::ReduceOnly,
            Self::NewOrder(_) => ActionKind::NewOrder,
        }
    }

    #[must_use]
    pub fn market(&self) -> MarketKey {
        match self {
            Self::Cancel(cancel) => cancel.market,
            Self::ReduceOnly(order) | Self::NewOrder(order) => order.market,
        }
    }
}

// ============================================================================
// Action Batching
// ============================================================================

/// Everything collected for exactly one outbound request.
///
/// Items are always ordered cancels, then reduce-only orders, then new
/// orders. A batch is the unit of nonce allocation, signing and inflight
/// accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionBatch {
    items: Vec<Action>,
}

impl ActionBatch {
    /// Build a batch from the three tiers, preserving tier priority and the
    /// FIFO order within each tier.
    #[must_use]
    pub fn from_tiers(
        cancels: Vec<PendingCancel>,
        reduce_only: Vec<PendingOrder>,
        new_orders: Vec<PendingOrder>,
    ) -> Self {
        let mut items = Vec::with_capacity(cancels.len() + reduce_only.len() + new_orders.len());
        items.extend(cancels.into_iter().map(Action::Cancel));
        items.extend(reduce_only.into_iter().map(Action::ReduceOnly));
        items.extend(new_orders.into_iter().map(Action::NewOrder));
        Self { items }
    }

    /// The ordered items of this batch.
    #[must_use]
    pub fn items(&self) -> &[Action] {
        &self.items
    }

    /// Returns true if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of items in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Cancel entries, in order.
    pub fn cancels(&self) -> impl Iterator<Item = &PendingCancel> {
        self.items.iter().filter_map(|action| match action {
            Action::Cancel(cancel) => Some(cancel),
            _ => None,
        })
    }

    /// Order entries (reduce-only first, then new orders), in order.
    pub fn orders(&self) -> impl Iterator<Item = &PendingOrder> {
        self.items.iter().filter_map(|action| match action {
            Action::ReduceOnly(order) | Action::NewOrder(order) => Some(order),
            Action::Cancel(_) => None,
        })
    }

    /// Returns (cancels, reduce_only, new_orders) counts.
    #[must_use]
    pub fn counts(&self) -> (usize, usize, usize) {
        self.items
            .iter()
            .fold((0, 0, 0), |(c, r, n), action| match action.kind() {
                ActionKind::Cancel => (c + 1, r, n),
                ActionKind::ReduceOnly => (c, r + 1, n),
                ActionKind::NewOrder => (c, r, n + 1),
            })
    }

    /// Split the batch back into its tiers.
    ///
    /// Used on recovery: cancels and reduce-only orders go back to their
    /// queues, new orders are reported to the caller.
    #[must_use]
    pub fn split_for_recovery(self) -> (Vec<PendingCancel>, Vec<PendingOrder>, Vec<PendingOrder>) {
        let mut cancels = Vec::new();
        let mut reduce_only = Vec::new();
        let mut new_orders = Vec::new();

        for action in self.items {
            match action {
                Action::Cancel(cancel) => cancels.push(cancel),
                Action::ReduceOnly(order) => reduce_only.push(order),
                Action::NewOrder(order) => new_orders.push(order),
            }
        }

        (cancels, reduce_only, new_orders)
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result of attempting to enqueue an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnqueueResult {
    /// Action successfully queued.
    Queued,
    /// New order queued while inflight is at or above the high watermark;
    /// it is likely to be delayed.
    QueuedDegraded,
    /// Tier queue is full, action rejected.
    QueueFull,
    /// Inflight count is at the hard limit, new order rejected.
    InflightFull,
}

impl EnqueueResult {
    /// Returns true if the action was successfully queued.
    #[must_use]
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued | Self::QueuedDegraded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_market() -> MarketKey {
        MarketKey::from_indices(0, 7)
    }

    fn sample_order(reduce_only: bool) -> PendingOrder {
        PendingOrder::new(
            ClientOrderId::new(),
            sample_market(),
            OrderSide::Sell,
            Price::new(dec!(50000)),
            Size::new(dec!(0.1)),
            reduce_only,
            1_700_000_000_000,
        )
    }

    fn sample_cancel(oid: u64) -> PendingCancel {
        PendingCancel::new(sample_market(), oid, 1_700_000_000_000)
    }

    #[test]
    fn test_batch_from_tiers_orders_by_priority() {
        let batch = ActionBatch::from_tiers(
            vec![sample_cancel(1), sample_cancel(2)],
            vec![sample_order(true)],
            vec![sample_order(false)],
        );

        let kinds: Vec<_> = batch.items().iter().map(Action::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::Cancel,
                ActionKind::Cancel,
                ActionKind::ReduceOnly,
                ActionKind::NewOrder
            ]
        );
        assert_eq!(batch.counts(), (2, 1, 1));
        assert_eq!(batch.len(), 4);
        assert_eq!(batch.cancels().map(|c| c.oid).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(batch.orders().count(), 2);
    }

    #[test]
    fn test_split_for_recovery_preserves_tier_order() {
        let ro1 = sample_order(true);
        let ro2 = sample_order(true);
        let new = sample_order(false);

        let batch = ActionBatch::from_tiers(
            vec![sample_cancel(9)],
            vec![ro1.clone(), ro2.clone()],
            vec![new.clone()],
        );

        let (cancels, reduce_only, new_orders) = batch.split_for_recovery();
        assert_eq!(cancels, vec![sample_cancel(9)]);
        assert_eq!(reduce_only, vec![ro1, ro2]);
        assert_eq!(new_orders, vec![new]);
    }

    #[test]
    fn test_action_kind_priority_order() {
        assert!(ActionKind::Cancel < ActionKind::ReduceOnly);
        assert!(ActionKind::ReduceOnly < ActionKind::NewOrder);
    }

    #[test]
    fn test_empty_batch() {
        let batch = ActionBatch::from_tiers(vec![], vec![], vec![]);
        assert!(batch.is_empty());
        assert_eq!(batch.counts(), (0, 0, 0));
    }

    #[test]
    fn test_enqueue_result_is_queued() {
        assert!(EnqueueResult::Queued.is_queued());
        assert!(EnqueueResult::QueuedDegraded.is_queued());
        assert!(!EnqueueResult::QueueFull.is_queued());
        assert!(!EnqueueResult::InflightFull.is_queued());
    }

    #[test]
    fn test_action_serializes_with_kind_tag() {
        let action = Action::Cancel(sample_cancel(5));
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "cancel");
        assert_eq!(json["payload"]["oid"], 5);
    }
}
