//! Demo action producer for paper runs.
//!
//! Emits a fixed rotation of three new orders, one reduce-only and one
//! cancel per cycle, spread over the configured markets.

use rust_decimal::Decimal;

use strata_core::{
    Action, ClientOrderId, MarketKey, OrderSide, PendingCancel, PendingOrder, Price, Size,
};

const CYCLE: u64 = 5;

#[derive(Debug)]
pub struct DemoProducer {
    markets: Vec<MarketKey>,
    step: u64,
}

impl DemoProducer {
    pub fn new(markets: Vec<MarketKey>) -> Self {
        Self { markets, step: 0 }
    }

    /// Next action of the rotation. `None` if no markets are configured.
    pub fn next_action(&mut self, now_ms: u64) -> Option<Action> {
        if self.markets.is_empty() {
            return None;
        }

        let step = self.step;
        self.step += 1;

        let market = self.markets[(step as usize) % self.markets.len()];
        let side = if step % 2 == 0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };

        let action = match step % CYCLE {
            0..=2 => Action::NewOrder(Self::order(market, side, false, step, now_ms)),
            3 => Action::ReduceOnly(Self::order(market, side.opposite(), true, step, now_ms)),
            _ => Action::Cancel(PendingCancel::new(market, step, now_ms)),
        };
        Some(action)
    }

    fn order(market: MarketKey, side: OrderSide, reduce_only: bool, step: u64, now_ms: u64) -> PendingOrder {
        // 100.00 + 0.05 * (step % 20)
        let price = Decimal::new(10_000 + 5 * (step % 20) as i64, 2);
        PendingOrder::new(
            ClientOrderId::new(),
            market,
            side,
            Price::new(price),
            Size::new(Decimal::new(1, 1)),
            reduce_only,
            now_ms,
        )
    }
}
