//! Paper collaborators: a marker signer and a simulated venue.
//!
//! Nothing here touches a real exchange. `PaperTransport` answers each
//! accepted write after a fixed latency and reports responses and
//! connection drops as [`PaperEvent`]s for the host loop to feed back into
//! the executor.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use strata_core::ActionBatch;
use strata_executor::{
    ActionSigner, BoxFuture, ResponseOutcome, SignError, SignedPayload, Transport, TransportError,
};

use crate::config::PaperConfig;

// ============================================================================
// PaperSigner
// ============================================================================

/// Builds a JSON body for the batch and stamps a non-cryptographic marker
/// in place of a signature.
#[derive(Debug, Clone, Default)]
pub struct PaperSigner;

impl PaperSigner {
    pub fn new() -> Self {
        Self
    }

    fn build_action(batch: &ActionBatch) -> serde_json::Value {
        let cancels: Vec<_> = batch
            .cancels()
            .map(|c| json!({ "market": c.market.to_string(), "oid": c.oid }))
            .collect();

        let orders: Vec<_> = batch
            .orders()
            .map(|o| {
                json!({
                    "cloid": o.cloid.as_str(),
                    "market": o.market.to_string(),
                    "side": o.side,
                    "price": o.price,
                    "size": o.size,
                    "reduce_only": o.reduce_only,
                })
            })
            .collect();

        json!({ "type": "batch", "cancels": cancels, "orders": orders })
    }

    fn marker(action: &serde_json::Value, nonce: u64) -> String {
        let mut hasher = DefaultHasher::new();
        action.to_string().hash(&mut hasher);
        nonce.hash(&mut hasher);
        format!("paper:{:016x}", hasher.finish())
    }
}

impl ActionSigner for PaperSigner {
    fn sign_and_build(
        &self,
        batch: &ActionBatch,
        nonce: u64,
        correlation_id: u64,
    ) -> Result<SignedPayload, SignError> {
        if batch.is_empty() {
            return Err(SignError::SerializationFailed("empty batch".to_string()));
        }

        let action = Self::build_action(batch);
        let signature = Self::marker(&action, nonce);

        Ok(SignedPayload {
            correlation_id,
            nonce,
            action,
            signature,
        })
    }
}

// ============================================================================
// PaperTransport
// ============================================================================

/// Something the simulated venue wants the host loop to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaperEvent {
    Response {
        correlation_id: u64,
        outcome: ResponseOutcome,
    },
    Disconnected,
}

/// Simulated venue connection.
#[derive(Debug)]
pub struct PaperTransport {
    config: PaperConfig,
    events: mpsc::UnboundedSender<PaperEvent>,
    send_count: AtomicU64,
    connected: Arc<AtomicBool>,
}

impl PaperTransport {
    pub fn new(config: PaperConfig) -> (Self, mpsc::UnboundedReceiver<PaperEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let transport = Self {
            config,
            events,
            send_count: AtomicU64::new(0),
            connected: Arc::new(AtomicBool::new(true)),
        };
        (transport, events_rx)
    }

    /// Number of send attempts so far, including dropped ones.
    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::Relaxed)
    }

    /// Bring the connection back after `reconnect_delay_ms`.
    pub fn schedule_reconnect(&self) {
        let connected = Arc::clone(&self.connected);
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            connected.store(true, Ordering::Release);
            debug!("paper venue reconnected");
        });
    }

    fn hits(every: u64, n: u64) -> bool {
        every > 0 && n % every == 0
    }
}

impl Transport for PaperTransport {
    fn send(&self, payload: SignedPayload) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            if !self.connected.load(Ordering::Acquire) {
                return Err(TransportError::Disconnected);
            }

            let n = self.send_count.fetch_add(1, Ordering::Relaxed) + 1;

            if Self::hits(self.config.disconnect_every, n) {
                warn!(send = n, correlation_id = payload.correlation_id, "paper venue dropped the connection");
                self.connected.store(false, Ordering::Release);
                if self.events.send(PaperEvent::Disconnected).is_err() {
                    debug!("paper event receiver gone");
                }
                return Err(TransportError::Disconnected);
            }

            let outcome = if Self::hits(self.config.reject_every, n) {
                ResponseOutcome::Rejected(format!("paper reject #{n}"))
            } else {
                ResponseOutcome::Accepted
            };

            let events = self.events.clone();
            let latency = Duration::from_millis(self.config.latency_ms);
            let correlation_id = payload.correlation_id;
            tokio::spawn(async move {
                tokio::time::sleep(latency).await;
                let _ = events.send(PaperEvent::Response {
                    correlation_id,
                    outcome,
                });
            });

            Ok(())
        })
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use strata_core::{ClientOrderId, MarketKey, OrderSide, PendingCancel, PendingOrder, Price, Size};

    fn sample_batch() -> ActionBatch {
        let market = MarketKey::from_indices(0, 2);
        let order = PendingOrder::new(
            ClientOrderId::from("strata_1_abcdef01".to_string()),
            market,
            OrderSide::Buy,
            Price::new(dec!(100.25)),
            Size::new(dec!(3)),
            false,
            0,
        );
        ActionBatch::from_tiers(vec![PendingCancel::new(market, 77, 0)], vec![], vec![order])
    }

    fn payload(correlation_id: u64) -> SignedPayload {
        PaperSigner::new()
            .sign_and_build(&sample_batch(), 1_000 + correlation_id, correlation_id)
            .unwrap()
    }

    #[test]
    fn test_signer_builds_action_body() {
        let payload = payload(1);

        assert_eq!(payload.correlation_id, 1);
        assert_eq!(payload.action["cancels"][0]["oid"], 77);
        assert_eq!(payload.action["orders"][0]["side"], "buy");
        assert_eq!(payload.action["orders"][0]["price"], "100.25");
        assert_eq!(payload.action["orders"][0]["market"], "0:2");
        assert!(payload.signature.starts_with("paper:"));
    }

    #[test]
    fn test_signer_marker_is_deterministic() {
        let signer = PaperSigner::new();
        let a = signer.sign_and_build(&sample_batch(), 5, 1).unwrap();
        let b = signer.sign_and_build(&sample_batch(), 5, 2).unwrap();
        let c = signer.sign_and_build(&sample_batch(), 6, 3).unwrap();

        assert_eq!(a.signature, b.signature);
        assert_ne!(a.signature, c.signature);
    }

    #[test]
    fn test_signer_refuses_empty_batch() {
        let empty = ActionBatch::from_tiers(vec![], vec![], vec![]);
        assert!(PaperSigner::new().sign_and_build(&empty, 1, 1).is_err());
    }

    #[tokio::test]
    async fn test_transport_accepts_then_rejects_every_nth() {
        let config = PaperConfig {
            latency_ms: 0,
            reject_every: 2,
            ..PaperConfig::default()
        };
        let (transport, mut events) = PaperTransport::new(config);

        assert!(transport.send(payload(1)).await.is_ok());
        assert!(transport.send(payload(2)).await.is_ok());

        let mut responses = vec![events.recv().await.unwrap(), events.recv().await.unwrap()];
        responses.sort_by_key(|e| match e {
            PaperEvent::Response { correlation_id, .. } => *correlation_id,
            PaperEvent::Disconnected => 0,
        });

        assert_eq!(
            responses,
            vec![
                PaperEvent::Response {
                    correlation_id: 1,
                    outcome: ResponseOutcome::Accepted,
                },
                PaperEvent::Response {
                    correlation_id: 2,
                    outcome: ResponseOutcome::Rejected("paper reject #2".to_string()),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_transport_disconnects_every_mth_send() {
        let config = PaperConfig {
            latency_ms: 0,
            disconnect_every: 2,
            reconnect_delay_ms: 0,
            ..PaperConfig::default()
        };
        let (transport, mut events) = PaperTransport::new(config);

        assert!(transport.send(payload(1)).await.is_ok());
        assert_eq!(
            transport.send(payload(2)).await,
            Err(TransportError::Disconnected)
        );
        assert!(!transport.is_ready());
        assert_eq!(
            transport.send(payload(3)).await,
            Err(TransportError::Disconnected)
        );
        assert_eq!(transport.send_count(), 2);

        let mut saw_disconnect = false;
        for _ in 0..2 {
            if events.recv().await.unwrap() == PaperEvent::Disconnected {
                saw_disconnect = true;
            }
        }
        assert!(saw_disconnect);

        transport.schedule_reconnect();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(transport.is_ready());
        assert!(transport.send(payload(4)).await.is_ok());
    }
}
