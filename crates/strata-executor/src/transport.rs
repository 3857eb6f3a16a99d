//! Transport collaborator seam.
//!
//! The executor hands one `SignedPayload` per tick to a [`Transport`] and
//! only learns whether the write itself succeeded. Exchange responses and
//! connection loss come back later through `ExecutorLoop::on_response` and
//! `ExecutorLoop::on_disconnect`.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Write-level transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport disconnected")]
    Disconnected,

    #[error("rate limited")]
    RateLimited,

    #[error("io error: {0}")]
    Io(String),
}

impl TransportError {
    /// Transient conditions that a later attempt may get past.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Disconnected | Self::RateLimited)
    }
}

/// A signed, wire-ready request for exactly one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignedPayload {
    /// Local id used to match the exchange response.
    pub correlation_id: u64,
    /// Nonce the signature covers.
    pub nonce: u64,
    /// Action body as built by the signer.
    pub action: serde_json::Value,
    pub signature: String,
}

/// Single-attempt, fire-and-forget writer.
pub trait Transport: Send + Sync {
    /// Write the payload once. `Ok` means the write was accepted by the
    /// connection, not that the exchange accepted the action.
    fn send(&self, payload: SignedPayload) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Whether the connection can take a write right now.
    fn is_ready(&self) -> bool;
}

/// Arc wrapper for Transport trait objects.
pub type DynTransport = Arc<dyn Transport>;

/// Scriptable in-memory transport for tests.
///
/// Results queued with [`MockTransport::push_result`] are consumed one per
/// send; once the script is empty every send succeeds.
#[derive(Debug)]
pub struct MockTransport {
    sends: Mutex<Vec<SignedPayload>>,
    script: Mutex<VecDeque<Result<(), TransportError>>>,
    ready: AtomicBool,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sends: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            ready: AtomicBool::new(true),
        }
    }

    /// Queue the outcome of a future send.
    pub fn push_result(&self, result: Result<(), TransportError>) {
        self.script.lock().push_back(result);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Payloads seen so far, including the ones whose send failed.
    pub fn sends(&self) -> Vec<SignedPayload> {
        self.sends.lock().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().len()
    }
}

impl Transport for MockTransport {
    fn send(&self, payload: SignedPayload) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            self.sends.lock().push(payload);
            self.script.lock().pop_front().unwrap_or(Ok(()))
        })
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload(correlation_id: u64) -> SignedPayload {
        SignedPayload {
            correlation_id,
            nonce: 1_700_000_000_000 + correlation_id,
            action: serde_json::json!({ "type": "order", "orders": [] }),
            signature: "paper:0".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_transport_records_sends_and_follows_script() {
        let transport = MockTransport::new();
        transport.push_result(Err(TransportError::RateLimited));

        let first = transport.send(sample_payload(1)).await;
        let second = transport.send(sample_payload(2)).await;

        assert_eq!(first, Err(TransportError::RateLimited));
        assert_eq!(second, Ok(()));
        assert_eq!(
            transport.sends().iter().map(|p| p.correlation_id).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_mock_transport_ready_flag() {
        let transport = MockTransport::new();
        assert!(transport.is_ready());

        transport.set_ready(false);
        assert!(!transport.is_ready());
    }

    #[test]
    fn test_transport_error_retryable() {
        assert!(TransportError::Disconnected.is_retryable());
        assert!(TransportError::RateLimited.is_retryable());
        assert!(!TransportError::Io("broken pipe".to_string()).is_retryable());
    }

    #[tokio::test]
    async fn test_dyn_transport() {
        let transport: DynTransport = Arc::new(MockTransport::new());
        assert!(transport.send(sample_payload(7)).await.is_ok());
    }
}
