//! Priority-aware execution scheduler for a rate-limited exchange connection.
//!
//! Turns cancel, reduce-only and new-order intents into nonce-stamped,
//! signed requests over a single logical connection, one batch per tick,
//! under a hard cap on outstanding requests.
//!
//! # Key Components
//!
//! - [`NonceManager`]: Strictly monotonic, server-anchored nonces
//! - [`InflightTracker`]: Bounded counter of requests awaiting a response
//! - [`ActionQueue`]: Three-tier priority queue (cancel > reduce-only > new order)
//! - [`PendingRequestRegistry`]: Request lifecycle by correlation id
//! - [`ExecutorLoop`]: Tick orchestration and failure recovery
//! - [`HardStopLatch`]: Emergency halt for new orders
//!
//! # Recovery Rules
//!
//! | Outcome | Inflight | Cancel / reduce-only | New order |
//! |---|---|---|---|
//! | Accepted | release if sent | - | - |
//! | Rejected | release if sent | logged, dropped | reported |
//! | Send error / timeout / disconnect | release if sent | front re-queue | reported |

pub mod error;
pub mod executor_loop;
pub mod inflight;
pub mod nonce;
pub mod queue;
pub mod registry;
pub mod risk;
pub mod signer;
pub mod transport;

// Error types
pub use error::{ExecutorError, ExecutorResult};

// Executor loop
pub use executor_loop::{ExecutorLoop, ExecutorStats, FailureReason, OrderFailure, ResponseOutcome};

// Accounting
pub use inflight::{InflightState, InflightTracker};
pub use nonce::{Clock, ManualClock, NonceError, NonceManager, SystemClock};

// Scheduling
pub use queue::{ActionQueue, QueueConfig};
pub use registry::{PendingRequest, PendingRequestRegistry, RegistryError, Resolution};

// Risk management
pub use risk::HardStopLatch;

// Collaborators
pub use signer::{ActionSigner, SignError};
pub use transport::{BoxFuture, DynTransport, MockTransport, SignedPayload, Transport, TransportError};
