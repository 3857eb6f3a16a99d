//! Main application orchestration.
//!
//! Drives the executor on a fixed cadence against the paper venue:
//! - Executor tick every `executor.interval_ms`
//! - Demo producer feeding the queue
//! - Paper venue responses and disconnects fed back into the executor
//! - Periodic stats and server time sync
//! - Shutdown on Ctrl-C or after a fixed number of ticks

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use strata_executor::{
    Clock, ExecutorLoop, ExecutorStats, FailureReason, NonceManager, OrderFailure, SystemClock,
};

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::paper::{PaperEvent, PaperSigner, PaperTransport};
use crate::producer::DemoProducer;

/// Main application.
pub struct Application {
    config: AppConfig,
    executor: ExecutorLoop<SystemClock>,
    transport: Arc<PaperTransport>,
    failures_rx: mpsc::UnboundedReceiver<OrderFailure>,
    events_rx: mpsc::UnboundedReceiver<PaperEvent>,
    producer: DemoProducer,
}

impl Application {
    /// Wire the executor to the paper collaborators.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let (transport, events_rx) = PaperTransport::new(config.paper.clone());
        let transport = Arc::new(transport);

        let nonce_manager = Arc::new(NonceManager::with_system_clock());
        let (executor, failures_rx) = ExecutorLoop::new(
            config.executor.clone(),
            nonce_manager,
            Arc::new(PaperSigner::new()),
            transport.clone(),
        )?;

        let producer = DemoProducer::new(config.paper.market_keys()?);

        Ok(Self {
            config,
            executor,
            transport,
            failures_rx,
            events_rx,
            producer,
        })
    }

    /// Run until Ctrl-C, or until `max_ticks` ticks have been processed.
    ///
    /// Returns the final executor stats.
    pub async fn run(mut self, max_ticks: Option<u64>) -> AppResult<ExecutorStats> {
        info!(
            interval_ms = self.config.executor.interval_ms,
            inflight_limit = self.config.executor.inflight_limit,
            max_ticks,
            "Starting executor loop"
        );

        let mut tick_interval = tokio::time::interval(self.executor.interval());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut producer_interval =
            tokio::time::interval(Duration::from_millis(self.config.paper.producer_interval_ms));
        producer_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut stats_interval =
            tokio::time::interval(Duration::from_millis(self.config.telemetry.stats_interval_ms));

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        let mut ticks = 0u64;
        let mut sent = 0u64;

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    if self.executor.tick().await.is_some() {
                        sent += 1;
                    }
                    ticks += 1;

                    if self.config.paper.hard_stop_after_ticks == Some(ticks) {
                        let dropped = self.executor.on_hard_stop("paper: scheduled hard stop");
                        warn!(ticks, dropped, "Hard stop triggered");
                    }

                    if max_ticks.is_some_and(|max| ticks >= max) {
                        info!(ticks, "Tick budget reached");
                        break;
                    }
                }

                _ = producer_interval.tick() => {
                    self.produce();
                }

                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event);
                }

                Some(failure) = self.failures_rx.recv() => {
                    Self::log_failure(&failure);
                }

                _ = stats_interval.tick() => {
                    self.sync_server_time();
                    self.log_stats();
                }

                result = &mut shutdown => {
                    result?;
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        // Report whatever failed on the way out.
        while let Ok(failure) = self.failures_rx.try_recv() {
            Self::log_failure(&failure);
        }

        let stats = self.executor.stats();
        info!(ticks, sent, stats = ?stats, "Shutting down");
        Ok(stats)
    }

    fn produce(&mut self) {
        let now_ms = self.executor.nonce_manager().clock().now_ms();
        let Some(action) = self.producer.next_action(now_ms) else {
            return;
        };

        let kind = action.kind();
        let result = self.executor.enqueue(action);
        if result.is_queued() {
            debug!(?kind, ?result, "Demo action queued");
        } else {
            warn!(?kind, ?result, "Demo action refused");
        }
    }

    fn handle_event(&self, event: PaperEvent) {
        match event {
            PaperEvent::Response {
                correlation_id,
                outcome,
            } => {
                if !self.executor.on_response(correlation_id, outcome) {
                    debug!(correlation_id, "Late response ignored");
                }
            }
            PaperEvent::Disconnected => {
                let resolved = self.executor.on_disconnect();
                info!(resolved, "Paper venue disconnected, reconnect scheduled");
                self.transport.schedule_reconnect();
            }
        }
    }

    /// The paper venue's clock is local time shifted by `clock_skew_ms`.
    fn sync_server_time(&self) {
        let local = self.executor.nonce_manager().clock().now_ms();
        let server = local.saturating_add_signed(self.config.paper.clock_skew_ms);
        if let Err(e) = self.executor.on_server_time(server) {
            warn!(error = %e, "Server time not applied");
        }
    }

    fn log_stats(&self) {
        let stats = self.executor.stats();
        match serde_json::to_string(&stats) {
            Ok(json) => info!(stats = %json, "Executor stats"),
            Err(e) => warn!(error = %e, "Failed to serialize executor stats"),
        }
    }

    fn log_failure(failure: &OrderFailure) {
        match &failure.reason {
            FailureReason::HardStop => debug!(
                cloid = %failure.cloid,
                market = %failure.market,
                "New order dropped by hard stop"
            ),
            reason => warn!(
                cloid = %failure.cloid,
                market = %failure.market,
                correlation_id = failure.correlation_id,
                reason = ?reason,
                "New order failed"
            ),
        }
    }
}
