use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::workflow::VerificationWorkflow;

/// Periodically starts visits whose scheduled time has passed.
pub struct VisitScheduler {
    workflow: Arc<VerificationWorkflow>,
    check_interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl VisitScheduler {
    pub fn new(
        workflow: Arc<VerificationWorkflow>,
        check_interval: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            workflow,
            check_interval,
            shutdown_rx,
        }
    }

    /// Run until shutdown is signalled or the sender is dropped.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        tracing::info!("visit scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn tick(&self) {
        match self.workflow.start_due_visits(Utc::now()).await {
            Ok(started) if !started.is_empty() => {
                tracing::info!(count = started.len(), "scheduled visits started");
            }
            Ok(_) => {}
            Err(e) => tracing::error!(%e, "failed to start due visits"),
        }
    }
}
