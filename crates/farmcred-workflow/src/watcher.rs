use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use farmcred_types::{FarmCredError, RequestStatus};

use crate::workflow::VerificationWorkflow;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// A status observed by a [`StatusWatcher`]. `previous` is `None` for the
/// first observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub request_id: Uuid,
    pub previous: Option<RequestStatus>,
    pub status: RequestStatus,
    pub observed_at: DateTime<Utc>,
}

/// Polls one request at a fixed interval and reports status changes.
///
/// Stops once a terminal status has been reported, the receiver is dropped,
/// the request disappears, or shutdown is signalled. Lookup errors are
/// logged and retried on the next tick.
pub struct StatusWatcher {
    workflow: Arc<VerificationWorkflow>,
    request_id: Uuid,
    poll_interval: Duration,
}

impl StatusWatcher {
    pub fn new(workflow: Arc<VerificationWorkflow>, request_id: Uuid) -> Self {
        Self {
            workflow,
            request_id,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn spawn(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (mpsc::Receiver<StatusChange>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(self.run(tx, shutdown_rx));
        (rx, handle)
    }

    async fn run(self, tx: mpsc::Sender<StatusChange>, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        let mut last: Option<RequestStatus> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tx.closed() => break,
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let status = match self.workflow.get_status(self.request_id).await {
                Ok(request) => request.status,
                Err(FarmCredError::NotFound(_)) => {
                    tracing::warn!(
                        request_id = %self.request_id,
                        "watched request no longer exists"
                    );
                    break;
                }
                Err(e) => {
                    tracing::warn!(request_id = %self.request_id, %e, "status poll failed");
                    continue;
                }
            };
            if last == Some(status) {
                continue;
            }

            let change = StatusChange {
                request_id: self.request_id,
                previous: last,
                status,
                observed_at: Utc::now(),
            };
            if tx.send(change).await.is_err() {
                break;
            }
            last = Some(status);
            if status.is_terminal() {
                break;
            }
        }
        tracing::debug!(request_id = %self.request_id, "status watcher stopped");
    }
}
