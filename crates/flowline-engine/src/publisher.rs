//! Run snapshot publication.
//!
//! The engine publishes a [`RunSnapshot`] after every step update and after
//! the run is finalized. Publication is best effort: a failing publisher is
//! logged and the run continues.

use std::collections::HashMap;

use flowline_types::RunSnapshot;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default per-run channel capacity.
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Publishing to {channel} failed: {message}")]
    Rejected { channel: String, message: String },
}

/// Channel key for a run's snapshots.
pub fn channel_name(run_id: &str) -> String {
    format!("run:{}", run_id)
}

pub trait SnapshotPublisher: Send + Sync {
    fn publish(&self, channel: &str, snapshot: &RunSnapshot) -> Result<(), PublishError>;

    /// Whether anything listens on `channel`. The engine skips building
    /// snapshots nobody wants.
    fn wants(&self, _channel: &str) -> bool {
        true
    }

    /// Live receiver for a channel, if this publisher supports subscriptions.
    fn subscribe(&self, _channel: &str) -> Option<broadcast::Receiver<RunSnapshot>> {
        None
    }
}

/// Drops every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl SnapshotPublisher for NoopPublisher {
    fn publish(&self, _channel: &str, _snapshot: &RunSnapshot) -> Result<(), PublishError> {
        Ok(())
    }

    fn wants(&self, _channel: &str) -> bool {
        false
    }
}

/// In-process fan-out over one `tokio::sync::broadcast` channel per run.
///
/// Channels are created on first subscription and dropped once a terminal
/// snapshot has been sent.
#[derive(Debug)]
pub struct BroadcastPublisher {
    capacity: usize,
    channels: Mutex<HashMap<String, broadcast::Sender<RunSnapshot>>>,
}

impl BroadcastPublisher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Number of open channels.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotPublisher for BroadcastPublisher {
    fn publish(&self, channel: &str, snapshot: &RunSnapshot) -> Result<(), PublishError> {
        let mut channels = self.channels.lock();
        let Some(sender) = channels.get(channel) else {
            return Ok(());
        };

        // An error here only means every receiver has gone away.
        let delivered = sender.send(snapshot.clone()).unwrap_or(0);
        debug!(channel, delivered, status = %snapshot.run.status, "Published snapshot");

        if snapshot.is_terminal() {
            channels.remove(channel);
        }
        Ok(())
    }

    fn wants(&self, channel: &str) -> bool {
        self.channels.lock().contains_key(channel)
    }

    fn subscribe(&self, channel: &str) -> Option<broadcast::Receiver<RunSnapshot>> {
        let mut channels = self.channels.lock();
        let sender = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Some(sender.subscribe())
    }
}

/// Stream of snapshots for one run.
///
/// Ends after the first terminal snapshot (`success`, `error` or
/// `waitingBlock`), or when the channel closes.
#[derive(Debug)]
pub struct RunSubscription {
    receiver: broadcast::Receiver<RunSnapshot>,
    done: bool,
}

impl RunSubscription {
    pub fn new(receiver: broadcast::Receiver<RunSnapshot>) -> Self {
        Self {
            receiver,
            done: false,
        }
    }

    pub async fn next(&mut self) -> Option<RunSnapshot> {
        if self.done {
            return None;
        }
        loop {
            match self.receiver.recv().await {
                Ok(snapshot) => {
                    self.done = snapshot.is_terminal();
                    return Some(snapshot);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Snapshot subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}
