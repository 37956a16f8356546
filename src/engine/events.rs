//! Change notification bus.
//!
//! Data and validation changes are multicast over two broadcast channels.
//! Publishing never blocks and is a no-op without receivers; a receiver
//! that falls more than the channel capacity behind skips the oldest
//! events and is told how many it lost.
//!
//! Callback subscriptions drive a receiver on their own tokio task. A
//! panicking callback is logged and the subscription keeps running.

use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::data::{GridError, GridResult};
use crate::types::ValidationResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// What a structural operation did
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DataChangeKind {
    Initialized,
    Imported,
    Deleted,
    Cleared,
    RowAdded,
    RowUpdated,
    CellUpdated,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataChangeEvent {
    pub kind: DataChangeKind,
    /// Indices touched, as they were before the operation. Empty for
    /// whole-grid changes.
    pub affected_indices: Vec<usize>,
    /// Row count after the operation
    pub row_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl DataChangeEvent {
    pub fn new(kind: DataChangeKind, affected_indices: Vec<usize>, row_count: usize) -> Self {
        Self {
            kind,
            affected_indices,
            row_count,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidationChangeEvent {
    /// The validated row, or `None` for a full-dataset pass
    pub affected_row: Option<usize>,
    pub result: Arc<ValidationResult>,
}

/// Publisher side of the bus
pub struct ChangeBus {
    data_tx: broadcast::Sender<DataChangeEvent>,
    validation_tx: broadcast::Sender<ValidationChangeEvent>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (data_tx, _) = broadcast::channel(capacity);
        let (validation_tx, _) = broadcast::channel(capacity);
        Self {
            data_tx,
            validation_tx,
        }
    }

    /// Returns the number of receivers that will see the event
    pub fn publish_data(&self, event: DataChangeEvent) -> usize {
        self.data_tx.send(event).unwrap_or(0)
    }

    pub fn publish_validation(&self, event: ValidationChangeEvent) -> usize {
        self.validation_tx.send(event).unwrap_or(0)
    }

    pub fn data_changes(&self) -> broadcast::Receiver<DataChangeEvent> {
        self.data_tx.subscribe()
    }

    pub fn validation_changes(&self) -> broadcast::Receiver<ValidationChangeEvent> {
        self.validation_tx.subscribe()
    }

    /// Run `callback` for every data change on a background task
    pub fn on_data_change<F>(&self, callback: F) -> GridResult<Subscription>
    where
        F: Fn(&DataChangeEvent) + Send + Sync + 'static,
    {
        Subscription::spawn("data", self.data_changes(), callback)
    }

    /// Run `callback` for every validation change on a background task
    pub fn on_validation_change<F>(&self, callback: F) -> GridResult<Subscription>
    where
        F: Fn(&ValidationChangeEvent) + Send + Sync + 'static,
    {
        Subscription::spawn("validation", self.validation_changes(), callback)
    }
}

/// Callback subscription. Dropping it stops delivery.
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    fn spawn<T, F>(
        channel: &'static str,
        mut rx: broadcast::Receiver<T>,
        callback: F,
    ) -> GridResult<Self>
    where
        T: Clone + Send + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| GridError::NoRuntime)?;

        let handle = runtime.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                            error!(channel, "change subscriber panicked");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(channel, skipped, "change subscriber lagging, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Self { handle })
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop delivery
    pub fn unsubscribe(self) {
        self.handle.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
