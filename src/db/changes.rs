//! Broadcast of committed writes, keyed by table.

use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableChange {
    Tasks,
    Categories,
}

/// Publishes a [`TableChange`] after each successful write.
///
/// Slow subscribers lag instead of blocking writers; a lagged live query
/// simply refreshes once.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<TableChange>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn notify(&self, tables: &[TableChange]) {
        for table in tables {
            let receivers = self.tx.send(*table).unwrap_or(0);
            trace!(?table, receivers, "table changed");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TableChange> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
