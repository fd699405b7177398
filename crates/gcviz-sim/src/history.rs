//! Append-only record of completed simulations.

use crate::model::HistoryEntry;
use tokio::sync::RwLock;

/// Every completed run for the lifetime of the process, oldest first.
///
/// There is no removal and no capacity bound.
#[derive(Debug, Default)]
pub struct HistoryLedger {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a run. Returns the new length.
    pub async fn append(&self, entry: HistoryEntry) -> usize {
        let mut entries = self.entries.write().await;
        entries.push(entry);
        entries.len()
    }

    /// Copy of every entry in insertion order.
    pub async fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.read().await.clone()
    }

    /// The last `count` entries, oldest first.
    pub async fn recent(&self, count: usize) -> Vec<HistoryEntry> {
        let entries = self.entries.read().await;
        let skip = entries.len().saturating_sub(count);
        entries[skip..].to_vec()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
