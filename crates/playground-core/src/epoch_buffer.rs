//! Ordered store of game-state snapshots.
//!
//! # Invariants
//!
//! - Held snapshots are strictly sorted by epoch with no duplicate epochs.
//! - Nothing is ever removed; a duplicate epoch replaces the held snapshot
//!   (last-write-wins).
//! - Ingestion is commutative and idempotent: any interleaving of the same
//!   snapshots yields the same content, provided duplicates carry identical
//!   content.

use std::collections::BTreeMap;

use playground_proto::Snapshot;

/// Outcome of ingesting a single snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    /// The epoch was new.
    Inserted,
    /// The epoch was already held; the snapshot was replaced.
    Replaced,
}

/// Outcome of merging a history batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryMerge {
    /// Number of epochs that were new.
    pub inserted: usize,
    /// Number of epochs that replaced a held snapshot.
    pub replaced: usize,
}

/// Epoch-keyed snapshot store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpochBuffer {
    snapshots: BTreeMap<u64, Snapshot>,
}

impl EpochBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a snapshot at its epoch, replacing any held snapshot with the
    /// same epoch.
    pub fn ingest(&mut self, snapshot: Snapshot) -> Ingested {
        match self.snapshots.insert(snapshot.epoch, snapshot) {
            Some(_) => Ingested::Replaced,
            None => Ingested::Inserted,
        }
    }

    /// Merge a batch with the same rule as [`ingest`](Self::ingest).
    ///
    /// Snapshots already held from live ingestion are kept unless the batch
    /// carries the same epoch.
    pub fn ingest_history<I>(&mut self, snapshots: I) -> HistoryMerge
    where
        I: IntoIterator<Item = Snapshot>,
    {
        let mut merge = HistoryMerge::default();
        for snapshot in snapshots {
            match self.ingest(snapshot) {
                Ingested::Inserted => merge.inserted += 1,
                Ingested::Replaced => merge.replaced += 1,
            }
        }
        merge
    }

    /// Snapshot with the highest epoch.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.last_key_value().map(|(_, snapshot)| snapshot)
    }

    /// Highest held epoch.
    pub fn latest_epoch(&self) -> Option<u64> {
        self.snapshots.last_key_value().map(|(epoch, _)| *epoch)
    }

    /// Lowest held epoch.
    pub fn first_epoch(&self) -> Option<u64> {
        self.snapshots.first_key_value().map(|(epoch, _)| *epoch)
    }

    /// Snapshot with exactly this epoch.
    pub fn at(&self, epoch: u64) -> Option<&Snapshot> {
        self.snapshots.get(&epoch)
    }

    /// Number of held snapshots.
    pub fn count(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns true if no snapshot is held.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Held epochs in ascending order.
    pub fn epochs(&self) -> impl DoubleEndedIterator<Item = u64> + '_ {
        self.snapshots.keys().copied()
    }

    /// Held snapshots in ascending epoch order.
    pub fn snapshots(&self) -> impl DoubleEndedIterator<Item = &Snapshot> + '_ {
        self.snapshots.values()
    }

    /// Largest held epoch strictly below `epoch`.
    pub fn epoch_before(&self, epoch: u64) -> Option<u64> {
        self.snapshots.range(..epoch).next_back().map(|(e, _)| *e)
    }

    /// Smallest held epoch strictly above `epoch`.
    pub fn epoch_after(&self, epoch: u64) -> Option<u64> {
        let start = epoch.checked_add(1)?;
        self.snapshots.range(start..).next().map(|(e, _)| *e)
    }

    /// Number of held epochs strictly above `epoch`.
    pub fn count_after(&self, epoch: u64) -> usize {
        match epoch.checked_add(1) {
            Some(start) => self.snapshots.range(start..).count(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn snap(epoch: u64, board: &str) -> Snapshot {
        Snapshot::new(epoch, json!(board))
    }

    #[test]
    fn out_of_order_ingest_stays_sorted() {
        let mut buffer = EpochBuffer::new();
        for epoch in [5, 1, 3, 2, 4] {
            buffer.ingest(snap(epoch, "x"));
        }

        assert_eq!(buffer.epochs().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert_eq!(buffer.latest_epoch(), Some(5));
        assert_eq!(buffer.first_epoch(), Some(1));
    }

    #[test]
    fn duplicate_epoch_is_last_write_wins() {
        let mut buffer = EpochBuffer::new();
        assert_eq!(buffer.ingest(snap(2, "old")), Ingested::Inserted);
        assert_eq!(buffer.ingest(snap(2, "new")), Ingested::Replaced);

        assert_eq!(buffer.count(), 1);
        assert_eq!(buffer.at(2).map(|s| &s.board), Some(&json!("new")));
    }

    #[test]
    fn history_merges_with_live_snapshots() {
        let mut buffer = EpochBuffer::new();
        buffer.ingest(snap(7, "live"));

        let merge = buffer.ingest_history(vec![snap(5, "a"), snap(6, "b"), snap(7, "live")]);

        assert_eq!(merge, HistoryMerge { inserted: 2, replaced: 1 });
        assert_eq!(buffer.epochs().collect::<Vec<_>>(), vec![5, 6, 7]);
        assert_eq!(buffer.latest().map(|s| &s.board), Some(&json!("live")));
    }

    #[test]
    fn neighbours_skip_gaps() {
        let mut buffer = EpochBuffer::new();
        buffer.ingest_history(vec![snap(1, "a"), snap(4, "b"), snap(9, "c")]);

        assert_eq!(buffer.epoch_before(4), Some(1));
        assert_eq!(buffer.epoch_before(1), None);
        assert_eq!(buffer.epoch_after(4), Some(9));
        assert_eq!(buffer.epoch_after(9), None);
        assert_eq!(buffer.epoch_after(u64::MAX), None);
        assert_eq!(buffer.count_after(1), 2);
    }

    #[test]
    fn empty_buffer_queries() {
        let buffer = EpochBuffer::new();
        assert!(buffer.is_empty());
        assert!(buffer.latest().is_none());
        assert!(buffer.at(0).is_none());
        assert_eq!(buffer.epochs().count(), 0);
    }
}
