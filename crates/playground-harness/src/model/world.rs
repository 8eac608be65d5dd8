//! Model world - the oracle for a room view.

use super::operation::{ModelEpoch, Operation, OperationResult};

/// Observable state for oracle comparison.
///
/// This is the subset of room state the presentation layer can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Held `(epoch, board)` pairs, ascending.
    pub snapshots: Vec<(u64, u8)>,
    /// Pinned epoch, or `None` while live.
    pub pinned: Option<u64>,
    /// Epoch currently shown.
    pub current: Option<u64>,
    /// Scrubber flags: first, previous, next, last.
    pub navigation: [bool; 4],
    /// Held epochs newer than the pinned one.
    pub pending: usize,
}

/// Model world - the reference implementation.
#[derive(Debug, Clone, Default)]
pub struct ModelWorld {
    /// Held snapshots, sorted by epoch, unique.
    snapshots: Vec<(u64, u8)>,
    /// `None` means live.
    pinned: Option<u64>,
}

impl ModelWorld {
    /// Create an empty, live world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an operation and return the result.
    ///
    /// The result should match the real implementation's result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Live { epoch, board } => self.store(*epoch, *board),
            Operation::History { snapshots } => {
                for (epoch, board) in snapshots {
                    self.store(*epoch, *board);
                }
            },
            Operation::First => {
                if self.snapshots.len() >= 2 {
                    self.pinned = Some(self.snapshots[0].0);
                }
            },
            Operation::Previous => {
                if self.snapshots.len() >= 2 {
                    if let Some(current) = self.current() {
                        let before = self.snapshots.iter().rev().map(|(e, _)| *e).find(|e| *e < current);
                        if before.is_some() {
                            self.pinned = before;
                        }
                    }
                }
            },
            Operation::Next => {
                if let Some(pinned) = self.pinned {
                    let after = self.snapshots.iter().map(|(e, _)| *e).find(|e| *e > pinned);
                    let latest = self.snapshots.last().map(|(e, _)| *e);
                    self.pinned = match after {
                        Some(next) if Some(next) != latest => Some(next),
                        _ => None,
                    };
                }
            },
            Operation::Last => self.pinned = None,
            Operation::Pin { epoch } => {
                let epoch = u64::from(*epoch);
                if !self.snapshots.iter().any(|(e, _)| *e == epoch) {
                    return OperationResult::Refused;
                }
                self.pinned = Some(epoch);
            },
        }
        OperationResult::Ok
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        let first = self.snapshots.first().map(|(e, _)| *e);
        let latest = self.snapshots.last().map(|(e, _)| *e);
        let current = self.current();

        let at_earliest = current.is_none() || current == first;
        let at_tip = self.pinned.is_none() || current == latest;
        let back = self.snapshots.len() >= 2 && !at_earliest;

        let pending = match self.pinned {
            Some(pinned) => self.snapshots.iter().filter(|(e, _)| *e > pinned).count(),
            None => 0,
        };

        ObservableState {
            snapshots: self.snapshots.clone(),
            pinned: self.pinned,
            current,
            navigation: [back, back, !at_tip, !at_tip],
            pending,
        }
    }

    fn current(&self) -> Option<u64> {
        self.pinned.or_else(|| self.snapshots.last().map(|(e, _)| *e))
    }

    fn store(&mut self, epoch: ModelEpoch, board: u8) {
        let epoch = u64::from(epoch);
        match self.snapshots.iter_mut().find(|(e, _)| *e == epoch) {
            Some(existing) => existing.1 = board,
            None => {
                self.snapshots.push((epoch, board));
                self.snapshots.sort_by_key(|(e, _)| *e);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrub_back_and_forward_to_live() {
        let mut world = ModelWorld::new();
        world.apply(&Operation::History { snapshots: vec![(1, 0), (2, 0), (3, 0)] });

        world.apply(&Operation::Previous);
        world.apply(&Operation::Previous);
        assert_eq!(world.observable_state().pinned, Some(1));

        world.apply(&Operation::Next);
        assert_eq!(world.observable_state().pinned, Some(2));

        world.apply(&Operation::Next);
        assert_eq!(world.observable_state().pinned, None);
    }

    #[test]
    fn pin_on_missing_epoch_is_refused() {
        let mut world = ModelWorld::new();
        world.apply(&Operation::Live { epoch: 4, board: 1 });

        assert_eq!(world.apply(&Operation::Pin { epoch: 5 }), OperationResult::Refused);
        assert_eq!(world.apply(&Operation::Pin { epoch: 4 }), OperationResult::Ok);
    }

    #[test]
    fn duplicate_epoch_replaces_board() {
        let mut world = ModelWorld::new();
        world.apply(&Operation::Live { epoch: 4, board: 1 });
        world.apply(&Operation::Live { epoch: 4, board: 2 });

        assert_eq!(world.observable_state().snapshots, vec![(4, 2)]);
    }
}
