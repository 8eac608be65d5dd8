//! Live/pinned selection over an [`EpochBuffer`].
//!
//! The cursor stores only its position. Everything it reports (current
//! snapshot, scrubber flags, pending count) is recomputed from the buffer on
//! each call, so the presentation never sees a flag that disagrees with the
//! buffer.
//!
//! A cursor pinned at the tip stays pinned when a newer epoch arrives. Only
//! [`ViewCursor::next`] reaching the tip or [`ViewCursor::last`] resume live
//! following.

use playground_proto::Snapshot;
use tracing::debug;

use crate::epoch_buffer::EpochBuffer;

/// Which snapshot the cursor selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CursorPosition {
    /// Always the newest snapshot.
    #[default]
    Live,
    /// A specific epoch chosen by the viewer.
    Pinned(u64),
}

/// Enabled state of the scrubber buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Navigation {
    /// "Jump to first" is enabled.
    pub first: bool,
    /// "Step back" is enabled.
    pub previous: bool,
    /// "Step forward" is enabled.
    pub next: bool,
    /// "Jump to last" is enabled.
    pub last: bool,
}

/// Selection of the current snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewCursor {
    position: CursorPosition,
}

impl ViewCursor {
    /// Create a live cursor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position.
    pub fn position(&self) -> CursorPosition {
        self.position
    }

    /// Returns true while following the newest snapshot.
    pub fn is_live(&self) -> bool {
        self.position == CursorPosition::Live
    }

    /// Epoch currently selected, or `None` if live over an empty buffer.
    pub fn current_epoch(&self, buffer: &EpochBuffer) -> Option<u64> {
        match self.position {
            CursorPosition::Live => buffer.latest_epoch(),
            CursorPosition::Pinned(epoch) => Some(epoch),
        }
    }

    /// Snapshot currently selected.
    pub fn current_snapshot<'a>(&self, buffer: &'a EpochBuffer) -> Option<&'a Snapshot> {
        match self.position {
            CursorPosition::Live => buffer.latest(),
            CursorPosition::Pinned(epoch) => buffer.at(epoch),
        }
    }

    /// React to the buffer's latest epoch increasing to `new_latest`.
    ///
    /// Returns true if the selected snapshot is now `new_latest`. A pinned
    /// cursor stays where it is, even when it was pinned at the previous tip.
    pub fn advance_to(&self, new_latest: u64) -> bool {
        match self.position {
            CursorPosition::Live => true,
            CursorPosition::Pinned(epoch) => {
                debug!(epoch, new_latest, "new epoch while pinned; staying pinned");
                false
            },
        }
    }

    /// Pin to the smallest held epoch.
    ///
    /// No-op with fewer than two snapshots.
    pub fn first(&mut self, buffer: &EpochBuffer) {
        if buffer.count() < 2 {
            return;
        }
        if let Some(first) = buffer.first_epoch() {
            self.position = CursorPosition::Pinned(first);
        }
    }

    /// Pin to the epoch preceding the current one.
    ///
    /// No-op at the smallest epoch or with fewer than two snapshots.
    pub fn previous(&mut self, buffer: &EpochBuffer) {
        if buffer.count() < 2 {
            return;
        }
        let Some(current) = self.current_epoch(buffer) else {
            return;
        };
        if let Some(previous) = buffer.epoch_before(current) {
            self.position = CursorPosition::Pinned(previous);
        }
    }

    /// Pin to the epoch following the current one, going live on reaching
    /// the tip.
    pub fn next(&mut self, buffer: &EpochBuffer) {
        let CursorPosition::Pinned(current) = self.position else {
            return;
        };

        match buffer.epoch_after(current) {
            Some(next) if Some(next) != buffer.latest_epoch() => {
                self.position = CursorPosition::Pinned(next);
            },
            _ => self.position = CursorPosition::Live,
        }
    }

    /// Pin to a held epoch picked directly on the scrubber.
    ///
    /// Returns false and leaves the cursor unchanged if the epoch is not held.
    /// Picking the tip pins it; only [`last`](Self::last) resumes following.
    pub fn pin(&mut self, epoch: u64, buffer: &EpochBuffer) -> bool {
        if buffer.at(epoch).is_none() {
            return false;
        }
        self.position = CursorPosition::Pinned(epoch);
        true
    }

    /// Resume following the newest snapshot.
    pub fn last(&mut self) {
        self.position = CursorPosition::Live;
    }

    /// Scrubber button state for the current position.
    pub fn navigation(&self, buffer: &EpochBuffer) -> Navigation {
        let current = self.current_epoch(buffer);
        let at_earliest = current.is_none() || current == buffer.first_epoch();
        let at_tip = self.is_live() || current == buffer.latest_epoch();
        let back = buffer.count() >= 2 && !at_earliest;

        Navigation { first: back, previous: back, next: !at_tip, last: !at_tip }
    }

    /// Number of held epochs newer than the pinned one; zero while live.
    pub fn pending_updates(&self, buffer: &EpochBuffer) -> usize {
        match self.position {
            CursorPosition::Live => 0,
            CursorPosition::Pinned(epoch) => buffer.count_after(epoch),
        }
    }

    /// Return to live, e.g. when switching rooms.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
