//! Operations for model-based testing.
//!
//! Operations cover everything that can happen to a room's view: snapshots
//! arriving live or in a history batch, and the viewer moving the cursor.
//! They are generated randomly by proptest or the fuzzer and applied to both
//! the model and the real controller.

use arbitrary::Arbitrary;
use playground_proto::Snapshot;
use serde_json::{Value, json};

/// Epoch number (uses u8 to keep test space manageable and force collisions).
pub type ModelEpoch = u8;

/// Operations that can be applied to a room view.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// A `gamestate` push event arrives.
    Live {
        /// Epoch of the state.
        epoch: ModelEpoch,
        /// Board marker, to tell replaced snapshots apart.
        board: u8,
    },

    /// A history batch arrives (room detail or spectate acknowledgement).
    History {
        /// `(epoch, board)` pairs in arrival order.
        snapshots: Vec<(ModelEpoch, u8)>,
    },

    /// Viewer jumps to the first snapshot.
    First,

    /// Viewer steps back.
    Previous,

    /// Viewer steps forward.
    Next,

    /// Viewer jumps back to live.
    Last,

    /// Viewer picks an epoch on the scrubber.
    Pin {
        /// Epoch picked.
        epoch: ModelEpoch,
    },
}

impl Operation {
    /// Board value for a marker.
    pub fn board(marker: u8) -> Value {
        json!({ "marker": marker })
    }

    /// Snapshot for an `(epoch, board)` pair.
    pub fn snapshot(epoch: ModelEpoch, board: u8) -> Snapshot {
        Snapshot::new(u64::from(epoch), Self::board(board))
    }
}

/// Result of applying an operation.
///
/// Used to compare model and real system behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation took effect (or was a defined no-op).
    Ok,

    /// A pin on an epoch that is not held was refused.
    Refused,
}
