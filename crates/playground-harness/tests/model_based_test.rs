//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! room controller behaves identically to the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelWorld    RealWorld        Compare
//!      (reference)   (RoomController) ObservableState
//! ```

#![allow(clippy::unwrap_used)]

use playground_core::{CursorPosition, RoomController, RoomEvent, RoomPhase};
use playground_harness::{ModelEpoch, ModelWorld, ObservableState, Operation, OperationResult};
use playground_proto::{RoomDetail, RoomId, RoomStatus, RoomSummary};
use proptest::prelude::*;
use serde_json::json;

/// Real system wrapper that mirrors ModelWorld's interface.
struct RealWorld {
    controller: RoomController,
}

impl RealWorld {
    fn new() -> Self {
        let room_id = RoomId::new("model");
        let mut controller = RoomController::new(room_id.clone());
        controller.handle(RoomEvent::Open).unwrap();
        controller
            .handle(RoomEvent::DetailFetched(RoomDetail {
                summary: RoomSummary {
                    id: room_id,
                    name: "model".into(),
                    game_kind: "tictactoe".into(),
                    status: RoomStatus::Playing,
                    players: vec![],
                    capacity: 2,
                },
                states: vec![],
            }))
            .unwrap();
        assert_eq!(controller.phase(), RoomPhase::Syncing);

        Self { controller }
    }

    fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Live { epoch, board } => {
                let data = json!({"epoch": epoch, "board": Operation::board(*board)});
                self.controller.handle(RoomEvent::GameState(data)).unwrap();
            },
            Operation::History { snapshots } => {
                let states: Vec<_> =
                    snapshots.iter().map(|(epoch, board)| Operation::snapshot(*epoch, *board)).collect();
                let data = json!({ "states": states });
                self.controller.handle(RoomEvent::SpectateAcked(data)).unwrap();
            },
            Operation::First => self.controller.first(),
            Operation::Previous => self.controller.previous(),
            Operation::Next => self.controller.next(),
            Operation::Last => self.controller.last(),
            Operation::Pin { epoch } => {
                if !self.controller.pin(u64::from(*epoch)) {
                    return OperationResult::Refused;
                }
            },
        }
        OperationResult::Ok
    }

    fn observable_state(&self) -> ObservableState {
        let snapshots = self
            .controller
            .buffer()
            .snapshots()
            .map(|s| (s.epoch, u8::try_from(s.board["marker"].as_u64().unwrap()).unwrap()))
            .collect();
        let pinned = match self.controller.cursor().position() {
            CursorPosition::Live => None,
            CursorPosition::Pinned(epoch) => Some(epoch),
        };
        let nav = self.controller.navigation();

        ObservableState {
            snapshots,
            pinned,
            current: self.controller.current_snapshot().map(|s| s.epoch),
            navigation: [nav.first, nav.previous, nav.next, nav.last],
            pending: self.controller.pending_updates(),
        }
    }
}

/// Strategy for generating operations.
///
/// Epochs are drawn from a small range so duplicates and pins on held epochs
/// are common.
fn operation_strategy() -> impl Strategy<Value = Operation> {
    let epoch = 0..12 as ModelEpoch;
    let board = any::<u8>();

    prop_oneof![
        // Weight towards arrivals so the buffer fills
        4 => (epoch.clone(), board.clone()).prop_map(|(epoch, board)| Operation::Live { epoch, board }),
        2 => prop::collection::vec((epoch.clone(), board), 0..6)
            .prop_map(|snapshots| Operation::History { snapshots }),
        1 => Just(Operation::First),
        2 => Just(Operation::Previous),
        2 => Just(Operation::Next),
        1 => Just(Operation::Last),
        1 => epoch.prop_map(|epoch| Operation::Pin { epoch }),
    ]
}

proptest! {
    /// Verify that results and observable state match after every operation.
    #[test]
    fn prop_model_matches_real(ops in prop::collection::vec(operation_strategy(), 0..60)) {
        let mut model = ModelWorld::new();
        let mut real = RealWorld::new();

        for (i, op) in ops.iter().enumerate() {
            let model_result = model.apply(op);
            let real_result = real.apply(op);

            prop_assert_eq!(
                model_result, real_result,
                "Divergence at operation {}: {:?}", i, op
            );
            prop_assert_eq!(
                model.observable_state(), real.observable_state(),
                "State divergence after operation {}: {:?}", i, op
            );
        }
    }

    /// Verify view invariants hold after any operation sequence.
    #[test]
    fn prop_view_invariants(ops in prop::collection::vec(operation_strategy(), 0..100)) {
        let mut real = RealWorld::new();
        for op in &ops {
            real.apply(op);
        }
        let state = real.observable_state();

        // Invariant: held epochs are strictly ascending
        prop_assert!(state.snapshots.windows(2).all(|w| w[0].0 < w[1].0));

        // Invariant: a pinned epoch is always held
        if let Some(pinned) = state.pinned {
            prop_assert!(state.snapshots.iter().any(|(e, _)| *e == pinned));
        }

        // Invariant: a live cursor shows the newest epoch and offers no forward moves
        if state.pinned.is_none() {
            prop_assert_eq!(state.current, state.snapshots.last().map(|(e, _)| *e));
            prop_assert!(!state.navigation[2]);
            prop_assert_eq!(state.pending, 0);
        }
    }

    /// Verify that arrivals never move a pinned cursor.
    #[test]
    fn prop_arrivals_keep_pin(
        history in prop::collection::vec((0..12 as ModelEpoch, any::<u8>()), 2..8),
        arrivals in prop::collection::vec((0..24 as ModelEpoch, any::<u8>()), 0..8)
    ) {
        let mut real = RealWorld::new();
        real.apply(&Operation::History { snapshots: history });
        real.apply(&Operation::First);
        let pinned = real.observable_state().pinned;

        for (epoch, board) in arrivals {
            real.apply(&Operation::Live { epoch, board });
        }

        prop_assert_eq!(real.observable_state().pinned, pinned);
    }
}

#[cfg(test)]
mod smoke_tests {
    use super::*;

    /// History, a live arrival, then scrubbing to the first epoch and back.
    #[test]
    fn history_then_live_then_scrub() {
        let mut model = ModelWorld::new();
        let mut real = RealWorld::new();
        let ops = [
            Operation::History { snapshots: vec![(5, 1)] },
            Operation::Live { epoch: 6, board: 2 },
            Operation::First,
            Operation::Last,
        ];

        for op in &ops {
            assert_eq!(model.apply(op), real.apply(op));
        }

        let state = real.observable_state();
        assert_eq!(state, model.observable_state());
        assert_eq!(state.current, Some(6));
        assert_eq!(state.pinned, None);
    }
}
