//! Fuzz target for [`EpochBuffer`] + [`ViewCursor`]
//!
//! Catch divergence between the buffer/cursor pair and the reference model
//!
//! # Strategy
//!
//! - Arrival order: live snapshots and history batches in any interleaving
//! - Duplicates: epochs drawn from `u8` so collisions are frequent
//! - Scrubbing: arbitrary first/previous/next/last/pin sequences between
//!   arrivals
//!
//! # Invariants
//!
//! - Observable state equals the model's after every operation
//! - Held epochs are strictly ascending
//! - A pinned epoch is always held
//! - Arrivals NEVER move a pinned cursor
//! - NEVER panic on any sequence

#![no_main]

use libfuzzer_sys::fuzz_target;
use playground_core::{CursorPosition, EpochBuffer, ViewCursor};
use playground_harness::{ModelWorld, ObservableState, Operation, OperationResult};

fn observe(buffer: &EpochBuffer, cursor: &ViewCursor) -> ObservableState {
    let snapshots = buffer
        .snapshots()
        .map(|s| {
            let marker = s.board["marker"].as_u64().and_then(|m| u8::try_from(m).ok());
            (s.epoch, marker.unwrap_or_else(|| panic!("board lost its marker: {}", s.board)))
        })
        .collect();
    let pinned = match cursor.position() {
        CursorPosition::Live => None,
        CursorPosition::Pinned(epoch) => Some(epoch),
    };
    let nav = cursor.navigation(buffer);

    ObservableState {
        snapshots,
        pinned,
        current: cursor.current_snapshot(buffer).map(|s| s.epoch),
        navigation: [nav.first, nav.previous, nav.next, nav.last],
        pending: cursor.pending_updates(buffer),
    }
}

fn apply(buffer: &mut EpochBuffer, cursor: &mut ViewCursor, op: &Operation) -> OperationResult {
    match op {
        Operation::Live { epoch, board } => {
            buffer.ingest(Operation::snapshot(*epoch, *board));
        },
        Operation::History { snapshots } => {
            buffer.ingest_history(snapshots.iter().map(|(e, b)| Operation::snapshot(*e, *b)));
        },
        Operation::First => cursor.first(buffer),
        Operation::Previous => cursor.previous(buffer),
        Operation::Next => cursor.next(buffer),
        Operation::Last => cursor.last(),
        Operation::Pin { epoch } => {
            if !cursor.pin(u64::from(*epoch), buffer) {
                return OperationResult::Refused;
            }
        },
    }
    if let Some(latest) = buffer.latest_epoch() {
        assert_eq!(cursor.advance_to(latest), cursor.is_live());
    }
    OperationResult::Ok
}

fuzz_target!(|ops: Vec<Operation>| {
    let mut model = ModelWorld::new();
    let mut buffer = EpochBuffer::new();
    let mut cursor = ViewCursor::new();

    for op in &ops {
        let pinned_before = cursor.position();

        let expected = model.apply(op);
        let actual = apply(&mut buffer, &mut cursor, op);
        assert_eq!(expected, actual, "result diverged on {op:?}");

        let state = observe(&buffer, &cursor);
        assert_eq!(model.observable_state(), state, "state diverged on {op:?}");

        assert!(state.snapshots.windows(2).all(|w| w[0].0 < w[1].0), "epochs out of order");
        if let Some(pinned) = state.pinned {
            assert!(buffer.at(pinned).is_some(), "pinned epoch {pinned} not held");
        }
        if matches!(op, Operation::Live { .. } | Operation::History { .. }) {
            assert_eq!(cursor.position(), pinned_before, "arrival moved the cursor");
        }
    }
});
