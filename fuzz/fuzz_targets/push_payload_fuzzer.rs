//! Fuzz target for push payload handling in [`RoomController`]
//!
//! Malformed push payloads must be dropped, never crash the subscription
//!
//! # Strategy
//!
//! - Raw bytes: arbitrary input decoded as JSON and fed as every event kind
//! - Phase probing: payloads delivered before open, while fetching, live,
//!   and after close
//!
//! # Invariants
//!
//! - NEVER panic on any payload
//! - Payloads after `Close` never change the buffer
//! - Only `LatestAdvanced` follows a push payload, and only with the new
//!   latest epoch
//! - A reconnect yields at most one `EmitSpectate` and keeps the phase

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use playground_core::{RoomAction, RoomController, RoomEvent};
use playground_proto::RoomId;
use serde_json::Value;

#[derive(Debug, Clone, Arbitrary)]
enum Step {
    Open,
    GameState(Vec<u8>),
    Joined(Vec<u8>),
    Finished(Vec<u8>),
    SpectateAcked(Vec<u8>),
    Reconnected,
    Close,
}

fn decode(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

fuzz_target!(|steps: Vec<Step>| {
    let mut controller = RoomController::new(RoomId::new("fuzz"));

    for step in steps {
        let closed = controller.phase() == playground_core::RoomPhase::Closed;
        let before = controller.buffer().clone();

        let (event, is_push) = match step {
            Step::Open => (RoomEvent::Open, false),
            Step::GameState(bytes) => (RoomEvent::GameState(decode(&bytes)), true),
            Step::Joined(bytes) => (RoomEvent::Joined(decode(&bytes)), true),
            Step::Finished(bytes) => (RoomEvent::Finished(decode(&bytes)), true),
            Step::SpectateAcked(bytes) => (RoomEvent::SpectateAcked(decode(&bytes)), true),
            Step::Reconnected => {
                let phase = controller.phase();
                let actions = controller.handle(RoomEvent::Reconnected).unwrap_or_default();
                assert!(actions.len() <= 1, "reconnect produced {actions:?}");
                assert!(actions.iter().all(|a| matches!(a, RoomAction::EmitSpectate { .. })));
                assert_eq!(controller.phase(), phase, "reconnect changed the phase");
                continue;
            },
            Step::Close => (RoomEvent::Close, false),
        };

        let Ok(actions) = controller.handle(event) else {
            continue;
        };

        if closed {
            assert_eq!(controller.buffer(), &before, "payload changed a closed room");
        }
        if is_push {
            for action in actions {
                match action {
                    RoomAction::LatestAdvanced { epoch, .. } => {
                        assert_eq!(Some(epoch), controller.buffer().latest_epoch());
                    },
                    other => panic!("push payload produced {other:?}"),
                }
            }
        }
    }
});
