//! Room resources.
//!
//! A room is one game instance on the backend. The room listing returns
//! [`RoomSummary`] values; the room detail call additionally carries the
//! stored state history as [`Snapshot`]s.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Backend-assigned room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Lifecycle of a room as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Waiting for players.
    Lobby,
    /// Game in progress.
    Playing,
    /// Game over.
    Finished,
}

/// One participant of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Player identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Role within the game, e.g. `x` or `o` in tic-tac-toe.
    #[serde(rename = "gamerole", alias = "role", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Summary of a room, as listed in the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    /// Room identifier.
    pub id: RoomId,
    /// Human readable room name.
    pub name: String,
    /// Game played in the room, e.g. `tictactoe`.
    #[serde(rename = "game", alias = "gameKind")]
    pub game_kind: String,
    /// Current lifecycle status.
    pub status: RoomStatus,
    /// Players in join order.
    #[serde(default)]
    pub players: Vec<Player>,
    /// Maximum number of players.
    #[serde(rename = "maxplayers", alias = "capacity")]
    pub capacity: u32,
}

/// Room detail: the summary plus the stored state history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomDetail {
    /// Room summary fields.
    #[serde(flatten)]
    pub summary: RoomSummary,
    /// Stored game states, in no guaranteed order.
    #[serde(default, alias = "history")]
    pub states: Vec<Snapshot>,
}

/// One game-state snapshot.
///
/// Immutable once received. `epoch` identifies the logical state change; two
/// snapshots with the same epoch describe the same state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Backend-assigned epoch number.
    pub epoch: u64,
    /// Opaque board state, rendered by the per-game view.
    #[serde(default, alias = "boardState")]
    pub board: Value,
    /// Player expected to move next, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<String>,
}

impl Snapshot {
    /// Create a snapshot without a turn marker.
    pub fn new(epoch: u64, board: Value) -> Self {
        Self { epoch, board, turn: None }
    }

    /// Attach a turn marker.
    #[must_use]
    pub fn with_turn(mut self, turn: impl Into<String>) -> Self {
        self.turn = Some(turn.into());
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn summary_decodes_backend_field_names() {
        let summary: RoomSummary = serde_json::from_value(json!({
            "id": "R1",
            "name": "Lobby 1",
            "game": "tictactoe",
            "status": "lobby",
            "players": [{"id": "p1", "name": "alice", "gamerole": "x"}],
            "maxplayers": 2,
            "created_at": "2020-01-01T00:00:00"
        }))
        .unwrap();

        assert_eq!(summary.id, RoomId::new("R1"));
        assert_eq!(summary.game_kind, "tictactoe");
        assert_eq!(summary.status, RoomStatus::Lobby);
        assert_eq!(summary.capacity, 2);
        assert_eq!(summary.players[0].role.as_deref(), Some("x"));
    }

    #[test]
    fn detail_accepts_history_alias() {
        let detail: RoomDetail = serde_json::from_value(json!({
            "id": "R1",
            "name": "Lobby 1",
            "game": "tictactoe",
            "status": "playing",
            "players": [],
            "maxplayers": 2,
            "history": [{"epoch": 5, "board": "A"}]
        }))
        .unwrap();

        assert_eq!(detail.summary.status, RoomStatus::Playing);
        assert_eq!(detail.states, vec![Snapshot::new(5, json!("A"))]);
    }

    #[test]
    fn detail_without_states_is_empty_history() {
        let detail: RoomDetail = serde_json::from_value(json!({
            "id": "R2",
            "name": "Empty",
            "game": "kalaha",
            "status": "lobby",
            "maxplayers": 2
        }))
        .unwrap();

        assert!(detail.states.is_empty());
        assert!(detail.summary.players.is_empty());
    }

    #[test]
    fn snapshot_without_board_is_null() {
        let snapshot: Snapshot = serde_json::from_value(json!({"epoch": 0})).unwrap();
        assert_eq!(snapshot.board, Value::Null);
        assert_eq!(snapshot.turn, None);
    }
}
