//! Push channel framing and event payloads.
//!
//! Every WebSocket text frame is one JSON object tagged by `type`:
//!
//! ```text
//! server -> client   {"type":"event","event":"gamestate","data":{...}}
//! server -> client   {"type":"ack","id":7,"data":{...}}
//! client -> server   {"type":"emit","event":"spectate","data":{...},"id":7}
//! ```
//!
//! An emit carries an `id` only when the caller wants an acknowledgement; the
//! backend answers such an emit exactly once with an `ack` frame bearing the
//! same id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

use crate::room::{Player, RoomId, Snapshot};

/// Server to client game-state update.
pub const EVENT_GAMESTATE: &str = "gamestate";
/// Server to client player join notification.
pub const EVENT_JOINED: &str = "joined";
/// Server to client game end notification.
pub const EVENT_FINISHED: &str = "finished";
/// Client to server spectate intent, acknowledged with the state history.
pub const EVENT_SPECTATE: &str = "spectate";

/// Frame received from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundFrame {
    /// Named event pushed by the backend.
    Event {
        /// Event name.
        event: String,
        /// Event payload.
        #[serde(default)]
        data: Value,
    },
    /// Reply to an acknowledged emit.
    Ack {
        /// Id of the emit being acknowledged.
        id: u64,
        /// Reply payload.
        #[serde(default)]
        data: Value,
    },
}

/// Frame sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundFrame {
    /// Named emit.
    Emit {
        /// Event name.
        event: String,
        /// Emit payload.
        data: Value,
        /// Acknowledgement id, present iff a reply is expected.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
    },
}

impl OutboundFrame {
    /// Event name of the frame.
    pub fn event(&self) -> &str {
        match self {
            Self::Emit { event, .. } => event,
        }
    }

    /// Acknowledgement id of the frame, if any.
    pub fn ack_id(&self) -> Option<u64> {
        match self {
            Self::Emit { id, .. } => *id,
        }
    }
}

/// Errors decoding an event payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    /// Payload did not match the expected shape.
    #[error("malformed {event} payload: {reason}")]
    Malformed {
        /// Event the payload belongs to.
        event: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// A field required for normalization was absent.
    #[error("{event} payload missing {field}")]
    MissingField {
        /// Event the payload belongs to.
        event: &'static str,
        /// Missing field name.
        field: &'static str,
    },
}

fn decode<T: DeserializeOwned>(event: &'static str, value: &Value) -> Result<T, PayloadError> {
    T::deserialize(value).map_err(|e| PayloadError::Malformed { event, reason: e.to_string() })
}

/// `gamestate` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStatePayload {
    /// Epoch of the state. Required for normalization.
    #[serde(default)]
    pub epoch: Option<u64>,
    /// Board state.
    #[serde(default)]
    pub board: Value,
    /// Next player to move.
    #[serde(default)]
    pub turn: Option<String>,
    /// Room the state belongs to, when the backend includes it.
    #[serde(default, alias = "roomId")]
    pub roomid: Option<RoomId>,
}

impl GameStatePayload {
    /// Decode from a raw event payload.
    pub fn from_value(value: &Value) -> Result<Self, PayloadError> {
        decode(EVENT_GAMESTATE, value)
    }

    /// Normalize into a [`Snapshot`].
    pub fn into_snapshot(self) -> Result<Snapshot, PayloadError> {
        let epoch = self
            .epoch
            .ok_or(PayloadError::MissingField { event: EVENT_GAMESTATE, field: "epoch" })?;
        Ok(Snapshot { epoch, board: self.board, turn: self.turn })
    }
}

/// `joined` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedPayload {
    /// Joining player id.
    #[serde(rename = "playerId", alias = "playerid")]
    pub player_id: String,
    /// Display name, when the backend includes it.
    #[serde(default)]
    pub name: Option<String>,
    /// Role within the game.
    #[serde(default, alias = "gamerole")]
    pub role: Option<String>,
    /// Room joined, when the backend includes it.
    #[serde(default, alias = "roomId")]
    pub roomid: Option<RoomId>,
}

impl JoinedPayload {
    /// Decode from a raw event payload.
    pub fn from_value(value: &Value) -> Result<Self, PayloadError> {
        decode(EVENT_JOINED, value)
    }

    /// Normalize into a [`Player`]. Players without a name are shown by id.
    pub fn into_player(self) -> Player {
        let name = self.name.unwrap_or_else(|| self.player_id.clone());
        Player { id: self.player_id, name, role: self.role }
    }
}

/// `finished` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedPayload {
    /// Whether the game ended by its rules rather than by abort.
    pub normal: bool,
    /// Reason for an abnormal end.
    #[serde(default)]
    pub reason: Option<String>,
    /// Final scores by player id.
    #[serde(default)]
    pub scores: Option<BTreeMap<String, i64>>,
    /// Room that finished, when the backend includes it.
    #[serde(default, alias = "roomId")]
    pub roomid: Option<RoomId>,
}

impl FinishedPayload {
    /// Decode from a raw event payload.
    pub fn from_value(value: &Value) -> Result<Self, PayloadError> {
        decode(EVENT_FINISHED, value)
    }
}

/// `spectate` emit body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpectateRequest {
    /// Room to spectate.
    pub roomid: RoomId,
}

impl SpectateRequest {
    /// Encode as an emit payload.
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "roomid": self.roomid })
    }
}

/// `spectate` acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectateAck {
    /// State history at the time of the ack.
    #[serde(default, alias = "history")]
    pub states: Vec<Snapshot>,
    /// Backend error, if the spectate was refused.
    #[serde(default)]
    pub error: Option<String>,
}

impl SpectateAck {
    /// Decode from a raw ack payload.
    pub fn from_value(value: &Value) -> Result<Self, PayloadError> {
        decode(EVENT_SPECTATE, value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn inbound_frames_are_tagged() {
        let event: InboundFrame = serde_json::from_str(
            r#"{"type":"event","event":"gamestate","data":{"epoch":1,"board":null}}"#,
        )
        .unwrap();
        assert!(matches!(event, InboundFrame::Event { ref event, .. } if event == "gamestate"));

        let ack: InboundFrame =
            serde_json::from_str(r#"{"type":"ack","id":3,"data":{"states":[]}}"#).unwrap();
        assert_eq!(ack, InboundFrame::Ack { id: 3, data: json!({"states": []}) });
    }

    #[test]
    fn emit_without_ack_omits_id() {
        let frame = OutboundFrame::Emit { event: "spectate".into(), data: json!({}), id: None };
        let text = serde_json::to_string(&frame).unwrap();
        assert_eq!(text, r#"{"type":"emit","event":"spectate","data":{}}"#);
    }

    #[test]
    fn gamestate_without_epoch_is_rejected() {
        let payload = GameStatePayload::from_value(&json!({"board": {"cells": []}})).unwrap();
        assert_eq!(
            payload.into_snapshot(),
            Err(PayloadError::MissingField { event: EVENT_GAMESTATE, field: "epoch" })
        );
    }

    #[test]
    fn gamestate_with_wrong_types_is_malformed() {
        let err = GameStatePayload::from_value(&json!({"epoch": "seven"})).unwrap_err();
        assert!(matches!(err, PayloadError::Malformed { event: EVENT_GAMESTATE, .. }));
    }

    #[test]
    fn joined_accepts_lowercase_player_id() {
        let payload =
            JoinedPayload::from_value(&json!({"playerid": "p9", "gamerole": "o"})).unwrap();
        let player = payload.into_player();
        assert_eq!(player.id, "p9");
        assert_eq!(player.name, "p9");
        assert_eq!(player.role.as_deref(), Some("o"));
    }

    #[test]
    fn spectate_ack_accepts_history_alias() {
        let ack = SpectateAck::from_value(&json!({"history": [{"epoch": 2, "board": 1}]})).unwrap();
        assert_eq!(ack.states.len(), 1);
        assert_eq!(ack.states[0].epoch, 2);
    }
}
