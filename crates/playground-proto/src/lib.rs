//! Playground wire types.
//!
//! JSON shapes exchanged with the playground backend over its two channels:
//!
//! - Request/response: authentication bodies ([`auth`]) and room resources
//!   ([`room`]).
//! - Push channel: the framing envelope and the named event payloads
//!   ([`push`]).
//!
//! The types in this crate only describe shapes. They carry no session or
//! synchronization logic; `playground-core` owns the state machines that
//! consume them.
//!
//! # Tolerance
//!
//! The backend has shipped several spellings of some fields (`payload` vs
//! `access_token`, `states` vs `history`, `playerid` vs `playerId`). Decoding
//! accepts all of them through serde aliases so the engines above only ever
//! see one canonical shape.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod auth;
pub mod push;
pub mod room;

pub use auth::{AuthResponse, LoginRequest, RegisterRequest, RoleEntry, UserResponse};
pub use push::{
    EVENT_FINISHED, EVENT_GAMESTATE, EVENT_JOINED, EVENT_SPECTATE, FinishedPayload,
    GameStatePayload, InboundFrame, JoinedPayload, OutboundFrame, PayloadError, SpectateAck,
    SpectateRequest,
};
pub use room::{Player, RoomDetail, RoomId, RoomStatus, RoomSummary, Snapshot};
