//! Playground Core
//!
//! Sans-IO engines behind every playground view: the session lifecycle and
//! the live/historical game-state synchronization.
//!
//! # Architecture
//!
//! Each engine is a pure state machine that:
//! - Receives events from the caller (I/O completions, push payloads, user
//!   intents)
//! - Produces actions for the caller to execute (network calls, credential
//!   attachment, subscriptions, navigation signals)
//! - Never performs I/O and never awaits, so every transition is a synchronous
//!   step on a single logical thread
//!
//! Asynchronous continuations are fed back as events and re-checked against
//! the current state before they are applied. A completion that arrives after
//! the state moved on is dropped, never replayed.
//!
//! # Components
//!
//! - [`Session`]: authentication state machine owning the [`Credential`] and
//!   the derived [`Identity`]
//! - [`EpochBuffer`]: ordered, de-duplicated store of game-state snapshots
//! - [`ViewCursor`]: live/pinned selection over an [`EpochBuffer`]
//! - [`RoomController`]: per-room orchestration of fetch, subscription and
//!   ingestion
//! - [`Environment`]: time and sleeping, injected by the driver

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod credential;
pub mod cursor;
pub mod env;
pub mod epoch_buffer;
pub mod error;
pub mod room;
pub mod session;

pub use credential::{Credential, Identity};
pub use cursor::{CursorPosition, Navigation, ViewCursor};
pub use env::Environment;
pub use epoch_buffer::{EpochBuffer, HistoryMerge, Ingested};
pub use error::{ErrorKind, RoomError, SessionError};
pub use playground_proto as proto;
pub use room::{GameOutcome, ROOM_EVENTS, RoomAction, RoomController, RoomEvent, RoomPhase};
pub use session::{LoginNotice, Session, SessionAction, SessionEvent, SessionState};
