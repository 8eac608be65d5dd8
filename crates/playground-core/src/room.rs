//! Per-room synchronization.
//!
//! [`RoomController`] orchestrates one room: initial fetch, push
//! subscription, the spectate handshake, and ingestion of every snapshot into
//! its [`EpochBuffer`].
//!
//! ```text
//! Idle ──Open──► Fetching ──DetailFetched──► Syncing ──SpectateAcked──► Live
//!                   │                          │                          │
//!                   ├─FetchFailed(NotFound)──► NotFound                   │
//!                   └─FetchFailed(other)─────► Failed ──Open──► Fetching  │
//!                                                                         │
//!  any ──Close──► Closed ◄────────────────────────────────────────────────┘
//! ```
//!
//! A push channel that comes back after a drop loses the acknowledgement of
//! any `spectate` already on the wire, so `Reconnected` in `Syncing` or
//! `Live` emits `spectate` again. The phase does not change.
//!
//! Push payloads are accepted from `Fetching` on, so live events that beat
//! the history fetch are stored and merged rather than lost. Malformed
//! payloads and payloads tagged with another room are dropped and logged.

use std::collections::BTreeMap;

use playground_proto::{
    EVENT_FINISHED, EVENT_GAMESTATE, EVENT_JOINED, FinishedPayload, GameStatePayload,
    JoinedPayload, RoomDetail, RoomId, RoomStatus, RoomSummary, Snapshot, SpectateAck,
    SpectateRequest,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    cursor::{Navigation, ViewCursor},
    epoch_buffer::EpochBuffer,
    error::{ErrorKind, RoomError},
};

/// Push events a room subscribes to.
pub const ROOM_EVENTS: &[&str] = &[EVENT_GAMESTATE, EVENT_JOINED, EVENT_FINISHED];

/// Lifecycle phase of a [`RoomController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Created, not yet opened.
    Idle,
    /// Room detail fetch in flight.
    Fetching,
    /// Subscribed; waiting for the spectate acknowledgement.
    Syncing,
    /// Subscribed and caught up.
    Live,
    /// The room does not exist. Terminal.
    NotFound,
    /// The initial fetch failed; may be reopened.
    Failed {
        /// Failure classification.
        kind: ErrorKind,
    },
    /// Torn down. Terminal.
    Closed,
}

impl RoomPhase {
    fn accepts_push(self) -> bool {
        matches!(self, Self::Fetching | Self::Syncing | Self::Live)
    }
}

/// How a game ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameOutcome {
    /// False if the game was aborted.
    pub normal: bool,
    /// Backend reason, if any.
    pub reason: Option<String>,
    /// Final score per player.
    pub scores: BTreeMap<String, i64>,
}

/// Inputs to a [`RoomController`].
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// Start (or retry) the room.
    Open,
    /// The room detail call returned.
    DetailFetched(RoomDetail),
    /// The room detail call failed.
    FetchFailed {
        /// Failure classification.
        kind: ErrorKind,
    },
    /// Raw `gamestate` push payload.
    GameState(Value),
    /// Raw `joined` push payload.
    Joined(Value),
    /// Raw `finished` push payload.
    Finished(Value),
    /// Raw acknowledgement of the `spectate` emit.
    SpectateAcked(Value),
    /// The push channel reopened after a drop.
    Reconnected,
    /// Room switch or teardown.
    Close,
}

/// Outputs of a [`RoomController`], executed by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomAction {
    /// Fetch the room detail.
    FetchRoom {
        /// Room to fetch.
        room_id: RoomId,
    },
    /// Subscribe handlers for `events`.
    Subscribe {
        /// Room the handlers belong to.
        room_id: RoomId,
        /// Event names.
        events: &'static [&'static str],
    },
    /// Emit `spectate` with an acknowledgement handler.
    EmitSpectate {
        /// Room to spectate.
        room_id: RoomId,
        /// Emit payload.
        payload: Value,
    },
    /// Release every handler of this room.
    Unsubscribe {
        /// Room the handlers belong to.
        room_id: RoomId,
    },
    /// The room does not exist; the collaborator should navigate away.
    NavigateAway {
        /// Missing room.
        room_id: RoomId,
    },
    /// The initial fetch failed.
    ReportFailure {
        /// Room that failed.
        room_id: RoomId,
        /// Failure classification.
        kind: ErrorKind,
        /// Whether reopening may succeed.
        retryable: bool,
    },
    /// The buffer's latest epoch increased.
    LatestAdvanced {
        /// New latest epoch.
        epoch: u64,
        /// The cursor now selects `epoch`; false while pinned.
        following: bool,
    },
}

/// Room state machine.
///
/// Owns the room's summary, snapshot buffer and view cursor.
/// Pure state machine - returns actions, caller handles I/O.
#[derive(Debug)]
pub struct RoomController {
    room_id: RoomId,
    phase: RoomPhase,
    summary: Option<RoomSummary>,
    buffer: EpochBuffer,
    cursor: ViewCursor,
    outcome: Option<GameOutcome>,
    subscribed: bool,
}

impl RoomController {
    /// Create an idle controller for `room_id`.
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            phase: RoomPhase::Idle,
            summary: None,
            buffer: EpochBuffer::new(),
            cursor: ViewCursor::new(),
            outcome: None,
            subscribed: false,
        }
    }

    /// Room identifier.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Room summary, once fetched.
    pub fn summary(&self) -> Option<&RoomSummary> {
        self.summary.as_ref()
    }

    /// Snapshot buffer.
    pub fn buffer(&self) -> &EpochBuffer {
        &self.buffer
    }

    /// View cursor.
    pub fn cursor(&self) -> &ViewCursor {
        &self.cursor
    }

    /// Outcome, once the game has finished.
    pub fn outcome(&self) -> Option<&GameOutcome> {
        self.outcome.as_ref()
    }

    /// Returns true while the room holds push subscriptions.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Snapshot selected by the cursor.
    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        self.cursor.current_snapshot(&self.buffer)
    }

    /// Scrubber button state.
    pub fn navigation(&self) -> Navigation {
        self.cursor.navigation(&self.buffer)
    }

    /// Epochs newer than the pinned one.
    pub fn pending_updates(&self) -> usize {
        self.cursor.pending_updates(&self.buffer)
    }

    /// See [`ViewCursor::first`].
    pub fn first(&mut self) {
        self.cursor.first(&self.buffer);
    }

    /// See [`ViewCursor::previous`].
    pub fn previous(&mut self) {
        self.cursor.previous(&self.buffer);
    }

    /// See [`ViewCursor::next`].
    pub fn next(&mut self) {
        self.cursor.next(&self.buffer);
    }

    /// See [`ViewCursor::last`].
    pub fn last(&mut self) {
        self.cursor.last();
    }

    /// See [`ViewCursor::pin`].
    pub fn pin(&mut self, epoch: u64) -> bool {
        self.cursor.pin(epoch, &self.buffer)
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// Returns `RoomError` if `Open` is requested in a phase that cannot be
    /// (re)opened. Stale completions and bad payloads never error.
    pub fn handle(&mut self, event: RoomEvent) -> Result<Vec<RoomAction>, RoomError> {
        match event {
            RoomEvent::Open => self.handle_open(),
            RoomEvent::DetailFetched(detail) => Ok(self.handle_detail(detail)),
            RoomEvent::FetchFailed { kind } => Ok(self.handle_fetch_failed(kind)),
            RoomEvent::GameState(data) => Ok(self.handle_gamestate(&data)),
            RoomEvent::Joined(data) => {
                self.handle_joined(&data);
                Ok(vec![])
            },
            RoomEvent::Finished(data) => {
                self.handle_finished(&data);
                Ok(vec![])
            },
            RoomEvent::SpectateAcked(data) => Ok(self.handle_spectate_ack(&data)),
            RoomEvent::Reconnected => Ok(self.handle_reconnected()),
            RoomEvent::Close => Ok(self.handle_close()),
        }
    }

    fn transition(&mut self, next: RoomPhase) {
        info!(room_id = %self.room_id, from = ?self.phase, to = ?next, "room transition");
        self.phase = next;
    }

    fn handle_open(&mut self) -> Result<Vec<RoomAction>, RoomError> {
        match self.phase {
            RoomPhase::Idle | RoomPhase::Failed { .. } => {
                self.transition(RoomPhase::Fetching);
                Ok(vec![RoomAction::FetchRoom { room_id: self.room_id.clone() }])
            },
            phase => Err(RoomError::InvalidPhase { room_id: self.room_id.clone(), phase }),
        }
    }

    fn handle_detail(&mut self, detail: RoomDetail) -> Vec<RoomAction> {
        if self.phase != RoomPhase::Fetching {
            debug!(room_id = %self.room_id, phase = ?self.phase, "dropping stale room detail");
            return vec![];
        }
        if detail.summary.id != self.room_id {
            warn!(room_id = %self.room_id, got = %detail.summary.id, "room detail for another room");
            return vec![];
        }

        let RoomDetail { summary, states } = detail;
        self.summary = Some(summary);

        let mut actions = Vec::with_capacity(3);
        actions.extend(self.merge_history(states));

        self.transition(RoomPhase::Syncing);
        self.subscribed = true;
        actions.push(RoomAction::Subscribe { room_id: self.room_id.clone(), events: ROOM_EVENTS });
        actions.push(self.spectate());
        actions
    }

    fn spectate(&self) -> RoomAction {
        RoomAction::EmitSpectate {
            room_id: self.room_id.clone(),
            payload: SpectateRequest { roomid: self.room_id.clone() }.to_value(),
        }
    }

    fn handle_fetch_failed(&mut self, kind: ErrorKind) -> Vec<RoomAction> {
        if self.phase != RoomPhase::Fetching {
            debug!(room_id = %self.room_id, phase = ?self.phase, "dropping stale fetch failure");
            return vec![];
        }

        let room_id = self.room_id.clone();
        if kind == ErrorKind::NotFound {
            self.transition(RoomPhase::NotFound);
            return vec![RoomAction::NavigateAway { room_id }];
        }

        self.transition(RoomPhase::Failed { kind });
        vec![RoomAction::ReportFailure { room_id, kind, retryable: kind.is_retryable() }]
    }

    /// Returns false (and logs) if a payload must be dropped.
    fn accepts(&self, event: &str, roomid: Option<&RoomId>) -> bool {
        if !self.phase.accepts_push() {
            debug!(room_id = %self.room_id, event, phase = ?self.phase, "dropping push event");
            return false;
        }
        match roomid {
            Some(other) if *other != self.room_id => {
                debug!(room_id = %self.room_id, event, other = %other, "dropping event for another room");
                false
            },
            _ => true,
        }
    }

    fn handle_gamestate(&mut self, data: &Value) -> Vec<RoomAction> {
        let payload = match GameStatePayload::from_value(data) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(room_id = %self.room_id, %err, "dropping malformed gamestate");
                return vec![];
            },
        };
        if !self.accepts(EVENT_GAMESTATE, payload.roomid.as_ref()) {
            return vec![];
        }

        let snapshot = match payload.into_snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(room_id = %self.room_id, %err, "dropping malformed gamestate");
                return vec![];
            },
        };

        let before = self.buffer.latest_epoch();
        let epoch = snapshot.epoch;
        let ingested = self.buffer.ingest(snapshot);
        debug!(room_id = %self.room_id, epoch, ?ingested, "ingested snapshot");

        self.advanced_since(before).into_iter().collect()
    }

    fn handle_joined(&mut self, data: &Value) {
        let payload = match JoinedPayload::from_value(data) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(room_id = %self.room_id, %err, "dropping malformed joined");
                return;
            },
        };
        if !self.accepts(EVENT_JOINED, payload.roomid.as_ref()) {
            return;
        }
        let Some(summary) = self.summary.as_mut() else {
            debug!(room_id = %self.room_id, "joined before room detail; detail will list the player");
            return;
        };

        let player = payload.into_player();
        if summary.players.iter().any(|p| p.id == player.id) {
            debug!(room_id = %self.room_id, player_id = %player.id, "player already listed");
            return;
        }
        info!(room_id = %self.room_id, player_id = %player.id, "player joined");
        summary.players.push(player);
    }

    fn handle_finished(&mut self, data: &Value) {
        let payload = match FinishedPayload::from_value(data) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(room_id = %self.room_id, %err, "dropping malformed finished");
                return;
            },
        };
        if !self.accepts(EVENT_FINISHED, payload.roomid.as_ref()) {
            return;
        }

        if let Some(summary) = self.summary.as_mut() {
            summary.status = RoomStatus::Finished;
        }
        info!(room_id = %self.room_id, normal = payload.normal, "game finished");
        self.outcome = Some(GameOutcome {
            normal: payload.normal,
            reason: payload.reason,
            scores: payload.scores.unwrap_or_default(),
        });
    }

    fn handle_spectate_ack(&mut self, data: &Value) -> Vec<RoomAction> {
        if !matches!(self.phase, RoomPhase::Syncing | RoomPhase::Live) {
            debug!(room_id = %self.room_id, phase = ?self.phase, "dropping stale spectate ack");
            return vec![];
        }

        let ack = match SpectateAck::from_value(data) {
            Ok(ack) => ack,
            Err(err) => {
                warn!(room_id = %self.room_id, %err, "malformed spectate ack; following live events only");
                SpectateAck::default()
            },
        };
        if let Some(error) = &ack.error {
            warn!(room_id = %self.room_id, %error, "spectate refused");
        }

        let actions = self.merge_history(ack.states);
        if self.phase == RoomPhase::Syncing {
            self.transition(RoomPhase::Live);
        }
        actions.into_iter().collect()
    }

    fn handle_reconnected(&mut self) -> Vec<RoomAction> {
        if !matches!(self.phase, RoomPhase::Syncing | RoomPhase::Live) {
            debug!(room_id = %self.room_id, phase = ?self.phase, "reconnect before subscribing");
            return vec![];
        }

        info!(room_id = %self.room_id, phase = ?self.phase, "push channel reconnected; spectating again");
        vec![self.spectate()]
    }

    fn handle_close(&mut self) -> Vec<RoomAction> {
        if self.phase != RoomPhase::Closed {
            self.transition(RoomPhase::Closed);
        }
        if !self.subscribed {
            return vec![];
        }

        self.subscribed = false;
        vec![RoomAction::Unsubscribe { room_id: self.room_id.clone() }]
    }

    fn merge_history(&mut self, states: Vec<Snapshot>) -> Option<RoomAction> {
        let before = self.buffer.latest_epoch();
        let merge = self.buffer.ingest_history(states);
        debug!(
            room_id = %self.room_id,
            inserted = merge.inserted,
            replaced = merge.replaced,
            "merged history"
        );
        self.advanced_since(before)
    }

    fn advanced_since(&mut self, before: Option<u64>) -> Option<RoomAction> {
        let latest = self.buffer.latest_epoch()?;
        if before.is_some_and(|epoch| epoch >= latest) {
            return None;
        }

        let following = self.cursor.advance_to(latest);
        Some(RoomAction::LatestAdvanced { epoch: latest, following })
    }
}
