//! Async driver of a room controller.
//!
//! [`RoomDriver`] executes [`RoomAction`]s: it fetches the room through the
//! session's [`Api`], registers push handlers that forward into a private
//! inbox, and turns navigation-relevant actions into [`RoomNotice`]s for the
//! caller.
//!
//! Push handlers never touch the controller. They queue [`RoomEvent`]s and
//! the owner of the driver feeds them with
//! [`process_pending`](RoomDriver::process_pending) or
//! [`next_update`](RoomDriver::next_update), so every transition still runs
//! on the owner's task.
//!
//! Along with the room's events the driver listens for
//! [`EVENT_RECONNECTED`] and feeds it as [`RoomEvent::Reconnected`], so a
//! `spectate` whose acknowledgement died with the old connection is sent
//! again.

use std::{collections::VecDeque, sync::Arc};

use playground_core::{
    Environment, ErrorKind, RoomAction, RoomController, RoomEvent,
    proto::{EVENT_FINISHED, EVENT_GAMESTATE, EVENT_JOINED, EVENT_SPECTATE, RoomId},
};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    api::Api,
    error::ClientError,
    push::{AckHandler, ChannelStatus, EVENT_RECONNECTED, EventHandler, PushChannel, Subscription},
    session::SessionManager,
};

/// Outcome the presentation layer must react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomNotice {
    /// The room does not exist; leave the room view.
    NavigateAway {
        /// Room that was requested.
        room_id: RoomId,
    },
    /// The room could not be fetched.
    FetchFailed {
        /// Room that was requested.
        room_id: RoomId,
        /// Failure classification.
        kind: ErrorKind,
        /// Whether opening again may succeed.
        retryable: bool,
    },
    /// A newer latest epoch arrived.
    Updated {
        /// New latest epoch.
        epoch: u64,
        /// The view shows `epoch`; false while the viewer is pinned.
        following: bool,
    },
}

/// Drives one [`RoomController`] over a shared push channel.
///
/// Switching rooms releases every handler of the old room before the new
/// room subscribes.
pub struct RoomDriver<P: PushChannel> {
    controller: RoomController,
    push: Arc<P>,
    subscriptions: Vec<Subscription>,
    inbox_tx: mpsc::UnboundedSender<RoomEvent>,
    inbox_rx: mpsc::UnboundedReceiver<RoomEvent>,
}

impl<P: PushChannel> RoomDriver<P> {
    /// Create a driver for `room_id`. Nothing happens until
    /// [`open`](Self::open).
    pub fn new(room_id: RoomId, push: Arc<P>) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            controller: RoomController::new(room_id),
            push,
            subscriptions: Vec::new(),
            inbox_tx,
            inbox_rx,
        }
    }

    /// Fetch the room and start following it.
    ///
    /// Requires an authenticated session. A missing room yields
    /// [`RoomNotice::NavigateAway`]; other fetch failures yield
    /// [`RoomNotice::FetchFailed`] and the room may be opened again.
    pub async fn open<A: Api, E: Environment>(
        &mut self,
        session: &mut SessionManager<A, E>,
    ) -> Result<Vec<RoomNotice>, ClientError> {
        session.run_pending().await;
        session.ensure_authenticated()?;

        let actions = self.controller.handle(RoomEvent::Open)?;
        Ok(self.run(actions, session).await)
    }

    /// Close the current room and open `room_id` instead.
    pub async fn switch_to<A: Api, E: Environment>(
        &mut self,
        room_id: RoomId,
        session: &mut SessionManager<A, E>,
    ) -> Result<Vec<RoomNotice>, ClientError> {
        info!(from = %self.controller.room_id(), to = %room_id, "switching room");
        self.close();

        // Events still queued for the old room die with its inbox
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        self.inbox_tx = inbox_tx;
        self.inbox_rx = inbox_rx;
        self.controller = RoomController::new(room_id);

        self.open(session).await
    }

    /// Stop following the room and release its handlers.
    pub fn close(&mut self) {
        let actions = self.feed(RoomEvent::Close);
        for action in actions {
            self.execute(action);
        }
        self.subscriptions.clear();
    }

    /// Feed every queued push event and acknowledgement.
    pub fn process_pending(&mut self) -> Vec<RoomNotice> {
        let mut notices = Vec::new();
        while let Ok(event) = self.inbox_rx.try_recv() {
            notices.extend(self.ingest(event));
        }
        notices
    }

    /// Wait for the next push event, then feed it and everything queued
    /// behind it.
    pub async fn next_update(&mut self) -> Vec<RoomNotice> {
        let Some(event) = self.inbox_rx.recv().await else {
            return Vec::new();
        };
        let mut notices = self.ingest(event);
        notices.extend(self.process_pending());
        notices
    }

    /// The controller, for reading room state.
    pub fn controller(&self) -> &RoomController {
        &self.controller
    }

    /// The controller, for moving the view cursor.
    pub fn controller_mut(&mut self) -> &mut RoomController {
        &mut self.controller
    }

    /// Non-fatal banner condition: the push channel gave up reconnecting.
    pub fn banner(&self) -> Option<ChannelStatus> {
        match self.push.status() {
            ChannelStatus::Exhausted => Some(ChannelStatus::Exhausted),
            _ => None,
        }
    }

    /// Number of live handler registrations held for the room.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.iter().filter(|s| s.is_active()).count()
    }

    async fn run<A: Api, E: Environment>(
        &mut self,
        actions: Vec<RoomAction>,
        session: &mut SessionManager<A, E>,
    ) -> Vec<RoomNotice> {
        let mut pending: VecDeque<RoomAction> = actions.into();
        let mut notices = Vec::new();

        while let Some(action) = pending.pop_front() {
            if let RoomAction::FetchRoom { room_id } = action {
                let event = match session.api().room_detail(&room_id).await {
                    Ok(detail) => RoomEvent::DetailFetched(detail),
                    Err(err) => {
                        warn!(%room_id, %err, "room fetch failed");
                        RoomEvent::FetchFailed { kind: err.kind() }
                    },
                };
                // A 401 on the fetch ends the session before the room reacts
                session.run_pending().await;
                pending.extend(self.feed(event));
                continue;
            }
            notices.extend(self.execute(action));
        }
        notices
    }

    fn ingest(&mut self, event: RoomEvent) -> Vec<RoomNotice> {
        self.feed(event).into_iter().filter_map(|action| self.execute(action)).collect()
    }

    fn feed(&mut self, event: RoomEvent) -> Vec<RoomAction> {
        self.controller.handle(event).unwrap_or_else(|err| {
            debug!(%err, "room event refused");
            Vec::new()
        })
    }

    fn execute(&mut self, action: RoomAction) -> Option<RoomNotice> {
        match action {
            RoomAction::FetchRoom { room_id } => {
                warn!(%room_id, "room fetch requested outside open");
                None
            },
            RoomAction::Subscribe { room_id, events } => {
                self.subscriptions.clear();
                for &event in events.iter().chain([&EVENT_RECONNECTED]) {
                    let handler = forward(event, self.inbox_tx.clone());
                    self.subscriptions.push(self.push.subscribe(event, handler));
                }
                info!(%room_id, events = events.len(), "subscribed to room events");
                None
            },
            RoomAction::EmitSpectate { room_id, payload } => {
                let inbox = self.inbox_tx.clone();
                let ack: AckHandler = Box::new(move |data: Value| {
                    if inbox.send(RoomEvent::SpectateAcked(data)).is_err() {
                        debug!("room closed before spectate ack");
                    }
                });
                if let Err(err) = self.push.emit(EVENT_SPECTATE, payload, Some(ack)) {
                    warn!(%room_id, %err, "spectate request not sent; following live events only");
                }
                None
            },
            RoomAction::Unsubscribe { room_id } => {
                let released = self.subscriptions.len();
                self.subscriptions.clear();
                info!(%room_id, released, "unsubscribed from room events");
                None
            },
            RoomAction::NavigateAway { room_id } => Some(RoomNotice::NavigateAway { room_id }),
            RoomAction::ReportFailure { room_id, kind, retryable } => {
                Some(RoomNotice::FetchFailed { room_id, kind, retryable })
            },
            RoomAction::LatestAdvanced { epoch, following } => {
                Some(RoomNotice::Updated { epoch, following })
            },
        }
    }
}

/// Handler that queues `event` payloads into a room inbox.
fn forward(event: &'static str, inbox: mpsc::UnboundedSender<RoomEvent>) -> EventHandler {
    Arc::new(move |data: &Value| {
        let room_event = match event {
            EVENT_GAMESTATE => RoomEvent::GameState(data.clone()),
            EVENT_JOINED => RoomEvent::Joined(data.clone()),
            EVENT_FINISHED => RoomEvent::Finished(data.clone()),
            EVENT_RECONNECTED => RoomEvent::Reconnected,
            other => {
                debug!(event = other, "no room event for push event");
                return;
            },
        };
        if inbox.send(room_event).is_err() {
            debug!(event, "room inbox closed");
        }
    })
}
