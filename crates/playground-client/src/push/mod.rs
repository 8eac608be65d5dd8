//! Persistent push channel.
//!
//! A [`PushChannel`] carries named server events to subscribed handlers and
//! client emits to the server, optionally with a one-shot acknowledgement
//! handler. Reconnection is the channel's business: handlers stay registered
//! across reconnects and subscribers never resubscribe.
//!
//! # Emit policy
//!
//! With [`EmitPolicy::Queue`](crate::EmitPolicy::Queue), emits issued while the
//! channel is not open are held (up to the configured bound) and flushed in
//! order on the next open. With
//! [`EmitPolicy::FailFast`](crate::EmitPolicy::FailFast) they fail with
//! [`TransportError::Disconnected`].
//!
//! Acknowledgement handlers of emits that already went out are dropped when
//! the connection drops; the backend answers on the connection that carried
//! the emit or not at all. A frame whose write failed was not sent and is
//! queued again at the front. Subscribers to [`EVENT_RECONNECTED`] learn
//! about every reopen and re-issue whatever they were still waiting on.

mod memory;
mod shared;
mod websocket;

use std::{
    fmt,
    sync::{Arc, Weak},
};

pub use memory::MemoryPushChannel;
use serde_json::Value;
pub use websocket::WebSocketChannel;

use self::shared::ChannelCore;
use crate::error::TransportError;

/// Channel-local event raised with `null` each time the channel reopens after
/// a drop. Never sent by the backend; inbound frames using the name are
/// dropped.
pub const EVENT_RECONNECTED: &str = "$reconnected";

/// Handler for a named server event. Called once per event, in arrival order.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handler for the single reply to an emit.
pub type AckHandler = Box<dyn FnOnce(Value) + Send>;

/// Connection state of a push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// First connection attempt in progress.
    Connecting,
    /// Connected; emits go out immediately.
    Open,
    /// Connection lost; retrying.
    Reconnecting {
        /// Consecutive failed attempts so far.
        attempt: u32,
    },
    /// Retries exhausted. Live updates stop until a new channel is created.
    Exhausted,
}

/// Duplex, auto-reconnecting event channel.
pub trait PushChannel: Send + Sync {
    /// Register `handler` for `event`. Released when the returned
    /// [`Subscription`] is unsubscribed or dropped.
    fn subscribe(&self, event: &str, handler: EventHandler) -> Subscription;

    /// Send `data` as `event`. If `ack` is given, it is called with the
    /// backend's reply.
    fn emit(&self, event: &str, data: Value, ack: Option<AckHandler>) -> Result<(), TransportError>;

    /// Current connection state.
    fn status(&self) -> ChannelStatus;
}

/// Scoped handler registration.
///
/// Unsubscribing is idempotent and never fails, even if the channel itself is
/// gone. Dropping the handle unsubscribes.
pub struct Subscription {
    event: String,
    id: u64,
    core: Option<Weak<ChannelCore>>,
}

impl Subscription {
    fn new(event: &str, id: u64, core: &Arc<ChannelCore>) -> Self {
        Self { event: event.to_string(), id, core: Some(Arc::downgrade(core)) }
    }

    /// Event this subscription listens to.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Returns true until the subscription is released.
    pub fn is_active(&self) -> bool {
        self.core.is_some()
    }

    /// Release the handler.
    pub fn unsubscribe(&mut self) {
        if let Some(core) = self.core.take().and_then(|weak| weak.upgrade()) {
            core.unsubscribe(&self.event, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
