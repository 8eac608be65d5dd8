//! In-memory push channel for tests and offline drivers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use playground_proto::{InboundFrame, OutboundFrame};
use serde_json::Value;

use super::{AckHandler, ChannelStatus, EventHandler, PushChannel, Subscription, shared::ChannelCore};
use crate::{
    config::{ClientConfig, EmitPolicy},
    error::TransportError,
};

/// [`PushChannel`] driven by the test instead of a socket.
///
/// Starts in [`ChannelStatus::Connecting`]. Frames "sent" while open are
/// recorded and can be inspected with [`sent`](Self::sent). Clones share
/// state.
#[derive(Clone)]
pub struct MemoryPushChannel {
    core: Arc<ChannelCore>,
    sent: Arc<Mutex<Vec<OutboundFrame>>>,
}

impl MemoryPushChannel {
    /// Create a channel with the given emit policy and queue bound.
    pub fn new(policy: EmitPolicy, max_queued: usize) -> Self {
        Self { core: Arc::new(ChannelCore::new(policy, max_queued)), sent: Arc::default() }
    }

    /// Create a channel with the policy from `config`.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.emit_policy, config.max_queued_emits)
    }

    fn sent_lock(&self) -> MutexGuard<'_, Vec<OutboundFrame>> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self) {
        while let Some(frame) = self.core.pop_outbox() {
            self.sent_lock().push(frame);
        }
    }

    /// Simulate a successful (re)connect; flushes queued emits.
    ///
    /// Reconnect handlers run before the flush.
    pub fn connect(&self) {
        self.core.set_status(ChannelStatus::Open);
        self.flush();
    }

    /// Simulate a dropped connection.
    pub fn disconnect(&self, attempt: u32) {
        self.core.set_status(ChannelStatus::Reconnecting { attempt });
    }

    /// Simulate retries running out.
    pub fn exhaust(&self) {
        self.core.set_status(ChannelStatus::Exhausted);
    }

    /// Deliver a server event to the subscribed handlers.
    pub fn deliver(&self, event: &str, data: Value) {
        self.core.dispatch(InboundFrame::Event { event: event.to_string(), data });
    }

    /// Deliver the server's reply to emit `id`.
    pub fn ack(&self, id: u64, data: Value) {
        self.core.dispatch(InboundFrame::Ack { id, data });
    }

    /// Frames sent so far.
    pub fn sent(&self) -> Vec<OutboundFrame> {
        self.sent_lock().clone()
    }

    /// Number of handlers registered for `event`.
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.core.subscriber_count(event)
    }
}

impl Default for MemoryPushChannel {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl PushChannel for MemoryPushChannel {
    fn subscribe(&self, event: &str, handler: EventHandler) -> Subscription {
        let id = self.core.subscribe(event, handler);
        Subscription::new(event, id, &self.core)
    }

    fn emit(&self, event: &str, data: Value, ack: Option<AckHandler>) -> Result<(), TransportError> {
        self.core.emit(event, data, ack)?;
        self.flush();
        Ok(())
    }

    fn status(&self) -> ChannelStatus {
        self.core.status()
    }
}
