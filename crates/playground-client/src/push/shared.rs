//! Connection-independent channel state.
//!
//! [`ChannelCore`] outlives individual connections. It holds the handler
//! registry, pending acknowledgements, the outbox and the status, so a
//! reconnect only swaps the socket underneath.
//!
//! Handlers are always called with the lock released: a handler may
//! subscribe, unsubscribe or emit without deadlocking.
//!
//! Every open after the first one calls the handlers registered for
//! [`EVENT_RECONNECTED`] with `null`.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard, PoisonError},
};

use playground_proto::{InboundFrame, OutboundFrame};
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::{AckHandler, ChannelStatus, EVENT_RECONNECTED, EventHandler};
use crate::{config::EmitPolicy, error::TransportError};

struct Inner {
    handlers: HashMap<String, Vec<(u64, EventHandler)>>,
    next_handler: u64,
    pending_acks: HashMap<u64, AckHandler>,
    next_ack: u64,
    outbox: VecDeque<OutboundFrame>,
    status: ChannelStatus,
    opened_before: bool,
}

pub(crate) struct ChannelCore {
    inner: Mutex<Inner>,
    outbox_ready: Notify,
    policy: EmitPolicy,
    max_queued: usize,
}

impl ChannelCore {
    pub(crate) fn new(policy: EmitPolicy, max_queued: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                handlers: HashMap::new(),
                next_handler: 0,
                pending_acks: HashMap::new(),
                next_ack: 1,
                outbox: VecDeque::new(),
                status: ChannelStatus::Connecting,
                opened_before: false,
            }),
            outbox_ready: Notify::new(),
            policy,
            max_queued,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn subscribe(&self, event: &str, handler: EventHandler) -> u64 {
        let mut inner = self.lock();
        let id = inner.next_handler;
        inner.next_handler += 1;
        inner.handlers.entry(event.to_string()).or_default().push((id, handler));
        debug!(event, id, "subscribed");
        id
    }

    pub(crate) fn unsubscribe(&self, event: &str, id: u64) {
        let mut inner = self.lock();
        if let Some(handlers) = inner.handlers.get_mut(event) {
            handlers.retain(|(handler_id, _)| *handler_id != id);
            if handlers.is_empty() {
                inner.handlers.remove(event);
            }
        }
        debug!(event, id, "unsubscribed");
    }

    pub(crate) fn subscriber_count(&self, event: &str) -> usize {
        self.lock().handlers.get(event).map_or(0, Vec::len)
    }

    pub(crate) fn emit(
        &self,
        event: &str,
        data: Value,
        ack: Option<AckHandler>,
    ) -> Result<(), TransportError> {
        {
            let mut inner = self.lock();
            if inner.status != ChannelStatus::Open {
                if self.policy == EmitPolicy::FailFast {
                    debug!(event, status = ?inner.status, "emit refused while not open");
                    return Err(TransportError::Disconnected);
                }
                if matches!(inner.status, ChannelStatus::Exhausted) {
                    return Err(TransportError::Disconnected);
                }
            }
            if inner.outbox.len() >= self.max_queued {
                warn!(event, capacity = self.max_queued, "emit queue full");
                return Err(TransportError::QueueFull { capacity: self.max_queued });
            }

            let id = ack.map(|ack| {
                let id = inner.next_ack;
                inner.next_ack += 1;
                inner.pending_acks.insert(id, ack);
                id
            });
            inner.outbox.push_back(OutboundFrame::Emit { event: event.to_string(), data, id });
        }

        self.outbox_ready.notify_one();
        Ok(())
    }

    /// Wait until an emit may be waiting in the outbox.
    pub(crate) async fn outbox_ready(&self) {
        self.outbox_ready.notified().await;
    }

    /// Take the oldest queued frame if the channel is open.
    pub(crate) fn pop_outbox(&self) -> Option<OutboundFrame> {
        let mut inner = self.lock();
        if inner.status != ChannelStatus::Open {
            return None;
        }
        inner.outbox.pop_front()
    }

    /// Put back a frame that could not be written, ahead of everything else.
    ///
    /// Its acknowledgement handler stays pending. Dropped if the channel is
    /// already exhausted.
    pub(crate) fn requeue_front(&self, frame: OutboundFrame) {
        let mut inner = self.lock();
        if inner.status == ChannelStatus::Exhausted {
            if let Some(id) = frame.ack_id() {
                inner.pending_acks.remove(&id);
            }
            debug!(event = frame.event(), "dropping unsent frame of exhausted channel");
            return;
        }
        debug!(event = frame.event(), "requeued unsent frame");
        inner.outbox.push_front(frame);
    }

    pub(crate) fn status(&self) -> ChannelStatus {
        self.lock().status
    }

    pub(crate) fn set_status(&self, status: ChannelStatus) {
        let mut inner = self.lock();
        if inner.status == status {
            return;
        }
        info!(from = ?inner.status, to = ?status, "push channel status");

        if inner.status == ChannelStatus::Open {
            // Emits still in the outbox were never sent and keep their handlers
            let queued: Vec<u64> = inner.outbox.iter().filter_map(OutboundFrame::ack_id).collect();
            let before = inner.pending_acks.len();
            inner.pending_acks.retain(|id, _| queued.contains(id));
            let dropped = before - inner.pending_acks.len();
            if dropped > 0 {
                debug!(dropped, "discarded acknowledgement handlers of lost emits");
            }
        }
        if status == ChannelStatus::Exhausted {
            inner.outbox.clear();
            inner.pending_acks.clear();
        }
        inner.status = status;

        if status != ChannelStatus::Open {
            return;
        }
        let resumed = std::mem::replace(&mut inner.opened_before, true);
        let pending = !inner.outbox.is_empty();
        let handlers = if resumed { handlers_for(&inner, EVENT_RECONNECTED) } else { Vec::new() };
        drop(inner);

        if pending {
            self.outbox_ready.notify_one();
        }
        for handler in handlers {
            handler(&Value::Null);
        }
    }

    /// Route an inbound frame to its handlers.
    pub(crate) fn dispatch(&self, frame: InboundFrame) {
        match frame {
            InboundFrame::Event { event, data } => {
                if event == EVENT_RECONNECTED {
                    warn!(%event, "dropping server event with a reserved name");
                    return;
                }
                let handlers = handlers_for(&self.lock(), &event);

                if handlers.is_empty() {
                    debug!(%event, "no subscriber for event");
                }
                for handler in handlers {
                    handler(&data);
                }
            },
            InboundFrame::Ack { id, data } => {
                let ack = self.lock().pending_acks.remove(&id);
                match ack {
                    Some(ack) => ack(data),
                    None => debug!(id, "acknowledgement without pending emit"),
                }
            },
        }
    }
}

fn handlers_for(inner: &Inner, event: &str) -> Vec<EventHandler> {
    inner
        .handlers
        .get(event)
        .map(|handlers| handlers.iter().map(|(_, h)| h.clone()).collect())
        .unwrap_or_default()
}
