//! WebSocket push channel with automatic reconnect.
//!
//! ```text
//!   Connecting ──ok──► Open ──drop──► Reconnecting{1} ──ok──► Open
//!       │                                  │
//!       └──fail──► Reconnecting{n} ──...───┴──n > max_attempts──► Exhausted
//! ```
//!
//! One background task owns the socket. It waits out the backoff through the
//! [`Environment`], so tests can drive it on a virtual clock.

use std::sync::Arc;

use futures_util::{Sink, SinkExt, StreamExt};
use playground_core::Environment;
use playground_proto::InboundFrame;
use serde_json::Value;
use tokio::{
    net::TcpStream,
    sync::oneshot,
    task::JoinHandle,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use super::{AckHandler, ChannelStatus, EventHandler, PushChannel, Subscription, shared::ChannelCore};
use crate::{
    config::{ClientConfig, ReconnectPolicy},
    error::TransportError,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a connection ended.
enum Ended {
    Shutdown,
    Dropped(String),
}

/// [`PushChannel`] over a WebSocket.
///
/// Dropping the channel stops the background task.
pub struct WebSocketChannel {
    core: Arc<ChannelCore>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl WebSocketChannel {
    /// Start connecting to `config.push_url` in the background.
    ///
    /// Must be called within a Tokio runtime. Returns immediately with the
    /// channel in [`ChannelStatus::Connecting`]; subscriptions and queued
    /// emits may be made right away.
    pub fn connect<E: Environment>(config: &ClientConfig, env: E) -> Result<Self, TransportError> {
        let url = Url::parse(&config.push_url).map_err(|e| TransportError::InvalidUrl {
            url: config.push_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TransportError::InvalidUrl {
                url: config.push_url.clone(),
                reason: "push url must use ws or wss".to_string(),
            });
        }

        let core = Arc::new(ChannelCore::new(config.emit_policy, config.max_queued_emits));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(url, core.clone(), config.reconnect, env, shutdown_rx));

        Ok(Self { core, shutdown: Some(shutdown_tx), task })
    }

    /// Stop the background task and close the socket.
    pub fn shutdown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // The task may already have exited after exhausting retries
            let _ = shutdown.send(());
        }
    }

    /// Returns true once the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl PushChannel for WebSocketChannel {
    fn subscribe(&self, event: &str, handler: EventHandler) -> Subscription {
        let id = self.core.subscribe(event, handler);
        Subscription::new(event, id, &self.core)
    }

    fn emit(&self, event: &str, data: Value, ack: Option<AckHandler>) -> Result<(), TransportError> {
        self.core.emit(event, data, ack)
    }

    fn status(&self) -> ChannelStatus {
        self.core.status()
    }
}

/// Connect, serve, and reconnect until shutdown or exhaustion.
async fn run<E: Environment>(
    url: Url,
    core: Arc<ChannelCore>,
    policy: ReconnectPolicy,
    env: E,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut failures: u32 = 0;

    loop {
        let connected = tokio::select! {
            result = connect_async(url.as_str()) => result,
            _ = &mut shutdown => return,
        };

        match connected {
            Ok((socket, _)) => {
                info!(%url, "push channel connected");
                failures = 0;
                core.set_status(ChannelStatus::Open);

                match serve(socket, &core, &mut shutdown).await {
                    Ended::Shutdown => {
                        debug!("push channel shut down");
                        return;
                    },
                    Ended::Dropped(reason) => warn!(%reason, "push channel dropped"),
                }
            },
            Err(err) => warn!(%url, %err, attempt = failures + 1, "push channel connect failed"),
        }

        failures += 1;
        if failures > policy.max_attempts {
            error!(attempts = policy.max_attempts, "push channel retries exhausted");
            core.set_status(ChannelStatus::Exhausted);
            return;
        }
        core.set_status(ChannelStatus::Reconnecting { attempt: failures });

        let delay = policy.delay(failures - 1);
        debug!(?delay, attempt = failures, "waiting before reconnect");
        tokio::select! {
            () = env.sleep(delay) => {},
            _ = &mut shutdown => return,
        }
    }
}

/// Pump frames until the connection ends.
async fn serve(socket: Socket, core: &ChannelCore, shutdown: &mut oneshot::Receiver<()>) -> Ended {
    let (mut sink, mut stream) = socket.split();

    // Emits queued while disconnected go out first
    if let Err(reason) = flush(&mut sink, core).await {
        return Ended::Dropped(reason);
    }

    loop {
        tokio::select! {
            () = core.outbox_ready() => {
                if let Err(reason) = flush(&mut sink, core).await {
                    return Ended::Dropped(reason);
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<InboundFrame>(&text) {
                    Ok(frame) => core.dispatch(frame),
                    Err(err) => warn!(%err, "dropping undecodable push frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    return Ended::Dropped(format!("closed by server: {frame:?}"));
                },
                Some(Ok(_)) => {},
                Some(Err(err)) => return Ended::Dropped(err.to_string()),
                None => return Ended::Dropped("stream ended".to_string()),
            },
            _ = &mut *shutdown => {
                if let Err(err) = sink.send(Message::Close(None)).await {
                    debug!(%err, "close frame not sent");
                }
                return Ended::Shutdown;
            },
        }
    }
}

async fn flush<S>(sink: &mut S, core: &ChannelCore) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(frame) = core.pop_outbox() {
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(err) => {
                error!(%err, event = frame.event(), "failed to encode emit");
                continue;
            },
        };
        if let Err(err) = sink.send(Message::Text(text)).await {
            // Resent on the next connection
            core.requeue_front(frame);
            return Err(err.to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{
        sync::Mutex,
        time::{Duration, Instant},
    };

    use playground_proto::OutboundFrame;
    use serde_json::json;

    use super::*;
    use crate::config::EmitPolicy;

    #[derive(Clone)]
    struct InstantEnv;

    impl Environment for InstantEnv {
        fn now(&self) -> Instant {
            Instant::now()
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            std::future::ready(())
        }
    }

    #[tokio::test]
    async fn failed_send_keeps_unsent_frames_queued() {
        let core = ChannelCore::new(EmitPolicy::Queue, 8);
        core.set_status(ChannelStatus::Open);
        for (event, data) in [("a", json!(1)), ("b", json!(2)), ("c", json!(3))] {
            core.emit(event, data, None).unwrap();
        }

        // Accepts one message, then the connection resets
        let written = Arc::new(Mutex::new(Vec::new()));
        let log = written.clone();
        let mut sink = Box::pin(futures_util::sink::unfold(0usize, move |sent, message: Message| {
            let log = log.clone();
            async move {
                if sent == 1 {
                    return Err("connection reset".to_string());
                }
                log.lock().unwrap().push(message);
                Ok(sent + 1)
            }
        }));

        let err = flush(&mut sink, &core).await.unwrap_err();
        assert_eq!(err, "connection reset");
        assert_eq!(written.lock().unwrap().len(), 1);

        let unsent: Vec<_> = std::iter::from_fn(|| core.pop_outbox()).collect();
        assert_eq!(unsent.iter().map(OutboundFrame::event).collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn rejects_non_websocket_url() {
        let config = ClientConfig::new("http://localhost", "http://localhost/ws");
        assert!(matches!(
            WebSocketChannel::connect(&config, InstantEnv),
            Err(TransportError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_backend_exhausts_retries() {
        let config = ClientConfig::new("http://127.0.0.1:9", "ws://127.0.0.1:9/ws").with_reconnect(
            ReconnectPolicy {
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                max_attempts: 2,
            },
        );
        let channel = WebSocketChannel::connect(&config, InstantEnv).unwrap();

        for _ in 0..200 {
            if channel.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(channel.status(), ChannelStatus::Exhausted);
        assert!(matches!(
            channel.emit("spectate", serde_json::json!({}), None),
            Err(TransportError::Disconnected)
        ));
    }
}
