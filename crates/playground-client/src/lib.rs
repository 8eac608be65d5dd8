//! Playground client.
//!
//! Async drivers around the sans-IO engines of `playground-core`, plus the
//! transports they run on.
//!
//! ## Architecture
//!
//! ```text
//! playground-client
//!   ├─ SessionManager     (drives Session over an Api)
//!   ├─ RoomDriver         (drives RoomController over an Api and a PushChannel)
//!   ├─ Api                (request/response)
//!   │    ├─ HttpApi       (JSON over HTTP via reqwest)
//!   │    └─ MemoryApi     (scripted replies)
//!   ├─ PushChannel        (named events, emits with acknowledgement)
//!   │    ├─ WebSocketChannel  (tokio-tungstenite, auto-reconnect)
//!   │    └─ MemoryPushChannel (test-driven)
//!   ├─ credential_channel (bearer attachment and 401 reports)
//!   └─ SystemEnv          (production Environment impl)
//! ```
//!
//! The session manager is the only writer of the credential. Every [`Api`]
//! reads it when a request is sent, and gated calls report 401s back to the
//! manager, which moves the session to `AuthRequired` on its next turn.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
mod config;
mod credential;
mod error;
pub mod push;
mod room;
mod session;
mod system_env;

pub use api::{Api, Call, HttpApi, MemoryApi, Recorded};
pub use config::{
    ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_PUSH_URL, EmitPolicy, ReconnectPolicy,
};
pub use credential::{CredentialReader, CredentialWriter, credential_channel};
pub use error::{ClientError, TransportError};
pub use playground_core as core;
pub use push::{
    AckHandler, ChannelStatus, EVENT_RECONNECTED, EventHandler, MemoryPushChannel, PushChannel,
    Subscription, WebSocketChannel,
};
pub use room::{RoomDriver, RoomNotice};
pub use session::SessionManager;
pub use system_env::SystemEnv;
