//! In-memory [`Api`] with scripted replies.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use playground_proto::{
    AuthResponse, LoginRequest, RegisterRequest, RoomDetail, RoomId, RoomSummary, UserResponse,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::Api;
use crate::{credential::CredentialReader, error::TransportError};

/// Backend call, used to script replies and inspect traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    /// `POST /auth/login`.
    Login,
    /// `POST /auth/guest`.
    GuestLogin,
    /// `POST /auth/register`.
    Register,
    /// `POST /auth/refresh`.
    Refresh,
    /// `POST /auth/logout`.
    Logout,
    /// `GET /auth/me`.
    Identity,
    /// `GET /rooms/`.
    ListRooms,
    /// `GET /rooms/{id}`.
    RoomDetail,
}

impl Call {
    fn is_gated(self) -> bool {
        matches!(self, Self::Identity | Self::ListRooms | Self::RoomDetail)
    }
}

/// One observed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    /// Which call was made.
    pub call: Call,
    /// `Authorization` value attached when it was sent.
    pub authorization: Option<String>,
}

#[derive(Debug, Default)]
struct Script {
    replies: HashMap<Call, VecDeque<Result<Value, TransportError>>>,
    recorded: Vec<Recorded>,
}

/// [`Api`] that replays scripted JSON replies.
///
/// Each call pops the next reply scripted for it. An unscripted call fails
/// with a network error. Clones share the script.
#[derive(Debug, Clone)]
pub struct MemoryApi {
    script: Arc<Mutex<Script>>,
    credentials: CredentialReader,
}

impl MemoryApi {
    /// Create an API with an empty script.
    pub fn new(credentials: CredentialReader) -> Self {
        Self { script: Arc::default(), credentials }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a successful JSON reply for `call`.
    pub fn reply(&self, call: Call, body: Value) -> &Self {
        self.lock().replies.entry(call).or_default().push_back(Ok(body));
        self
    }

    /// Queue a failure for `call`.
    pub fn fail(&self, call: Call, error: TransportError) -> &Self {
        self.lock().replies.entry(call).or_default().push_back(Err(error));
        self
    }

    /// Every request made so far, in order.
    pub fn recorded(&self) -> Vec<Recorded> {
        self.lock().recorded.clone()
    }

    /// Number of times `call` was made.
    pub fn count(&self, call: Call) -> usize {
        self.lock().recorded.iter().filter(|r| r.call == call).count()
    }

    fn next<T: DeserializeOwned>(&self, call: Call) -> Result<T, TransportError> {
        let (generation, authorization) = self.credentials.current();
        let reply = {
            let mut script = self.lock();
            script.recorded.push(Recorded { call, authorization });
            script.replies.get_mut(&call).and_then(VecDeque::pop_front)
        };

        match reply {
            Some(Ok(body)) => {
                serde_json::from_value(body).map_err(|e| TransportError::Decode { reason: e.to_string() })
            },
            Some(Err(err)) => {
                if call.is_gated() && matches!(err, TransportError::Status { status: 401, .. }) {
                    self.credentials.report_unauthorized(generation);
                }
                Err(err)
            },
            None => Err(TransportError::Network { reason: format!("no scripted reply for {call:?}") }),
        }
    }
}

#[async_trait]
impl Api for MemoryApi {
    async fn login(&self, _request: &LoginRequest) -> Result<AuthResponse, TransportError> {
        self.next(Call::Login)
    }

    async fn guest_login(&self) -> Result<AuthResponse, TransportError> {
        self.next(Call::GuestLogin)
    }

    async fn register(&self, _request: &RegisterRequest) -> Result<AuthResponse, TransportError> {
        self.next(Call::Register)
    }

    async fn refresh(&self) -> Result<AuthResponse, TransportError> {
        self.next(Call::Refresh)
    }

    async fn logout(&self) -> Result<(), TransportError> {
        self.next::<Value>(Call::Logout).map(|_| ())
    }

    async fn identity(&self) -> Result<UserResponse, TransportError> {
        self.next(Call::Identity)
    }

    async fn list_rooms(&self) -> Result<Vec<RoomSummary>, TransportError> {
        self.next(Call::ListRooms)
    }

    async fn room_detail(&self, _room_id: &RoomId) -> Result<RoomDetail, TransportError> {
        self.next(Call::RoomDetail)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Instant;

    use playground_core::Credential;
    use serde_json::json;

    use super::*;
    use crate::credential::credential_channel;

    #[tokio::test]
    async fn replays_in_order_and_records_bearer() {
        let (writer, reader) = credential_channel();
        let api = MemoryApi::new(reader);
        api.reply(Call::Refresh, json!({"success": true, "access_token": "t1"}))
            .fail(Call::Refresh, TransportError::Network { reason: "down".into() });

        writer.attach(1, Some(Credential::new("t0", Instant::now())));
        let first = api.refresh().await.unwrap();
        assert_eq!(first.token(), Some("t1"));
        assert!(api.refresh().await.is_err());
        assert!(api.refresh().await.is_err());

        let recorded = api.recorded();
        assert_eq!(recorded.len(), 3);
        assert_eq!(recorded[0].authorization.as_deref(), Some("Bearer t0"));
        assert_eq!(api.count(Call::Refresh), 3);
    }

    #[tokio::test]
    async fn gated_401_is_reported() {
        let (mut writer, reader) = credential_channel();
        let api = MemoryApi::new(reader);
        writer.attach(4, Some(Credential::new("t", Instant::now())));
        api.fail(Call::ListRooms, TransportError::Status { status: 401, message: String::new() })
            .fail(Call::Login, TransportError::Status { status: 401, message: String::new() });

        assert!(api.list_rooms().await.is_err());
        assert!(
            api.login(&LoginRequest { email: "a".into(), password: "b".into() }).await.is_err()
        );

        assert_eq!(writer.try_next_unauthorized(), Some(4));
        assert_eq!(writer.try_next_unauthorized(), None);
    }
}
