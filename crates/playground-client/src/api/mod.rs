//! Request/response surface of the backend.
//!
//! [`Api`] is the seam between the drivers and the network. [`HttpApi`] talks
//! JSON over HTTP; [`MemoryApi`] replays scripted replies for tests.
//!
//! Calls other than login, guest login, registration, refresh and logout are
//! *gated*: the session manager only issues them while authenticated, and an
//! implementation reports a 401 on them through its
//! [`CredentialReader`](crate::CredentialReader).

mod http;
mod memory;

use async_trait::async_trait;
pub use http::HttpApi;
pub use memory::{Call, MemoryApi, Recorded};
use playground_proto::{
    AuthResponse, LoginRequest, RegisterRequest, RoomDetail, RoomId, RoomSummary, UserResponse,
};

use crate::error::TransportError;

/// Backend request/response calls.
#[async_trait]
pub trait Api: Send + Sync {
    /// Submit email and password.
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, TransportError>;

    /// Log in as a guest.
    async fn guest_login(&self) -> Result<AuthResponse, TransportError>;

    /// Create an account.
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, TransportError>;

    /// Exchange the refresh cookie for a fresh credential.
    async fn refresh(&self) -> Result<AuthResponse, TransportError>;

    /// Invalidate the backend session.
    async fn logout(&self) -> Result<(), TransportError>;

    /// Fetch the identity of the attached credential. Gated.
    async fn identity(&self) -> Result<UserResponse, TransportError>;

    /// List rooms. Gated.
    async fn list_rooms(&self) -> Result<Vec<RoomSummary>, TransportError>;

    /// Fetch one room with its stored history. Gated.
    async fn room_detail(&self, room_id: &RoomId) -> Result<RoomDetail, TransportError>;
}
