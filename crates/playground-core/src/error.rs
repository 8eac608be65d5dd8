//! Error classification and session errors.

use std::fmt;

use thiserror::Error;

use playground_proto::RoomId;

use crate::{room::RoomPhase, session::SessionState};

/// Classification of a failed request or channel operation.
///
/// Drivers map transport-level failures onto these kinds; the engines only
/// ever branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response was received.
    NetworkUnavailable,
    /// The credential was missing, expired, or rejected.
    Unauthorized,
    /// The room or resource does not exist.
    NotFound,
    /// The backend rejected the submitted values, e.g. bad login credentials.
    ValidationRejected,
    /// The push channel is down.
    ChannelDisconnected,
    /// The backend answered with an unexpected status.
    Server,
    /// The response body could not be decoded.
    Protocol,
}

impl ErrorKind {
    /// Returns true if repeating the same call may succeed.
    pub fn is_retryable(self) -> bool {
        match self {
            Self::NetworkUnavailable | Self::ChannelDisconnected | Self::Server => true,

            Self::Unauthorized | Self::NotFound | Self::ValidationRejected | Self::Protocol => {
                false
            },
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NetworkUnavailable => "network unavailable",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not found",
            Self::ValidationRejected => "validation rejected",
            Self::ChannelDisconnected => "channel disconnected",
            Self::Server => "server error",
            Self::Protocol => "protocol error",
        };
        f.write_str(text)
    }
}

/// Errors from session operations requested by a caller.
///
/// Completions of in-flight calls never produce errors; stale completions are
/// dropped instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The operation is not valid in the current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// Requested operation.
        operation: &'static str,
        /// State at the time of the request.
        state: SessionState,
    },

    /// A gated call was attempted without an authenticated session.
    #[error("not authenticated (session is {state})")]
    NotAuthenticated {
        /// State at the time of the request.
        state: SessionState,
    },

    /// Another credential submission is still in flight.
    #[error("a login is already in flight")]
    LoginInFlight,
}

/// Errors from room operations requested by a caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    /// The room cannot be opened in its current phase.
    #[error("cannot open room {room_id} while {phase:?}")]
    InvalidPhase {
        /// Room the request was for.
        room_id: RoomId,
        /// Phase at the time of the request.
        phase: RoomPhase,
    },
}
