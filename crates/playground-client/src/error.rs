//! Client error types.

use playground_core::{ErrorKind, RoomError, SessionError};
use thiserror::Error;

/// Errors from the request/response client and the push channel.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A configured or derived URL is invalid.
    #[error("invalid url {url}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// No response was received.
    #[error("request failed: {reason}")]
    Network {
        /// Underlying failure.
        reason: String,
    },

    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Backend message, or the canonical reason.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("undecodable response: {reason}")]
    Decode {
        /// Decoder message.
        reason: String,
    },

    /// The push channel is not open and the emit policy fails fast.
    #[error("push channel disconnected")]
    Disconnected,

    /// The emit queue is full.
    #[error("emit queue full ({capacity} pending)")]
    QueueFull {
        /// Configured queue bound.
        capacity: usize,
    },
}

impl TransportError {
    /// Classify the failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::NetworkUnavailable,
            Self::Status { status, .. } => match status {
                401 => ErrorKind::Unauthorized,
                404 => ErrorKind::NotFound,
                400 | 422 => ErrorKind::ValidationRejected,
                _ => ErrorKind::Server,
            },
            Self::InvalidUrl { .. } | Self::Decode { .. } => ErrorKind::Protocol,
            Self::Disconnected | Self::QueueFull { .. } => ErrorKind::ChannelDisconnected,
        }
    }

    /// Backend message carried by a status error.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => Some(message),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode { reason: err.to_string() };
        }
        if let Some(status) = err.status() {
            return Self::Status { status: status.as_u16(), message: err.to_string() };
        }
        Self::Network { reason: err.to_string() }
    }
}

/// Errors returned by the drivers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A transport call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The session rejected the operation.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The room rejected the operation.
    #[error(transparent)]
    Room(#[from] RoomError),
}

impl ClientError {
    /// Classification of transport failures; `None` for caller errors.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Transport(err) => Some(err.kind()),
            Self::Session(_) | Self::Room(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> TransportError {
        TransportError::Status { status: code, message: String::new() }
    }

    #[test]
    fn status_classification() {
        assert_eq!(status(401).kind(), ErrorKind::Unauthorized);
        assert_eq!(status(404).kind(), ErrorKind::NotFound);
        assert_eq!(status(400).kind(), ErrorKind::ValidationRejected);
        assert_eq!(status(422).kind(), ErrorKind::ValidationRejected);
        assert_eq!(status(500).kind(), ErrorKind::Server);
        assert_eq!(status(418).kind(), ErrorKind::Server);
    }

    #[test]
    fn transport_failures_classify() {
        assert_eq!(
            TransportError::Network { reason: "refused".into() }.kind(),
            ErrorKind::NetworkUnavailable
        );
        assert_eq!(TransportError::Decode { reason: "eof".into() }.kind(), ErrorKind::Protocol);
        assert_eq!(TransportError::Disconnected.kind(), ErrorKind::ChannelDisconnected);
        assert!(TransportError::QueueFull { capacity: 1 }.kind().is_retryable());
    }

    #[test]
    fn backend_message_only_for_status() {
        let err = TransportError::Status { status: 401, message: "Incorrect password".into() };
        assert_eq!(err.backend_message(), Some("Incorrect password"));
        assert_eq!(TransportError::Disconnected.backend_message(), None);
    }
}
