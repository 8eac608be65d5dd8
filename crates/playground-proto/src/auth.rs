//! Authentication bodies.
//!
//! # Security
//!
//! - **Debug Redaction**: request and response types that hold passwords or
//!   bearer tokens implement `Debug` by hand and never print the secret.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Explicit login with email and password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Account registration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Desired display name.
    pub username: String,
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Reply of login, guest-login, register, and refresh.
///
/// `success == false` is a rejection with an optional human readable
/// `message`. `success == true` without a token is only produced by
/// registration of an account that still awaits approval.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Outcome discriminator.
    pub success: bool,
    /// Bearer token on success.
    #[serde(default, alias = "payload", skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Rejection or status message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AuthResponse {
    /// Successful reply carrying a token.
    pub fn granted(token: impl Into<String>) -> Self {
        Self { success: true, access_token: Some(token.into()), message: None }
    }

    /// Rejected reply.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self { success: false, access_token: None, message: Some(message.into()) }
    }

    /// Token if the reply granted one.
    pub fn token(&self) -> Option<&str> {
        if self.success { self.access_token.as_deref().filter(|t| !t.is_empty()) } else { None }
    }
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("success", &self.success)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("message", &self.message)
            .finish()
    }
}

/// A role as returned by the identity call.
///
/// Older backends return bare role names, newer ones return objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleEntry {
    /// Bare role name.
    Name(String),
    /// Role object.
    Detailed {
        /// Role name.
        name: String,
        /// Role description.
        #[serde(default)]
        description: Option<String>,
    },
}

impl RoleEntry {
    /// Role name regardless of representation.
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Detailed { name, .. } => name,
        }
    }
}

/// Reply of the identity call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    /// Display name.
    pub username: String,
    /// Contact handle.
    pub email: String,
    /// Granted roles.
    #[serde(default)]
    pub roles: Vec<RoleEntry>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn auth_response_accepts_payload_alias() {
        let reply: AuthResponse =
            serde_json::from_value(json!({"success": true, "payload": "tok"})).unwrap();
        assert_eq!(reply.token(), Some("tok"));
    }

    #[test]
    fn rejected_reply_has_no_token() {
        let reply: AuthResponse = serde_json::from_value(
            json!({"success": false, "access_token": "tok", "message": "nope"}),
        )
        .unwrap();
        assert_eq!(reply.token(), None);
        assert_eq!(reply.message.as_deref(), Some("nope"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let login = LoginRequest { email: "a@b".into(), password: "hunter2".into() };
        assert!(!format!("{login:?}").contains("hunter2"));

        let reply = AuthResponse::granted("secret-token");
        assert!(!format!("{reply:?}").contains("secret-token"));
    }

    #[test]
    fn roles_decode_in_both_shapes() {
        let user: UserResponse = serde_json::from_value(json!({
            "username": "alice",
            "email": "alice@example.com",
            "roles": ["admin", {"name": "guest", "description": "Guest user"}]
        }))
        .unwrap();

        let names: Vec<_> = user.roles.iter().map(RoleEntry::name).collect();
        assert_eq!(names, vec!["admin", "guest"]);
    }
}
