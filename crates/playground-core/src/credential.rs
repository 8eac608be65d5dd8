//! Credential and identity.
//!
//! # Security
//!
//! - **Debug Redaction**: [`Credential`] implements `Debug` by hand and never
//!   prints the token.
//! - **Memory only**: credentials are never serialized; there is no `Serialize`
//!   impl on purpose.

use std::{collections::BTreeSet, fmt, time::Instant};

use playground_proto::UserResponse;

/// Bearer token plus the instant it was issued.
///
/// Owned by the [`Session`](crate::Session). Replaced wholesale on refresh and
/// dropped on logout.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    issued_at: Instant,
}

impl Credential {
    /// Create a credential issued at `issued_at`.
    pub fn new(token: impl Into<String>, issued_at: Instant) -> Self {
        Self { token: token.into(), issued_at }
    }

    /// Raw bearer token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// When the backend issued the token.
    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &format!("<redacted {} bytes>", self.token.len()))
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Who the credential belongs to.
///
/// Empty until the identity fetch for the current credential completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Display name.
    pub display_name: String,
    /// Contact handle (email).
    pub contact_handle: String,
    /// Granted role tags.
    pub roles: BTreeSet<String>,
}

impl Identity {
    /// Returns true if no identity is known.
    pub fn is_empty(&self) -> bool {
        self.display_name.is_empty() && self.contact_handle.is_empty() && self.roles.is_empty()
    }

    /// Returns true if the role set contains `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

impl From<UserResponse> for Identity {
    fn from(user: UserResponse) -> Self {
        Self {
            display_name: user.username,
            contact_handle: user.email,
            roles: user.roles.iter().map(|role| role.name().to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use playground_proto::RoleEntry;

    use super::*;

    #[test]
    fn debug_never_prints_token() {
        let credential = Credential::new("very-secret", Instant::now());
        let printed = format!("{credential:?}");
        assert!(!printed.contains("very-secret"));
        assert!(printed.contains("<redacted 11 bytes>"));
    }

    #[test]
    fn identity_from_user_response() {
        let identity = Identity::from(UserResponse {
            username: "alice".into(),
            email: "alice@example.com".into(),
            roles: vec![RoleEntry::Name("guest".into())],
        });

        assert_eq!(identity.display_name, "alice");
        assert!(identity.has_role("guest"));
        assert!(!identity.is_empty());
        assert!(Identity::default().is_empty());
    }
}
