//! Session lifecycle state machine.
//!
//! ```text
//!                 RefreshDue                RefreshSucceeded
//! Unauthenticated ──────────► Refreshing ─────────────────► Authenticated
//!        ▲                        │                            │    │
//!        │                        │ RefreshFailed              │    │ Unauthorized
//!        │                        ▼                            │    ▼
//!        │                   AuthRequired ◄────────────────────┼────┘
//!        │                        │ LoginSucceeded             │
//!        │                        └────────────────────────────┘
//!        │                LogoutCompleted                      │
//!        └─────────────────────────────────────────────────────┘
//! ```
//!
//! The machine never calls out. Each transition returns [`SessionAction`]s
//! and the driver feeds the results back as [`SessionEvent`]s.
//!
//! # Re-entry
//!
//! Entering `Unauthenticated` (after logout) does not refresh inline. It emits
//! [`SessionAction::ScheduleRefresh`]; the driver answers on its next turn with
//! [`SessionEvent::RefreshDue`], which only starts a refresh if the session is
//! still `Unauthenticated`. A refresh can therefore never be started twice.
//!
//! # Credential generations
//!
//! Every credential change bumps a generation counter. Identity results and
//! unauthorized reports carry the generation they were issued under and are
//! ignored once the credential has moved on.

use std::fmt;

use tracing::{debug, info, warn};

use crate::{
    credential::{Credential, Identity},
    error::{ErrorKind, SessionError},
};

/// Authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No credential; a silent refresh is due.
    Unauthenticated,
    /// Silent refresh in flight.
    Refreshing,
    /// Credential held; gated calls are allowed.
    Authenticated,
    /// Refresh failed or the credential was rejected; the login form is shown.
    AuthRequired,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Refreshing => "refreshing",
            Self::Authenticated => "authenticated",
            Self::AuthRequired => "auth-required",
        };
        f.write_str(text)
    }
}

/// Feedback for the login form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginNotice {
    /// The backend rejected the submitted credentials.
    Rejected(Option<String>),
    /// The backend could not be reached or failed.
    Unreachable(ErrorKind),
    /// The account was registered but awaits approval.
    PendingApproval(Option<String>),
    /// The previous credential was rejected by the backend.
    Expired,
}

/// Inputs to the session machine.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Entry hook of `Unauthenticated`: start a silent refresh if still due.
    RefreshDue,
    /// The refresh call returned a credential.
    RefreshSucceeded {
        /// Fresh credential.
        credential: Credential,
    },
    /// The refresh call failed or was rejected.
    RefreshFailed {
        /// Failure classification.
        kind: ErrorKind,
    },
    /// The user submitted the login form, chose guest login, or registered.
    LoginRequested,
    /// The submitted login returned a credential.
    LoginSucceeded {
        /// Issued credential.
        credential: Credential,
    },
    /// The backend rejected the submitted credentials.
    LoginRejected {
        /// Backend message for the form.
        message: Option<String>,
    },
    /// The login call failed without a verdict.
    LoginFailed {
        /// Failure classification.
        kind: ErrorKind,
    },
    /// Registration succeeded but the account awaits approval.
    RegistrationPending {
        /// Backend message for the form.
        message: Option<String>,
    },
    /// The user asked to log out.
    LogoutRequested,
    /// The backend invalidation call finished, successfully or not.
    LogoutCompleted,
    /// The identity call returned.
    IdentityFetched {
        /// Credential generation the call was made under.
        generation: u64,
        /// Fetched identity.
        identity: Identity,
    },
    /// The identity call failed.
    IdentityFailed {
        /// Credential generation the call was made under.
        generation: u64,
        /// Failure classification.
        kind: ErrorKind,
    },
    /// A gated call was answered with 401.
    Unauthorized {
        /// Credential generation attached to the rejected call.
        generation: u64,
    },
}

/// Outputs of the session machine, executed by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Feed [`SessionEvent::RefreshDue`] on the next driver turn.
    ScheduleRefresh,
    /// Issue the refresh call.
    Refresh,
    /// Attach (or detach) the credential on all request/response calls.
    AttachCredential {
        /// Generation of the credential.
        generation: u64,
        /// Credential to attach; `None` detaches.
        credential: Option<Credential>,
    },
    /// Fetch the identity for the given credential generation.
    FetchIdentity {
        /// Generation of the credential.
        generation: u64,
    },
    /// Invalidate the backend session (best effort).
    InvalidateBackendSession,
}

/// Session state machine.
///
/// Single owner of [`SessionState`], the [`Credential`] and the [`Identity`].
/// Pure state machine - returns actions, caller handles I/O.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    credential: Option<Credential>,
    generation: u64,
    identity: Identity,
    notice: Option<LoginNotice>,
    login_in_flight: bool,
    logout_in_flight: bool,
}

impl Session {
    /// Create a session in `Unauthenticated`.
    ///
    /// The driver must feed [`SessionEvent::RefreshDue`] once at startup.
    pub fn new() -> Self {
        Self {
            state: SessionState::Unauthenticated,
            credential: None,
            generation: 0,
            identity: Identity::default(),
            notice: None,
            login_in_flight: false,
            logout_in_flight: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current credential, if any.
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Generation of the current credential.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Identity of the current credential. Empty before `Authenticated` and
    /// until the identity fetch completes.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Last feedback for the login form.
    pub fn notice(&self) -> Option<&LoginNotice> {
        self.notice.as_ref()
    }

    /// Returns true while a credential submission is in flight.
    pub fn is_login_in_flight(&self) -> bool {
        self.login_in_flight
    }

    /// Check that gated calls are allowed and return the generation to tag
    /// them with.
    pub fn ensure_authenticated(&self) -> Result<u64, SessionError> {
        match self.state {
            SessionState::Authenticated => Ok(self.generation),
            state => Err(SessionError::NotAuthenticated { state }),
        }
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if a caller request is invalid in the current
    /// state. Completions never error.
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, SessionError> {
        match event {
            SessionEvent::RefreshDue => Ok(self.handle_refresh_due()),
            SessionEvent::RefreshSucceeded { credential } => {
                Ok(self.handle_refresh_succeeded(credential))
            },
            SessionEvent::RefreshFailed { kind } => Ok(self.handle_refresh_failed(kind)),
            SessionEvent::LoginRequested => self.handle_login_requested(),
            SessionEvent::LoginSucceeded { credential } => {
                Ok(self.handle_login_succeeded(credential))
            },
            SessionEvent::LoginRejected { message } => {
                Ok(self.finish_login(LoginNotice::Rejected(message)))
            },
            SessionEvent::LoginFailed { kind } => {
                Ok(self.finish_login(LoginNotice::Unreachable(kind)))
            },
            SessionEvent::RegistrationPending { message } => {
                Ok(self.finish_login(LoginNotice::PendingApproval(message)))
            },
            SessionEvent::LogoutRequested => self.handle_logout_requested(),
            SessionEvent::LogoutCompleted => Ok(self.handle_logout_completed()),
            SessionEvent::IdentityFetched { generation, identity } => {
                self.handle_identity_fetched(generation, identity);
                Ok(vec![])
            },
            SessionEvent::IdentityFailed { generation, kind } => {
                Ok(self.handle_identity_failed(generation, kind))
            },
            SessionEvent::Unauthorized { generation } => Ok(self.handle_unauthorized(generation)),
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            info!(from = %self.state, to = %next, "session transition");
            self.state = next;
        }
    }

    /// Replace the credential and derive the identity actions.
    ///
    /// A present credential is attached and its identity fetched; an absent
    /// one is detached and the identity cleared without a call.
    fn replace_credential(&mut self, credential: Option<Credential>) -> Vec<SessionAction> {
        self.generation += 1;
        self.identity = Identity::default();
        self.credential = credential;

        let generation = self.generation;
        let mut actions =
            vec![SessionAction::AttachCredential { generation, credential: self.credential.clone() }];
        if self.credential.is_some() {
            actions.push(SessionAction::FetchIdentity { generation });
        }
        actions
    }

    fn handle_refresh_due(&mut self) -> Vec<SessionAction> {
        match self.state {
            SessionState::Unauthenticated => {
                self.transition(SessionState::Refreshing);
                vec![SessionAction::Refresh]
            },
            SessionState::Refreshing => {
                debug!("refresh already in flight");
                vec![]
            },
            state => {
                debug!(%state, "refresh no longer due");
                vec![]
            },
        }
    }

    fn handle_refresh_succeeded(&mut self, credential: Credential) -> Vec<SessionAction> {
        if self.state != SessionState::Refreshing {
            debug!(state = %self.state, "dropping stale refresh result");
            return vec![];
        }

        self.notice = None;
        self.transition(SessionState::Authenticated);
        self.replace_credential(Some(credential))
    }

    fn handle_refresh_failed(&mut self, kind: ErrorKind) -> Vec<SessionAction> {
        if self.state != SessionState::Refreshing {
            debug!(state = %self.state, "dropping stale refresh failure");
            return vec![];
        }

        debug!(%kind, "silent refresh failed");
        self.transition(SessionState::AuthRequired);
        vec![]
    }

    fn handle_login_requested(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::AuthRequired {
            return Err(SessionError::InvalidState { operation: "log in", state: self.state });
        }
        if self.login_in_flight {
            return Err(SessionError::LoginInFlight);
        }

        self.login_in_flight = true;
        Ok(vec![])
    }

    fn handle_login_succeeded(&mut self, credential: Credential) -> Vec<SessionAction> {
        if !self.login_in_flight || self.state != SessionState::AuthRequired {
            debug!(state = %self.state, "dropping stale login result");
            return vec![];
        }

        self.login_in_flight = false;
        self.notice = None;
        self.transition(SessionState::Authenticated);
        self.replace_credential(Some(credential))
    }

    fn finish_login(&mut self, notice: LoginNotice) -> Vec<SessionAction> {
        if !self.login_in_flight {
            debug!(?notice, "dropping stale login outcome");
            return vec![];
        }

        self.login_in_flight = false;
        self.notice = Some(notice);
        vec![]
    }

    fn handle_logout_requested(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::Authenticated {
            return Err(SessionError::InvalidState { operation: "log out", state: self.state });
        }
        if self.logout_in_flight {
            return Ok(vec![]);
        }

        self.logout_in_flight = true;
        Ok(vec![SessionAction::InvalidateBackendSession])
    }

    fn handle_logout_completed(&mut self) -> Vec<SessionAction> {
        if !self.logout_in_flight {
            debug!("dropping unexpected logout completion");
            return vec![];
        }

        self.logout_in_flight = false;
        self.notice = None;
        self.transition(SessionState::Unauthenticated);

        let mut actions = self.replace_credential(None);
        actions.push(SessionAction::ScheduleRefresh);
        actions
    }

    fn handle_identity_fetched(&mut self, generation: u64, identity: Identity) {
        if generation != self.generation || self.state != SessionState::Authenticated {
            debug!(generation, current = self.generation, "dropping stale identity");
            return;
        }

        debug!(display_name = %identity.display_name, "identity fetched");
        self.identity = identity;
    }

    fn handle_identity_failed(&mut self, generation: u64, kind: ErrorKind) -> Vec<SessionAction> {
        if kind == ErrorKind::Unauthorized {
            return self.handle_unauthorized(generation);
        }
        if generation != self.generation {
            debug!(generation, current = self.generation, "dropping stale identity failure");
            return vec![];
        }

        warn!(%kind, "identity fetch failed; continuing without identity");
        self.identity = Identity::default();
        vec![]
    }

    fn handle_unauthorized(&mut self, generation: u64) -> Vec<SessionAction> {
        if generation != self.generation || self.credential.is_none() {
            debug!(generation, current = self.generation, "dropping stale unauthorized report");
            return vec![];
        }

        warn!("credential rejected by backend; login required");
        self.notice = Some(LoginNotice::Expired);
        self.transition(SessionState::AuthRequired);
        self.replace_credential(None)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
