//! Async driver of the session machine.
//!
//! [`SessionManager`] owns the [`Session`] and executes its actions against
//! an [`Api`]. It is the single session instance of a process: the room
//! drivers borrow it to check the gate and to reach the API.
//!
//! # Turns
//!
//! Every public operation is one turn: it feeds one event, then executes the
//! resulting actions and the completions they produce until the machine is
//! quiet. [`SessionAction::ScheduleRefresh`] is deferred to the next call of
//! [`run_pending`](SessionManager::run_pending), which also collects 401
//! reports made by gated calls since the previous turn.

use std::{collections::VecDeque, time::Duration};

use playground_core::{
    Credential, Environment, ErrorKind, Identity, LoginNotice, Session, SessionAction,
    SessionError, SessionEvent, SessionState,
};
use playground_proto::{AuthResponse, LoginRequest, RegisterRequest, RoomStatus, RoomSummary};
use tracing::{debug, info, warn};

use crate::{
    api::Api,
    credential::CredentialWriter,
    error::{ClientError, TransportError},
};

/// A credential submission.
#[derive(Debug)]
enum Submission {
    Login(LoginRequest),
    Guest,
    Register(RegisterRequest),
}

/// Owner of the session, the credential, and the identity.
pub struct SessionManager<A: Api, E: Environment> {
    session: Session,
    api: A,
    env: E,
    credentials: CredentialWriter,
    refresh_due: bool,
}

impl<A: Api, E: Environment> SessionManager<A, E> {
    /// Create a manager in `Unauthenticated`.
    ///
    /// `credentials` must be the writer paired with the reader held by `api`.
    /// Call [`start`](Self::start) to run the initial silent refresh.
    pub fn new(api: A, env: E, credentials: CredentialWriter) -> Self {
        Self { session: Session::new(), api, env, credentials, refresh_due: false }
    }

    /// Run the silent refresh of application start.
    pub async fn start(&mut self) {
        self.refresh_due = true;
        self.run_pending().await;
    }

    /// Feed deferred work: 401 reports from gated calls, then a scheduled
    /// refresh.
    pub async fn run_pending(&mut self) {
        while let Some(generation) = self.credentials.try_next_unauthorized() {
            let current = generation == self.session.generation();
            if let Some(age) = self.credential_age().filter(|_| current) {
                info!(?age, "gated call rejected the current credential");
            }
            self.apply(SessionEvent::Unauthorized { generation }).await;
        }
        if std::mem::take(&mut self.refresh_due) {
            self.apply(SessionEvent::RefreshDue).await;
        }
    }

    /// Submit email and password.
    ///
    /// Rejections and unreachable backends do not error; they end in
    /// `AuthRequired` with a [`notice`](Self::notice) for the form.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), SessionError> {
        let request = LoginRequest { email: email.to_string(), password: password.to_string() };
        self.submit(Submission::Login(request)).await
    }

    /// Log in as a guest.
    pub async fn guest_login(&mut self) -> Result<(), SessionError> {
        self.submit(Submission::Guest).await
    }

    /// Create an account. A token in the reply authenticates like a login; an
    /// account awaiting approval leaves the session in `AuthRequired` with a
    /// pending notice.
    pub async fn register(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        let request = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        self.submit(Submission::Register(request)).await
    }

    /// Log out. Always ends in `Unauthenticated` with no credential, even if
    /// the backend call fails.
    pub async fn logout(&mut self) -> Result<(), SessionError> {
        let actions = self.session.handle(SessionEvent::LogoutRequested)?;
        self.execute_all(actions).await;
        Ok(())
    }

    /// List rooms, optionally only those with `status`.
    pub async fn list_rooms(
        &mut self,
        status: Option<RoomStatus>,
    ) -> Result<Vec<RoomSummary>, ClientError> {
        self.run_pending().await;
        self.ensure_authenticated()?;

        let result = self.api.list_rooms().await;
        // A 401 was reported through the credential channel
        self.run_pending().await;

        let rooms = result?;
        Ok(match status {
            Some(status) => rooms.into_iter().filter(|room| room.status == status).collect(),
            None => rooms,
        })
    }

    /// Time since the current credential was issued; `None` without one.
    pub fn credential_age(&self) -> Option<Duration> {
        let credential = self.session.credential()?;
        Some(self.env.now().saturating_duration_since(credential.issued_at()))
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Identity of the current credential.
    pub fn identity(&self) -> &Identity {
        self.session.identity()
    }

    /// Last feedback for the login form.
    pub fn notice(&self) -> Option<&LoginNotice> {
        self.session.notice()
    }

    /// The session machine.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The request/response API.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Gate for calls that need a credential.
    pub fn ensure_authenticated(&self) -> Result<u64, SessionError> {
        self.session.ensure_authenticated()
    }

    async fn submit(&mut self, submission: Submission) -> Result<(), SessionError> {
        let actions = self.session.handle(SessionEvent::LoginRequested)?;
        self.execute_all(actions).await;

        let (reply, registering) = match &submission {
            Submission::Login(request) => {
                info!(email = %request.email, "logging in");
                (self.api.login(request).await, false)
            },
            Submission::Guest => {
                info!("logging in as guest");
                (self.api.guest_login().await, false)
            },
            Submission::Register(request) => {
                info!(username = %request.username, "registering");
                (self.api.register(request).await, true)
            },
        };
        let event = self.login_outcome(registering, reply);
        self.apply(event).await;
        Ok(())
    }

    fn login_outcome(
        &self,
        registering: bool,
        reply: Result<AuthResponse, TransportError>,
    ) -> SessionEvent {
        match reply {
            Ok(reply) => match reply.token().map(str::to_string) {
                Some(token) => {
                    SessionEvent::LoginSucceeded { credential: Credential::new(token, self.env.now()) }
                },
                None if reply.success && registering => {
                    SessionEvent::RegistrationPending { message: reply.message }
                },
                None => SessionEvent::LoginRejected { message: reply.message },
            },
            Err(err) => match err.kind() {
                ErrorKind::Unauthorized | ErrorKind::ValidationRejected => {
                    SessionEvent::LoginRejected { message: err.backend_message().map(str::to_string) }
                },
                kind => {
                    warn!(%err, "credential submission failed");
                    SessionEvent::LoginFailed { kind }
                },
            },
        }
    }

    /// Feed `event` and run the turn to quiescence.
    async fn apply(&mut self, event: SessionEvent) {
        match self.session.handle(event) {
            Ok(actions) => self.execute_all(actions).await,
            // Completions never error; only caller requests do
            Err(err) => debug!(%err, "session event refused"),
        }
    }

    async fn execute_all(&mut self, actions: Vec<SessionAction>) {
        let mut pending: VecDeque<SessionAction> = actions.into();

        while let Some(action) = pending.pop_front() {
            let Some(event) = self.execute(action).await else {
                continue;
            };
            match self.session.handle(event) {
                Ok(next) => pending.extend(next),
                Err(err) => debug!(%err, "session event refused"),
            }
        }
    }

    async fn execute(&mut self, action: SessionAction) -> Option<SessionEvent> {
        match action {
            SessionAction::ScheduleRefresh => {
                self.refresh_due = true;
                None
            },
            SessionAction::Refresh => Some(match self.api.refresh().await {
                Ok(reply) => match reply.token() {
                    Some(token) => SessionEvent::RefreshSucceeded {
                        credential: Credential::new(token, self.env.now()),
                    },
                    None => SessionEvent::RefreshFailed { kind: ErrorKind::Unauthorized },
                },
                Err(err) => {
                    debug!(%err, "refresh call failed");
                    SessionEvent::RefreshFailed { kind: err.kind() }
                },
            }),
            SessionAction::AttachCredential { generation, credential } => {
                self.credentials.attach(generation, credential);
                None
            },
            SessionAction::FetchIdentity { generation } => Some(match self.api.identity().await {
                Ok(user) => SessionEvent::IdentityFetched { generation, identity: Identity::from(user) },
                Err(err) => SessionEvent::IdentityFailed { generation, kind: err.kind() },
            }),
            SessionAction::InvalidateBackendSession => {
                if let Err(err) = self.api.logout().await {
                    warn!(%err, "backend logout failed; clearing local session anyway");
                }
                Some(SessionEvent::LogoutCompleted)
            },
        }
    }
}
