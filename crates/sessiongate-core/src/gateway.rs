//! Session gateway: the only code path that changes who is signed in.
//!
//! Each public operation is one request/response exchange with the auth
//! service. Operations never panic and never retry; every failure comes back
//! as an `AuthError` carrying a message fit to show the user.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiError, AuthClient};
use crate::auth::{token, CredentialStore, SessionState, Ticket};
use crate::models::{AuthResponse, ForgotPasswordResponse, MessageResponse, Registration};
use crate::routing::{Navigator, Route};

const LOGIN_FAILED: &str = "Login failed. Please try again.";
const LOGIN_INCOMPLETE: &str = "Login failed.";
const REGISTER_FAILED: &str = "Registration failed. Please try again.";
const FETCH_FAILED: &str = "Unable to load the current user.";
const RECOVERY_FAILED: &str = "Something went wrong";
const NOT_SIGNED_IN: &str = "Not signed in.";

#[derive(Error, Debug)]
pub enum AuthError {
    /// The service turned the request down and said why
    #[error("{0}")]
    Rejected(String),

    /// The exchange failed without a usable explanation
    #[error("{message}")]
    Unavailable {
        message: String,
        #[source]
        source: ApiError,
    },

    /// The service answered, but not with everything success requires
    #[error("{0}")]
    Incomplete(String),

    #[error("{}", NOT_SIGNED_IN)]
    SignedOut,
}

impl AuthError {
    fn from_api(err: ApiError, fallback: &str) -> Self {
        match err.service_message() {
            Some(message) => AuthError::Rejected(message.to_string()),
            None => AuthError::Unavailable {
                message: fallback.to_string(),
                source: err,
            },
        }
    }

    /// Message to show the user
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Result of a gateway operation
pub type AuthOutcome<T = AuthResponse> = Result<T, AuthError>;

/// What startup did with the stored credential
#[derive(Debug)]
pub enum Startup {
    /// Nothing usable was stored; the session is empty
    Anonymous,
    /// A live token was found; the user record is being fetched
    Restoring(JoinHandle<()>),
    /// `initialize` already ran for this gateway
    AlreadyStarted,
}

impl Startup {
    /// Wait for any background restore to finish
    pub async fn settled(self) {
        if let Startup::Restoring(handle) = self {
            if let Err(e) = handle.await {
                warn!(error = %e, "Session restore task failed");
            }
        }
    }
}

/// Orchestrates the auth service exchanges and the session side effects.
/// Clone is cheap; clones share the same store, state and navigator.
#[derive(Clone)]
pub struct SessionGateway {
    client: AuthClient,
    store: Arc<dyn CredentialStore>,
    state: SessionState,
    navigator: Navigator,
    authenticated_route: Route,
    unauthenticated_route: Route,
    initialized: Arc<AtomicBool>,
}

impl SessionGateway {
    pub fn new(
        client: AuthClient,
        store: Arc<dyn CredentialStore>,
        state: SessionState,
        navigator: Navigator,
        authenticated_route: Route,
        unauthenticated_route: Route,
    ) -> Self {
        Self {
            client,
            store,
            state,
            navigator,
            authenticated_route,
            unauthenticated_route,
            initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    // =========================================================================
    // Startup
    // =========================================================================

    /// Derive the initial session from the stored credential.
    ///
    /// Runs once per gateway; later calls return `Startup::AlreadyStarted`.
    /// A live token marks the session authenticated straight away and spawns
    /// the user fetch on the current tokio runtime.
    pub fn initialize(&self) -> Startup {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("Session already initialized");
            return Startup::AlreadyStarted;
        }

        let Some(stored) = self.store.read() else {
            debug!(backend = self.store.backend(), "No stored credential");
            self.end_session();
            return Startup::Anonymous;
        };

        if token::is_expired(&stored) {
            info!("Stored credential expired or unreadable, clearing it");
            self.end_session();
            return Startup::Anonymous;
        }

        self.state.assume_authenticated();
        let ticket = self.state.ticket();
        let gateway = self.clone();
        Startup::Restoring(tokio::spawn(async move { gateway.restore(ticket).await }))
    }

    async fn restore(&self, ticket: Ticket) {
        match self.client.current_user().await {
            Ok(AuthResponse { user: Some(user), .. }) => {
                let user_id = user.id;
                if self.state.activate_if_current(ticket, user) {
                    info!(user_id, "Session restored");
                }
            }
            Ok(_) => {
                warn!("Current-user response carried no user, ending session");
                self.end_session_if_current(ticket);
            }
            Err(e) => {
                warn!(error = %e, "Failed to restore session");
                self.end_session_if_current(ticket);
            }
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Create an account. Does not sign in.
    pub async fn register(&self, registration: &Registration) -> AuthOutcome<serde_json::Value> {
        let payload = self.client.register(registration).await.map_err(|e| {
            warn!(error = %e, "Registration failed");
            AuthError::from_api(e, REGISTER_FAILED)
        })?;

        if is_truthy(&payload) {
            info!("Registration accepted");
            Ok(payload)
        } else {
            warn!("Registration response was empty");
            Err(AuthError::Incomplete(REGISTER_FAILED.to_string()))
        }
    }

    /// Sign in. Only a response carrying both a token and a user counts.
    pub async fn login(&self, email: &str, password: &str) -> AuthOutcome {
        let response = self.client.login(email, password).await.map_err(|e| {
            warn!(error = %e, "Login failed");
            AuthError::from_api(e, LOGIN_FAILED)
        })?;

        match (response.token.as_deref(), response.user.as_ref()) {
            (Some(token), Some(user)) if !token.is_empty() => {
                self.store.write(token);
                self.state.activate(user.clone());
                info!(user_id = user.id, "Login successful");
                self.navigator.navigate(self.authenticated_route.clone());
                Ok(response)
            }
            (token, user) => {
                warn!(
                    has_token = token.is_some_and(|t| !t.is_empty()),
                    has_user = user.is_some(),
                    "Login response incomplete"
                );
                let message = non_empty(response.message).unwrap_or_else(|| LOGIN_INCOMPLETE.to_string());
                Err(AuthError::Incomplete(message))
            }
        }
    }

    /// Refresh the user record for the stored token.
    ///
    /// A failure leaves the session untouched. A success that arrives after
    /// the session changed (logout, another login) is dropped.
    pub async fn fetch_current_user(&self) -> AuthOutcome {
        let ticket = self.state.ticket();
        if self.store.read().is_none() {
            debug!("No stored credential, skipping current-user fetch");
            return Err(AuthError::SignedOut);
        }

        let response = self.client.current_user().await.map_err(|e| {
            warn!(error = %e, "Failed to fetch current user");
            AuthError::from_api(e, FETCH_FAILED)
        })?;

        match response.user {
            Some(ref user) => {
                if !self.state.activate_if_current(ticket, user.clone()) {
                    debug!(user_id = user.id, "Current user arrived after the session changed, ignoring");
                }
                Ok(response)
            }
            None => {
                let message = non_empty(response.message).unwrap_or_else(|| FETCH_FAILED.to_string());
                Err(AuthError::Incomplete(message))
            }
        }
    }

    /// Sign out locally. Always succeeds; the service is not contacted.
    pub fn logout(&self) {
        self.end_session();
        info!("Logged out");
        self.navigator.navigate(self.unauthenticated_route.clone());
    }

    /// Ask the service to start a password reset. A reset token in the
    /// response is passed back untouched; the caller decides what to do with it.
    pub async fn forgot_password(&self, email: &str) -> AuthOutcome<ForgotPasswordResponse> {
        self.client.forgot_password(email).await.map_err(|e| {
            warn!(error = %e, "Forgot-password request failed");
            AuthError::from_api(e, RECOVERY_FAILED)
        })
    }

    pub async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> AuthOutcome<MessageResponse> {
        self.client
            .reset_password(reset_token, new_password, confirm_password)
            .await
            .map_err(|e| {
                warn!(error = %e, "Reset-password request failed");
                AuthError::from_api(e, RECOVERY_FAILED)
            })
    }

    /// Re-check the stored credential's expiry. An authenticated session
    /// whose token is gone or expired is ended. Returns whether a live
    /// session remains.
    pub fn revalidate(&self) -> bool {
        let live_token = self
            .store
            .read()
            .is_some_and(|stored| !token::is_expired(&stored));

        if !live_token && self.state.is_authenticated() {
            info!("Stored credential no longer valid, ending session");
            self.end_session();
        }
        live_token && self.state.is_authenticated()
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn end_session(&self) {
        self.store.clear();
        self.state.reset();
    }

    fn end_session_if_current(&self, ticket: Ticket) {
        if self.state.reset_if_current(ticket) {
            self.store.clear();
        } else {
            debug!("Session changed while restoring, leaving it alone");
        }
    }
}

/// JSON truthiness: null, false, 0 and "" are falsy
fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}

fn non_empty(message: Option<String>) -> Option<String> {
    message.filter(|m| !m.trim().is_empty())
}
