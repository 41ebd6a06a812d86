//! Client-side session management for bearer-token authentication.
//!
//! One `AuthContext` per application wires the pieces together around a
//! single shared `SessionState`:
//!
//! - `CredentialStore` keeps the token between runs
//! - `auth::token` decides whether a stored token is still usable
//! - `SessionGateway` talks to the auth service and is the only writer of the session
//! - `RequestAugmenter` puts the token on every outbound request
//! - `RouteGate` turns anonymous visitors away from authenticated routes
//!
//! Navigation requests come out of the `NavigationReceiver` returned at
//! construction; the application owns routing.

pub mod api;
pub mod auth;
pub mod config;
pub mod gateway;
pub mod models;
pub mod routing;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

pub use api::{ApiError, HttpTransport, RequestAugmenter, Transport};
pub use auth::{CredentialStore, Session, SessionState, Subscription};
pub use config::{Config, StorageBackend};
pub use gateway::{AuthError, AuthOutcome, SessionGateway, Startup};
pub use models::{AuthResponse, ForgotPasswordResponse, MessageResponse, Registration, User};
pub use routing::{NavigationReceiver, Navigator, Route, RouteGate};

/// Everything an application needs to manage a session, sharing one state
#[derive(Clone)]
pub struct AuthContext {
    pub config: Config,
    pub store: Arc<dyn CredentialStore>,
    pub state: SessionState,
    pub gateway: SessionGateway,
    pub gate: RouteGate,
}

impl AuthContext {
    /// Build from configuration with the reqwest transport and the
    /// configured credential backend
    pub fn new(config: Config) -> Result<(Self, NavigationReceiver)> {
        let transport = HttpTransport::new(
            config.api_base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        let store = auth::open_store(&config);
        Ok(Self::assemble(config, store, Arc::new(transport)))
    }

    /// Build from explicit parts
    pub fn assemble(
        config: Config,
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn Transport>,
    ) -> (Self, NavigationReceiver) {
        let state = SessionState::new();
        let (navigator, navigation) = Navigator::channel();

        let client = api::AuthClient::new(transport, RequestAugmenter::new(Arc::clone(&store)));
        let gateway = SessionGateway::new(
            client,
            Arc::clone(&store),
            state.clone(),
            navigator.clone(),
            Route::new(config.authenticated_route.clone()),
            Route::new(config.unauthenticated_route.clone()),
        );
        let gate = RouteGate::new(
            state.clone(),
            navigator,
            Route::new(config.unauthenticated_route.clone()),
        );

        (
            Self {
                config,
                store,
                state,
                gateway,
                gate,
            },
            navigation,
        )
    }
}
