//! Navigation signals and the authenticated-route gate.
//!
//! The subsystem never renders or routes itself. It emits `Route` values on
//! a channel and the application decides how to move there.

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::auth::SessionState;

/// A navigation target, e.g. `/dashboard`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route(String);

impl Route {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Route {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Receiving end handed to the application
pub type NavigationReceiver = mpsc::UnboundedReceiver<Route>;

/// Sends navigation requests to the application
#[derive(Clone)]
pub struct Navigator {
    tx: mpsc::UnboundedSender<Route>,
}

impl Navigator {
    pub fn channel() -> (Self, NavigationReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn navigate(&self, route: Route) {
        debug!(route = %route, "Navigation requested");
        if let Err(e) = self.tx.send(route) {
            error!(route = %e.0, "Failed to send navigation - receiver dropped");
        }
    }
}

/// Allows navigation into authenticated areas only while a session is live.
///
/// There are no per-role or per-route rules: any authenticated session may
/// enter any gated route. Denied targets are not remembered.
#[derive(Clone)]
pub struct RouteGate {
    state: SessionState,
    navigator: Navigator,
    redirect_to: Route,
}

impl RouteGate {
    pub fn new(state: SessionState, navigator: Navigator, redirect_to: Route) -> Self {
        Self {
            state,
            navigator,
            redirect_to,
        }
    }

    /// True to allow entry. False redirects to the unauthenticated landing route.
    pub fn can_enter(&self, target: &Route) -> bool {
        if self.state.is_authenticated() {
            return true;
        }
        debug!(target = %target, redirect = %self.redirect_to, "Route denied, no live session");
        self.navigator.navigate(self.redirect_to.clone());
        false
    }
}
