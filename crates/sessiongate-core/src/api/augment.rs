use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use tracing::warn;

use super::OutboundRequest;
use crate::auth::CredentialStore;

/// Attaches the stored bearer token to outbound requests.
///
/// The token is read from the store on every call, never cached, and is
/// attached whether or not it has expired; the service rejects stale tokens.
#[derive(Clone)]
pub struct RequestAugmenter {
    store: Arc<dyn CredentialStore>,
}

impl RequestAugmenter {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Copy of `request`, carrying `Authorization: Bearer <token>` when a
    /// token is stored. `request` itself is left as it was.
    pub fn augment(&self, request: &OutboundRequest) -> OutboundRequest {
        let mut outbound = request.clone();
        let Some(token) = self.store.read() else {
            return outbound;
        };

        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                outbound.headers.insert(AUTHORIZATION, value);
            }
            Err(e) => warn!(error = %e, path = %request.path, "Stored token is not a valid header value, sending without it"),
        }
        outbound
    }
}
