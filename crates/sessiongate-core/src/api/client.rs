//! Client for the auth service endpoints.
//!
//! Every call goes through the same pipeline: build an `OutboundRequest`,
//! let the `RequestAugmenter` attach the stored token, execute it on the
//! `Transport`, then map non-2xx statuses to `ApiError`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{ApiError, InboundResponse, OutboundRequest, RequestAugmenter, Transport};
use crate::models::{
    AuthResponse, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, MessageResponse,
    Registration, ResetPasswordRequest,
};

// ============================================================================
// Endpoints (relative to the configured base URL)
// ============================================================================

pub const REGISTER_PATH: &str = "/register";
pub const LOGIN_PATH: &str = "/login";
pub const ME_PATH: &str = "/me";
pub const FORGOT_PATH: &str = "/forgot";
pub const RESET_PATH: &str = "/reset";

#[derive(Clone)]
pub struct AuthClient {
    transport: Arc<dyn Transport>,
    augmenter: RequestAugmenter,
}

impl AuthClient {
    pub fn new(transport: Arc<dyn Transport>, augmenter: RequestAugmenter) -> Self {
        Self {
            transport,
            augmenter,
        }
    }

    pub async fn register(&self, registration: &Registration) -> Result<serde_json::Value, ApiError> {
        self.post(REGISTER_PATH, registration).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        self.post(LOGIN_PATH, &LoginRequest { email, password }).await
    }

    /// Current user for whichever token the store holds
    pub async fn current_user(&self) -> Result<AuthResponse, ApiError> {
        self.get(ME_PATH).await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<ForgotPasswordResponse, ApiError> {
        self.post(FORGOT_PATH, &ForgotPasswordRequest { email }).await
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<MessageResponse, ApiError> {
        let body = ResetPasswordRequest {
            token,
            new_password,
            confirm_password,
        };
        self.post(RESET_PATH, &body).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(OutboundRequest::get(path)).await?;
        Self::parse(path, &response.body)
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let request = OutboundRequest::post(path, body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode request body: {}", e)))?;
        let response = self.send(request).await?;
        Self::parse(path, &response.body)
    }

    async fn send(&self, request: OutboundRequest) -> Result<InboundResponse, ApiError> {
        let request = self.augmenter.augment(&request);
        debug!(
            method = %request.method,
            path = %request.path,
            authenticated = request.bearer_token().is_some(),
            "Sending auth request"
        );
        let response = self.transport.execute(request).await?;
        Self::check_response(response)
    }

    /// Check if response is successful, returning an error with body if not.
    fn check_response(response: InboundResponse) -> Result<InboundResponse, ApiError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_status(response.status, &response.body))
        }
    }

    /// Parse a success body. An empty body reads as JSON `null`.
    fn parse<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, ApiError> {
        let body = if body.trim().is_empty() { "null" } else { body };
        serde_json::from_str(body).map_err(|e| {
            warn!(path = path, error = %e, "Unexpected response shape");
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", path, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::fake::FakeTransport;
    use crate::auth::MemoryStore;
    use reqwest::Method;
    use serde_json::json;

    fn client(transport: Arc<FakeTransport>, token: Option<&str>) -> AuthClient {
        let store = match token {
            Some(t) => MemoryStore::with_token(t),
            None => MemoryStore::default(),
        };
        AuthClient::new(transport, RequestAugmenter::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn test_login_sends_credentials() {
        let transport = FakeTransport::new();
        transport.reply(Method::POST, LOGIN_PATH, 200, json!({"token": "abc"}));

        let resp = client(transport.clone(), None)
            .login("a@b.com", "pw")
            .await
            .expect("login request failed");
        assert_eq!(resp.token.as_deref(), Some("abc"));

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, Some(json!({"Email": "a@b.com", "Password": "pw"})));
        assert_eq!(sent[0].bearer_token(), None);
    }

    #[tokio::test]
    async fn test_current_user_carries_stored_token() {
        let transport = FakeTransport::new();
        transport.reply(Method::GET, ME_PATH, 200, json!({}));

        client(transport.clone(), Some("stored"))
            .current_user()
            .await
            .expect("me request failed");
        assert_eq!(transport.requests()[0].bearer_token(), Some("stored"));
    }

    #[tokio::test]
    async fn test_error_status_maps_to_api_error() {
        let transport = FakeTransport::new();
        transport.reply(Method::POST, FORGOT_PATH, 404, json!({"message": "No account with that email"}));

        let err = client(transport, None)
            .forgot_password("x@y.z")
            .await
            .expect_err("expected rejection");
        assert_eq!(err.service_message(), Some("No account with that email"));
    }

    #[tokio::test]
    async fn test_empty_success_body_is_null() {
        let transport = FakeTransport::new();
        transport.reply_raw(Method::POST, REGISTER_PATH, 200, "");
        transport.reply_raw(Method::POST, RESET_PATH, 200, "not json");

        let client = client(transport, None);
        let registration = Registration {
            full_name: "A".to_string(),
            email: "a@b.com".to_string(),
            password: "pw".to_string(),
            confirm_password: "pw".to_string(),
            phone_number: "1".to_string(),
            date_of_birth: chrono::NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date"),
            role: "User".to_string(),
        };
        let value = client.register(&registration).await.expect("register request failed");
        assert!(value.is_null());

        let err = client.reset_password("t", "n", "n").await.expect_err("expected parse failure");
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }
}
