use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::User;

/// Role assigned to self-registered accounts
pub const DEFAULT_ROLE: &str = "User";

/// New account details sent to the register endpoint
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    #[serde(rename = "FullName")]
    pub full_name: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "ConfirmPassword")]
    pub confirm_password: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    /// Serialized as `YYYY-MM-DD`
    #[serde(rename = "DateOfBirth")]
    pub date_of_birth: NaiveDate,
    #[serde(rename = "Role")]
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LoginRequest<'a> {
    #[serde(rename = "Email")]
    pub email: &'a str,
    #[serde(rename = "Password")]
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ForgotPasswordRequest<'a> {
    #[serde(rename = "Email")]
    pub email: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ResetPasswordRequest<'a> {
    #[serde(rename = "Token")]
    pub token: &'a str,
    #[serde(rename = "NewPassword")]
    pub new_password: &'a str,
    #[serde(rename = "ConfirmPassword")]
    pub confirm_password: &'a str,
}

/// Body of the login and current-user responses.
/// Every field is optional on the wire; the gateway decides what counts as success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of the forgot-password response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForgotPasswordResponse {
    #[serde(default)]
    pub message: Option<String>,
    /// Reset token, when the service hands one back directly
    #[serde(default)]
    pub token: Option<String>,
}

/// Body of the reset-password response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}
