//! Data models exchanged with the auth service.
//!
//! - `User`: identity snapshot of the signed-in account
//! - `Registration`: new account details
//! - `AuthResponse`, `ForgotPasswordResponse`, `MessageResponse`: response bodies

pub mod auth;
pub mod user;

pub(crate) use auth::{ForgotPasswordRequest, LoginRequest, ResetPasswordRequest};
pub use auth::{AuthResponse, ForgotPasswordResponse, MessageResponse, Registration, DEFAULT_ROLE};
pub use user::{parse_service_date, User};
