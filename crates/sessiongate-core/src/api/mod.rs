//! Client side of the auth service boundary.
//!
//! Requests are plain values (`OutboundRequest`) run through a
//! `RequestAugmenter` that attaches the stored bearer token, then executed
//! by a `Transport`. `HttpTransport` is the reqwest implementation; tests
//! substitute their own.

pub mod augment;
pub mod client;
pub mod error;
pub mod request;
pub mod transport;

pub use augment::RequestAugmenter;
pub use client::AuthClient;
pub use error::ApiError;
pub use request::{InboundResponse, OutboundRequest};
pub use transport::{HttpTransport, Transport};
