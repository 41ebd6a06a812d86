//! Authentication state: where the token lives, what it says, and who is
//! signed in.
//!
//! This module provides:
//! - `CredentialStore`: the single durable token slot (file, OS keychain, memory, or none)
//! - `token`: claim decoding and fail-closed expiry checks
//! - `SessionState`: the observable in-memory session record

pub mod credentials;
pub mod session;
pub mod token;

pub use credentials::{open_store, CredentialStore, DisabledStore, FileStore, KeyringStore, MemoryStore};
pub use session::{Session, SessionState, Subscription, Ticket};
