//! Durable storage for the single bearer token.
//!
//! Every backend exposes the same three infallible operations. Storage
//! problems are logged and swallowed: a store that cannot read behaves as
//! if it holds nothing, which the session treats as "never logged in".

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::{debug, warn};

use crate::config::{Config, StorageBackend};

/// Service name for OS keychain entries
const SERVICE_NAME: &str = "sessiongate";

/// One named slot holding the raw credential string
pub trait CredentialStore: Send + Sync {
    /// Store a token, replacing whatever was there
    fn write(&self, token: &str);

    /// Stored token, if any
    fn read(&self) -> Option<String>;

    /// Remove the stored token. Clearing an empty slot is fine.
    fn clear(&self);

    /// Short backend name for logs and status output
    fn backend(&self) -> &'static str;
}

/// Build the store selected by `config`, falling back to a no-op store when
/// the environment cannot provide the requested backend.
pub fn open_store(config: &Config) -> Arc<dyn CredentialStore> {
    let key = config.credential_key.as_str();
    let store: Result<Arc<dyn CredentialStore>> = match config.storage {
        StorageBackend::File => config
            .storage_dir()
            .map(|dir| Arc::new(FileStore::new(dir, key)) as Arc<dyn CredentialStore>),
        StorageBackend::Keyring => {
            KeyringStore::new(key).map(|s| Arc::new(s) as Arc<dyn CredentialStore>)
        }
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::default())),
        StorageBackend::Disabled => Ok(Arc::new(DisabledStore)),
    };

    match store {
        Ok(store) => {
            debug!(backend = store.backend(), "Credential store opened");
            store
        }
        Err(e) => {
            warn!(error = %e, requested = ?config.storage, "Credential storage unavailable, tokens will not persist");
            Arc::new(DisabledStore)
        }
    }
}

// ============================================================================
// File
// ============================================================================

/// Token kept in a plain file named after the slot
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(key),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_write(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create credential directory")?;
        }
        // Write then rename so a reader never sees a half-written token
        let tmp = self.path.with_extension("tmp");
        write_owner_only(&tmp, token).context("Failed to write credential file")?;
        std::fs::rename(&tmp, &self.path).context("Failed to replace credential file")?;
        Ok(())
    }
}

/// Create `path` readable by the owner only (unix), replacing any leftover
fn write_owner_only(path: &Path, contents: &str) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

impl CredentialStore for FileStore {
    fn write(&self, token: &str) {
        if let Err(e) = self.try_write(token) {
            warn!(error = %e, path = ?self.path, "Failed to store credential");
        }
    }

    fn read(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(error = %e, path = ?self.path, "Failed to read credential file");
                None
            }
        }
    }

    fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, path = ?self.path, "Failed to remove credential file"),
        }
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

// ============================================================================
// Keyring
// ============================================================================

/// Token kept in the OS keychain
pub struct KeyringStore {
    entry: Entry,
}

impl KeyringStore {
    pub fn new(key: &str) -> Result<Self> {
        let entry = Entry::new(SERVICE_NAME, key).context("Failed to create keyring entry")?;
        Ok(Self { entry })
    }
}

impl CredentialStore for KeyringStore {
    fn write(&self, token: &str) {
        if let Err(e) = self.entry.set_password(token) {
            warn!(error = %e, "Failed to store credential in keychain");
        }
    }

    fn read(&self) -> Option<String> {
        match self.entry.get_password() {
            Ok(token) => Some(token),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read credential from keychain");
                None
            }
        }
    }

    fn clear(&self) {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => warn!(error = %e, "Failed to delete credential from keychain"),
        }
    }

    fn backend(&self) -> &'static str {
        "keyring"
    }
}

// ============================================================================
// Memory / disabled
// ============================================================================

/// Process-local slot; nothing survives a restart
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn write(&self, token: &str) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
    }

    fn read(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Used when no durable storage is available. Reads nothing, keeps nothing.
pub struct DisabledStore;

impl CredentialStore for DisabledStore {
    fn write(&self, _token: &str) {}

    fn read(&self) -> Option<String> {
        None
    }

    fn clear(&self) {}

    fn backend(&self) -> &'static str {
        "disabled"
    }
}
