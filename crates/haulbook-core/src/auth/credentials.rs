//! Durable storage for the single session record.
//!
//! Every backend stores the whole `Session` under one fixed key. There is no
//! partial update: callers read, modify, and put the full record back.

use std::path::PathBuf;
use std::sync::Mutex;

use keyring::Entry;
use tracing::{debug, warn};

use super::error::StorageError;
use super::session::Session;

/// Key the session record is stored under
pub const SESSION_KEY: &str = "user";

/// Keychain service name
const SERVICE_NAME: &str = "haulbook";

pub trait CredentialStore: Send + Sync {
    /// Load the stored session. Missing or unreadable records yield None.
    fn get(&self) -> Option<Session>;

    /// Replace the stored session with `session`
    fn put(&self, session: &Session) -> Result<(), StorageError>;

    /// Remove the stored session. Succeeds when nothing is stored.
    fn clear(&self) -> Result<(), StorageError>;
}

fn decode(contents: &str) -> Option<Session> {
    match serde_json::from_str(contents) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(error = %e, "Discarding unreadable session record");
            None
        }
    }
}

// ============================================================================
// File backend
// ============================================================================

/// Session stored as JSON in `<dir>/user.json`.
/// Writes land in a sibling temp file first and are renamed into place.
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", SESSION_KEY))
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!(".{}.json.tmp", SESSION_KEY))
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<Session> {
        let path = self.session_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => decode(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read session file");
                None
            }
        }
    }

    fn put(&self, session: &Session) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        let contents = serde_json::to_string_pretty(session)?;
        let temp = self.temp_path();
        std::fs::write(&temp, contents)?;
        std::fs::rename(&temp, self.session_path())?;
        debug!(user = %session.user.username, "Session written to disk");
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(self.session_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Keychain backend
// ============================================================================

/// Session stored as a JSON secret in the OS keychain
pub struct KeyringCredentialStore {
    entry: Entry,
}

impl KeyringCredentialStore {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_service(SERVICE_NAME)
    }

    /// One entry is opened up front and reused for every read and write.
    pub fn with_service(service: &str) -> Result<Self, StorageError> {
        Ok(Self {
            entry: Entry::new(service, SESSION_KEY)?,
        })
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self) -> Option<Session> {
        match self.entry.get_password() {
            Ok(contents) => decode(&contents),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read session from keychain");
                None
            }
        }
    }

    fn put(&self, session: &Session) -> Result<(), StorageError> {
        let contents = serde_json::to_string(session)?;
        self.entry.set_password(&contents)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryCredentialStore {
    record: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw record, bypassing serialization
    pub fn put_raw(&self, contents: &str) {
        *self.lock() = Some(contents.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // A poisoned lock still holds a whole record; keep using it.
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<Session> {
        self.lock().as_deref().and_then(decode)
    }

    fn put(&self, session: &Session) -> Result<(), StorageError> {
        let contents = serde_json::to_string(session)?;
        *self.lock() = Some(contents);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionUser;

    fn sample() -> Session {
        Session {
            access: "A1".to_string(),
            refresh: "R1".to_string(),
            user: SessionUser {
                id: 7,
                username: "bob".to_string(),
                email: "bob@example.com".to_string(),
            },
        }
    }

    #[test]
    fn test_file_store_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested"));
        store.put(&sample()).unwrap();
        assert_eq!(store.get(), Some(sample()));
        assert!(!dir.path().join("nested").join(".user.json.tmp").exists());
    }

    #[test]
    fn test_file_store_corrupt_record_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("user.json"), "{not json").unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_file_store_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        store.clear().unwrap();
        store.put(&sample()).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_keyring_store_round_trip_and_clear() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        let store = KeyringCredentialStore::with_service("haulbook-test").unwrap();
        assert_eq!(store.get(), None);
        store.put(&sample()).unwrap();
        assert_eq!(store.get(), Some(sample()));

        let mut renewed = sample();
        renewed.access = "A2".to_string();
        store.put(&renewed).unwrap();
        assert_eq!(store.get(), Some(renewed));

        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_memory_store_round_trip_and_clear() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.get(), None);
        store.put(&sample()).unwrap();
        assert_eq!(store.get(), Some(sample()));
        store.clear().unwrap();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_memory_store_record_missing_user_is_absent() {
        let store = MemoryCredentialStore::new();
        store.put_raw(r#"{"access":"A1","refresh":"R1"}"#);
        assert_eq!(store.get(), None);
    }
}
