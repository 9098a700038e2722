//! Authentication module for managing the device's session.
//!
//! This module provides:
//! - `Session`: the persisted access/refresh token pair and user profile
//! - `CredentialStore`: durable storage for that record (file, keychain, memory)
//! - `SessionService`: login, registration, logout and token refresh
//! - `SessionState`: authenticated/unauthenticated status for presentation code

pub mod credentials;
pub mod error;
pub mod service;
pub mod session;
pub mod signal;
pub mod state;

pub use credentials::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
    SESSION_KEY,
};
pub use error::{AuthError, StorageError};
pub use service::SessionService;
pub use session::{Session, SessionUser, TokenPair};
pub use signal::SessionSignal;
pub use state::{AuthSnapshot, SessionState, SessionStatus};
