use thiserror::Error;

/// Failure to persist or remove the session record.
///
/// Reads never produce this; an unreadable record is treated as no session.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Login failed: {0}")]
    Authentication(String),

    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Token refresh failed: {0}")]
    Refresh(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Message suitable for showing on a login or registration form
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Authentication(msg)
            | AuthError::Registration(msg)
            | AuthError::Refresh(msg) => msg.clone(),
            AuthError::Storage(_) => "Could not save your session on this device".to_string(),
        }
    }
}
