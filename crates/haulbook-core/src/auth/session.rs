use std::fmt;

use serde::{Deserialize, Serialize};

/// Profile snapshot returned by the login/register endpoints.
/// Informational only; the server never re-verifies it per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// The persisted authentication state for the one active account.
///
/// Stored as a single record `{access, refresh, user}`. Writers always
/// replace the whole record, so an access token is never observed paired
/// with a refresh token from a different refresh cycle.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access: String,
    pub refresh: String,
    pub user: SessionUser,
}

/// Token pair minted by the refresh endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl Session {
    /// Build the record that replaces this one after a refresh.
    /// The user profile carries over untouched.
    pub fn with_tokens(&self, tokens: TokenPair) -> Self {
        Self {
            access: tokens.access,
            refresh: tokens.refresh,
            user: self.user.clone(),
        }
    }

    pub fn tokens(&self) -> TokenPair {
        TokenPair {
            access: self.access.clone(),
            refresh: self.refresh.clone(),
        }
    }

    /// Access token, or None if the server handed back an empty one
    pub fn access_token(&self) -> Option<&str> {
        non_empty(&self.access)
    }

    /// Refresh token, or None if empty
    pub fn refresh_token(&self) -> Option<&str> {
        non_empty(&self.refresh)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

// Tokens stay out of logs and panic messages.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Session {
        Session {
            access: "A1".to_string(),
            refresh: "R1".to_string(),
            user: SessionUser {
                id: 1,
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
            },
        }
    }

    #[test]
    fn test_session_wire_layout() {
        let json = serde_json::to_value(alice()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "access": "A1",
                "refresh": "R1",
                "user": {"id": 1, "username": "alice", "email": "alice@example.com"}
            })
        );
    }

    #[test]
    fn test_with_tokens_preserves_user() {
        let session = alice();
        let refreshed = session.with_tokens(TokenPair {
            access: "A2".to_string(),
            refresh: "R2".to_string(),
        });
        assert_eq!(refreshed.access, "A2");
        assert_eq!(refreshed.refresh, "R2");
        assert_eq!(refreshed.user, session.user);
    }

    #[test]
    fn test_empty_tokens_read_as_absent() {
        let mut session = alice();
        session.access.clear();
        assert_eq!(session.access_token(), None);
        assert_eq!(session.refresh_token(), Some("R1"));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let rendered = format!("{:?}", alice());
        assert!(!rendered.contains("A1"));
        assert!(!rendered.contains("R1"));
        assert!(rendered.contains("alice"));
    }
}
