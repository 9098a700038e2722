//! Session lifecycle against the remote auth endpoints.
//!
//! `SessionService` is the only owner of the credential store. Login,
//! registration, logout and token refresh all go through it, and the request
//! gateway asks it for tokens instead of reading storage directly.

use std::sync::{Arc, Mutex};

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::credentials::CredentialStore;
use super::error::AuthError;
use super::session::{Session, SessionUser, TokenPair};
use super::signal::{self, SessionSignal};

const LOGIN_PATH: &str = "login/";
const REGISTER_PATH: &str = "register/";
const REFRESH_PATH: &str = "token/refresh/";

/// Handle to the device's session. Clone is cheap; clones share state.
#[derive(Clone)]
pub struct SessionService {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    // Serializes read-modify-write cycles on the store
    write_lock: Mutex<()>,
    // At most one refresh triggered by rejected requests runs at a time
    refresh_lock: tokio::sync::Mutex<()>,
    signals: broadcast::Sender<SessionSignal>,
}

impl SessionService {
    /// `base_url` must end with `/`; endpoint paths are appended to it.
    pub fn new(http: Client, base_url: impl Into<String>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.into(),
                store,
                write_lock: Mutex::new(()),
                refresh_lock: tokio::sync::Mutex::new(()),
                signals: signal::channel(),
            }),
        }
    }

    pub(crate) fn http(&self) -> &Client {
        &self.inner.http
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    // ===== Auth operations =====

    /// Log in and persist the returned session
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionUser, AuthError> {
        let body = serde_json::json!({ "username": username, "password": password });
        let session: Session = self
            .post_json(LOGIN_PATH, &body)
            .await
            .map_err(AuthError::Authentication)?;
        if session.access_token().is_none() {
            return Err(AuthError::Authentication("Invalid login response".to_string()));
        }

        self.persist(&session)?;
        info!(user = %session.user.username, "Logged in");
        Ok(session.user)
    }

    /// Create an account. The server logs the new user in, so the returned
    /// session is persisted exactly like a login.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<SessionUser, AuthError> {
        let body = serde_json::json!({
            "username": username,
            "email": email,
            "password": password,
        });
        let session: Session = self
            .post_json(REGISTER_PATH, &body)
            .await
            .map_err(AuthError::Registration)?;
        if session.access_token().is_none() {
            return Err(AuthError::Registration("Invalid registration response".to_string()));
        }

        self.persist(&session)?;
        info!(user = %session.user.username, "Registered new account");
        Ok(session.user)
    }

    /// Drop the stored session. Safe to call with no session present.
    pub fn logout(&self) -> Result<(), AuthError> {
        let _guard = self.lock_writes();
        self.inner.store.clear()?;
        info!("Session cleared");
        Ok(())
    }

    /// Exchange `refresh_token` for a new token pair and merge it into the
    /// stored session. Nothing is written unless the exchange succeeds.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let body = serde_json::json!({ "refresh": refresh_token });
        let tokens: TokenPair = self
            .post_json(REFRESH_PATH, &body)
            .await
            .map_err(AuthError::Refresh)?;

        if tokens.access.is_empty() || tokens.refresh.is_empty() {
            return Err(AuthError::Refresh("Invalid token refresh response".to_string()));
        }

        self.merge_tokens(&tokens)?;
        debug!("Access token refreshed");
        Ok(tokens)
    }

    /// Refresh on behalf of a request whose `rejected_access` token drew a 401.
    ///
    /// Concurrent callers queue up here. A caller that finds the stored
    /// access token already replaced reuses it without another network call.
    /// The work runs on its own task so the new tokens are committed even if
    /// the caller stops waiting.
    pub async fn refresh_after_rejection(
        &self,
        rejected_access: Option<String>,
    ) -> Result<String, AuthError> {
        let this = self.clone();
        let task = tokio::spawn(async move { this.coalesced_refresh(rejected_access).await });
        match task.await {
            Ok(result) => result,
            Err(e) => Err(AuthError::Refresh(format!("Refresh task failed: {}", e))),
        }
    }

    async fn coalesced_refresh(&self, rejected_access: Option<String>) -> Result<String, AuthError> {
        let _guard = self.inner.refresh_lock.lock().await;

        if let Some(current) = self.current_access_token() {
            if rejected_access.as_deref() != Some(current.as_str()) {
                debug!("Access token already refreshed by another request");
                return Ok(current);
            }
        }

        let refresh = self
            .current_refresh_token()
            .ok_or_else(|| AuthError::Refresh("No refresh token available".to_string()))?;
        let tokens = self.refresh_session(&refresh).await?;
        Ok(tokens.access)
    }

    /// Startup check: a stored access token counts as valid; a session with
    /// only a refresh token gets one refresh attempt.
    pub async fn is_session_valid(&self) -> bool {
        let Some(session) = self.current_session() else {
            return false;
        };

        if session.access_token().is_some() {
            return true;
        }

        match session.refresh_token() {
            Some(refresh) => match self.refresh_session(refresh).await {
                Ok(_) => true,
                Err(e) => {
                    warn!(error = %e, "Stored session could not be refreshed");
                    false
                }
            },
            None => false,
        }
    }

    // ===== Read accessors =====

    pub fn current_session(&self) -> Option<Session> {
        self.inner.store.get()
    }

    pub fn current_access_token(&self) -> Option<String> {
        self.current_session()
            .and_then(|s| s.access_token().map(str::to_string))
    }

    pub fn current_refresh_token(&self) -> Option<String> {
        self.current_session()
            .and_then(|s| s.refresh_token().map(str::to_string))
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        self.current_session().map(|s| s.user)
    }

    // ===== Signals =====

    /// Receive `AuthorizationLost` and other session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionSignal> {
        self.inner.signals.subscribe()
    }

    pub(crate) fn emit(&self, signal: SessionSignal) {
        // No subscribers is fine; the failing request still reports the loss.
        let _ = self.inner.signals.send(signal);
    }

    // ===== Storage =====

    fn lock_writes(&self) -> std::sync::MutexGuard<'_, ()> {
        self.inner.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, session: &Session) -> Result<(), AuthError> {
        let _guard = self.lock_writes();
        self.inner.store.put(session)?;
        Ok(())
    }

    fn merge_tokens(&self, tokens: &TokenPair) -> Result<(), AuthError> {
        let _guard = self.lock_writes();
        match self.inner.store.get() {
            Some(session) => {
                self.inner.store.put(&session.with_tokens(tokens.clone()))?;
            }
            None => {
                // Logged out while the refresh was in flight; don't resurrect.
                debug!("No stored session to merge refreshed tokens into");
            }
        }
        Ok(())
    }

    // ===== HTTP =====

    async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, String>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let response = self
            .inner
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            debug!(url = %url, status = %status, "Auth endpoint rejected request");
            return Err(failure_reason(status, &text));
        }

        response
            .json()
            .await
            .map_err(|e| format!("Invalid response from server: {}", e))
    }
}

/// Pick the most useful message out of an error response body.
/// Prefers `detail`, then per-field messages, then the bare status.
fn failure_reason(status: StatusCode, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    if let Some(Value::Object(map)) = parsed {
        if let Some(Value::String(detail)) = map.get("detail") {
            return detail.clone();
        }

        let fields: Vec<String> = map
            .iter()
            .filter_map(|(field, value)| {
                let messages = field_messages(value)?;
                if field == "non_field_errors" {
                    Some(messages)
                } else {
                    Some(format!("{}: {}", field, messages))
                }
            })
            .collect();
        if !fields.is_empty() {
            return fields.join("; ");
        }
    }

    format!("Request failed with status {}", status)
}

fn field_messages(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join(" "))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_prefers_detail() {
        let body = r#"{"detail": "No active account found", "username": ["bad"]}"#;
        assert_eq!(
            failure_reason(StatusCode::UNAUTHORIZED, body),
            "No active account found"
        );
    }

    #[test]
    fn test_failure_reason_field_messages() {
        let body = r#"{"username": ["A user with that username already exists."]}"#;
        assert_eq!(
            failure_reason(StatusCode::BAD_REQUEST, body),
            "username: A user with that username already exists."
        );
    }

    #[test]
    fn test_failure_reason_non_field_errors_unprefixed() {
        let body = r#"{"non_field_errors": ["Passwords do not match"]}"#;
        assert_eq!(
            failure_reason(StatusCode::BAD_REQUEST, body),
            "Passwords do not match"
        );
    }

    #[test]
    fn test_failure_reason_falls_back_to_status() {
        assert_eq!(
            failure_reason(StatusCode::BAD_GATEWAY, "<html>oops</html>"),
            "Request failed with status 502 Bad Gateway"
        );
    }
}
