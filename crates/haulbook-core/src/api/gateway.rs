//! Authenticated request pipeline.
//!
//! Every call to a protected endpoint runs through `Gateway::send`:
//! attach the stored access token, dispatch, classify the response, and on a
//! first 401 refresh the session and dispatch once more. A second 401, or a
//! refresh that cannot happen, clears the session and reports
//! `ApiError::AuthorizationLost`.

use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{SessionService, SessionSignal};

use super::ApiError;

/// Which dispatch of a request this is. A request gets at most one retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Retry,
}

impl Attempt {
    fn as_str(self) -> &'static str {
        match self {
            Attempt::First => "first",
            Attempt::Retry => "retry",
        }
    }
}

/// Description of an outbound request. Rebuilt into a fresh
/// `reqwest::Request` for every dispatch.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Method,
    path: String,
    body: Option<Value>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Clone is cheap - the session service and HTTP client are shared.
#[derive(Clone)]
pub struct Gateway {
    session: SessionService,
}

impl Gateway {
    pub fn new(session: SessionService) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionService {
        &self.session
    }

    /// Send `spec` with the current credentials, refreshing once on 401.
    /// Returns the successful response; any other status is an error.
    pub async fn send(&self, spec: &RequestSpec) -> Result<Response, ApiError> {
        let mut attempt = Attempt::First;
        let mut token = self.session.current_access_token();

        loop {
            let response = self.dispatch(spec, token.as_deref(), attempt).await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return Self::check_response(response).await;
            }

            match attempt {
                Attempt::First => {
                    attempt = Attempt::Retry;
                    token = Some(self.refresh_for_retry(spec, token).await?);
                }
                Attempt::Retry => {
                    warn!(path = %spec.path, "Request rejected again after token refresh");
                    return Err(self.authorization_lost());
                }
            }
        }
    }

    async fn dispatch(
        &self,
        spec: &RequestSpec,
        token: Option<&str>,
        attempt: Attempt,
    ) -> Result<Response, ApiError> {
        debug!(
            method = %spec.method,
            path = %spec.path,
            attempt = attempt.as_str(),
            authenticated = token.is_some(),
            "Dispatching request"
        );

        let mut request = self
            .session
            .http()
            .request(spec.method.clone(), self.session.url(&spec.path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(ref body) = spec.body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }

    /// Get a fresh access token for the retry, or give up on the session
    async fn refresh_for_retry(
        &self,
        spec: &RequestSpec,
        rejected: Option<String>,
    ) -> Result<String, ApiError> {
        if self.session.current_refresh_token().is_none() {
            warn!(path = %spec.path, "Request unauthorized and no refresh token stored");
            return Err(self.authorization_lost());
        }

        match self.session.refresh_after_rejection(rejected).await {
            Ok(access) => Ok(access),
            Err(e) => {
                warn!(path = %spec.path, error = %e, "Token refresh failed");
                Err(self.authorization_lost())
            }
        }
    }

    /// Terminal path: drop local credentials and tell the presentation layer
    fn authorization_lost(&self) -> ApiError {
        if let Err(e) = self.session.logout() {
            warn!(error = %e, "Failed to clear session after authorization loss");
        }
        self.session.emit(SessionSignal::AuthorizationLost);
        ApiError::AuthorizationLost
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }
}
