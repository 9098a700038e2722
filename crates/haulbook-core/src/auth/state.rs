//! Authentication status as seen by presentation code.
//!
//! Status starts `Unknown` and settles to `Authenticated` or
//! `Unauthenticated` once the stored session has been checked. It is
//! re-evaluated after every login, registration, logout, and lost
//! authorization. Screens should not read user data unless the status is
//! `Authenticated`.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::AuthError;
use super::service::SessionService;
use super::session::SessionUser;
use super::signal::SessionSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SessionStatus {
    Unknown,
    Authenticated,
    Unauthenticated,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Unknown => write!(f, "Unknown"),
            SessionStatus::Authenticated => write!(f, "Authenticated"),
            SessionStatus::Unauthenticated => write!(f, "Unauthenticated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub status: SessionStatus,
    pub user: Option<SessionUser>,
}

impl AuthSnapshot {
    fn unknown() -> Self {
        Self {
            status: SessionStatus::Unknown,
            user: None,
        }
    }
}

pub struct SessionState {
    service: SessionService,
    snapshot: watch::Sender<AuthSnapshot>,
}

impl SessionState {
    pub fn new(service: SessionService) -> Self {
        let (snapshot, _rx) = watch::channel(AuthSnapshot::unknown());
        Self { service, snapshot }
    }

    pub fn service(&self) -> &SessionService {
        &self.service
    }

    pub fn status(&self) -> SessionStatus {
        self.snapshot.borrow().status
    }

    /// Current user; always None unless authenticated
    pub fn user(&self) -> Option<SessionUser> {
        let snapshot = self.snapshot.borrow();
        match snapshot.status {
            SessionStatus::Authenticated => snapshot.user.clone(),
            _ => None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.snapshot.subscribe()
    }

    /// Check the stored session once at startup
    pub async fn initialize(&self) -> SessionStatus {
        self.reevaluate().await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<SessionUser, AuthError> {
        let user = self.service.login(username, password).await?;
        self.reevaluate().await;
        Ok(user)
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<SessionUser, AuthError> {
        let user = self.service.register(username, email, password).await?;
        self.reevaluate().await;
        Ok(user)
    }

    pub async fn logout(&self) -> Result<(), AuthError> {
        self.service.logout()?;
        self.reevaluate().await;
        Ok(())
    }

    pub async fn handle_signal(&self, signal: SessionSignal) {
        match signal {
            SessionSignal::AuthorizationLost => {
                info!("Authorization lost; session invalidated");
                self.reevaluate().await;
            }
        }
    }

    /// Follow the service's signals until it goes away
    pub fn spawn_signal_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let state = Arc::clone(self);
        let mut signals = self.service.subscribe();
        tokio::spawn(async move {
            loop {
                match signals.recv().await {
                    Ok(signal) => state.handle_signal(signal).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Session signals dropped; re-checking session");
                        state.reevaluate().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn reevaluate(&self) -> SessionStatus {
        let valid = self.service.is_session_valid().await;
        let next = if valid {
            AuthSnapshot {
                status: SessionStatus::Authenticated,
                user: self.service.current_user(),
            }
        } else {
            AuthSnapshot {
                status: SessionStatus::Unauthenticated,
                user: None,
            }
        };
        let status = next.status;

        // Only notify watchers when something actually changed
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                debug!(from = %current.status, to = %next.status, "Session status changed");
                *current = next;
                true
            }
        });
        status
    }
}
