#![allow(dead_code)]

use std::sync::Arc;

use haulbook_core::auth::{CredentialStore, MemoryCredentialStore, Session, SessionUser};
use haulbook_core::SessionService;
use mockito::ServerGuard;

pub fn alice() -> SessionUser {
    SessionUser {
        id: 1,
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
    }
}

pub fn session(access: &str, refresh: &str) -> Session {
    Session {
        access: access.to_string(),
        refresh: refresh.to_string(),
        user: alice(),
    }
}

pub fn login_body(access: &str, refresh: &str) -> String {
    serde_json::json!({
        "access": access,
        "refresh": refresh,
        "user": {"id": 1, "username": "alice", "email": "alice@example.com"}
    })
    .to_string()
}

pub fn token_body(access: &str, refresh: &str) -> String {
    serde_json::json!({ "access": access, "refresh": refresh }).to_string()
}

/// Session service pointed at the mock server with an in-memory store
pub fn service(server: &ServerGuard) -> (SessionService, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::new());
    let service = SessionService::new(
        reqwest::Client::new(),
        format!("{}/api/", server.url()),
        store.clone(),
    );
    (service, store)
}

/// Same as `service`, with `session` already stored
pub fn service_with(
    server: &ServerGuard,
    session: &Session,
) -> (SessionService, Arc<MemoryCredentialStore>) {
    let (service, store) = service(server);
    store.put(session).expect("seed session");
    (service, store)
}
