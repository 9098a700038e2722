//! Integration tests for the authentication status seen by front ends

mod common;

use std::sync::Arc;
use std::time::Duration;

use haulbook_core::auth::CredentialStore;
use haulbook_core::{ApiClient, ApiError, AuthError, SessionState, SessionStatus};
use mockito::Server;

use common::{alice, login_body, service, service_with, session};

#[tokio::test]
async fn starts_unknown_and_settles_on_initialize() {
    //* Given
    let server = Server::new_async().await;
    let (with_session, _) = service_with(&server, &session("A1", "R1"));
    let (without_session, _) = service(&server);
    let signed_in = SessionState::new(with_session);
    let signed_out = SessionState::new(without_session);

    //* Then
    assert_eq!(signed_in.status(), SessionStatus::Unknown);
    assert!(signed_in.user().is_none());

    assert_eq!(signed_in.initialize().await, SessionStatus::Authenticated);
    assert_eq!(signed_in.user(), Some(alice()));

    assert_eq!(signed_out.initialize().await, SessionStatus::Unauthenticated);
    assert!(signed_out.user().is_none());
}

#[tokio::test]
async fn login_and_logout_transitions() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/login/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(login_body("A1", "R1"))
        .create_async()
        .await;
    let (service, store) = service(&server);
    let state = SessionState::new(service);
    state.initialize().await;
    let mut updates = state.subscribe();

    //* When
    state.login("alice", "pw1").await.expect("login failed");

    //* Then
    assert_eq!(state.status(), SessionStatus::Authenticated);
    assert_eq!(state.user(), Some(alice()));
    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().status, SessionStatus::Authenticated);

    //* When
    state.logout().await.expect("logout failed");

    //* Then
    assert_eq!(state.status(), SessionStatus::Unauthenticated);
    assert!(state.user().is_none());
    assert!(store.get().is_none());
}

#[tokio::test]
async fn failed_login_leaves_status_alone() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/login/")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"detail": "Invalid credentials"}"#)
        .create_async()
        .await;
    let (service, _store) = service(&server);
    let state = SessionState::new(service);
    state.initialize().await;

    //* When
    let result = state.login("alice", "nope").await;

    //* Then
    match result {
        Err(e @ AuthError::Authentication(_)) => assert_eq!(e.user_message(), "Invalid credentials"),
        other => panic!("expected authentication error, got {:?}", other),
    }
    assert_eq!(state.status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn authorization_lost_moves_to_unauthenticated() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/records/")
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("POST", "/api/token/refresh/")
        .with_status(401)
        .create_async()
        .await;
    let (service, _store) = service_with(&server, &session("A1", "R1"));
    let client = ApiClient::new(service.clone());
    let state = Arc::new(SessionState::new(service));
    assert_eq!(state.initialize().await, SessionStatus::Authenticated);
    let listener = state.spawn_signal_listener();
    let mut updates = state.subscribe();

    //* When
    let result = client.list_records().await;

    //* Then
    assert!(matches!(result, Err(ApiError::AuthorizationLost)));
    tokio::time::timeout(Duration::from_secs(5), updates.changed())
        .await
        .expect("no status change")
        .expect("state dropped");
    assert_eq!(state.status(), SessionStatus::Unauthenticated);
    assert!(state.user().is_none());

    listener.abort();
}
