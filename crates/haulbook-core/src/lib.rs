//! Core library for haulbook.
//!
//! Session handling, the authenticated API client with transparent token
//! refresh, and models for the trip records service. Front ends build a
//! `SessionService` from `Config`, hand it to `SessionState` and
//! `ApiClient`, and route the user to login when `SessionSignal::AuthorizationLost`
//! arrives.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{
    AuthError, CredentialStore, Session, SessionService, SessionSignal, SessionState,
    SessionStatus, SessionUser,
};
pub use config::Config;
