//! REST API client module for the haulbook records service.
//!
//! This module provides the `ApiClient` for fetching the dashboard and
//! managing transport records, and the `Gateway` every protected request
//! passes through.
//!
//! The API uses JWT bearer tokens. A 401 triggers one token refresh and one
//! retry; a second 401 ends the session.

pub mod client;
pub mod error;
pub mod gateway;

pub use client::ApiClient;
pub use error::ApiError;
pub use gateway::{Attempt, Gateway, RequestSpec};
