//! API client for the haulbook records service.
//!
//! Typed wrappers over the protected endpoints. Every call goes through the
//! `Gateway`, so expired access tokens are refreshed transparently.

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::auth::SessionService;
use crate::models::{DashboardData, RecordInput, TransportRecord};

use super::gateway::{Gateway, RequestSpec};
use super::ApiError;

/// Clone is cheap - the gateway shares the session and connection pool.
#[derive(Clone)]
pub struct ApiClient {
    gateway: Gateway,
}

impl ApiClient {
    pub fn new(session: SessionService) -> Self {
        Self {
            gateway: Gateway::new(session),
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn session(&self) -> &SessionService {
        self.gateway.session()
    }

    async fn fetch<T: DeserializeOwned>(&self, spec: RequestSpec) -> Result<T, ApiError> {
        let path = spec.path().to_string();
        let response = self.gateway.send(&spec).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", path, e))
        })
    }

    async fn send_json<T: DeserializeOwned, B: Serialize>(
        &self,
        spec: RequestSpec,
        body: &B,
    ) -> Result<T, ApiError> {
        self.fetch(spec.json(body)?).await
    }

    // ===== Dashboard =====

    pub async fn dashboard(&self) -> Result<DashboardData, ApiError> {
        self.fetch(RequestSpec::get("dashboard/")).await
    }

    // ===== Records =====

    pub async fn list_records(&self) -> Result<Vec<TransportRecord>, ApiError> {
        let records: Vec<TransportRecord> = self.fetch(RequestSpec::get("records/")).await?;
        debug!(count = records.len(), "Fetched records");
        Ok(records)
    }

    pub async fn get_record(&self, id: i64) -> Result<TransportRecord, ApiError> {
        self.fetch(RequestSpec::get(format!("records/{}/", id))).await
    }

    pub async fn create_record(&self, input: &RecordInput) -> Result<TransportRecord, ApiError> {
        self.send_json(RequestSpec::post("records/add/"), input).await
    }

    pub async fn update_record(
        &self,
        id: i64,
        input: &RecordInput,
    ) -> Result<TransportRecord, ApiError> {
        self.send_json(RequestSpec::put(format!("records/{}/", id)), input)
            .await
    }

    /// Delete a record. The server answers 204 with no body.
    pub async fn delete_record(&self, id: i64) -> Result<(), ApiError> {
        self.gateway
            .send(&RequestSpec::delete(format!("records/{}/", id)))
            .await?;
        debug!(id, "Deleted record");
        Ok(())
    }
}
