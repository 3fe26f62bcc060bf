//! Handlers for the service root, health probe and dataset summary.

use std::sync::Arc;

use axum::extract::State;
use chanlens_core::warehouse::{SummaryStats, Warehouse};
use serde::Serialize;

use crate::{envelope::Envelope, error::ApiError};

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
  pub name:      &'static str,
  pub version:   &'static str,
  pub endpoints: &'static [&'static str],
}

const ENDPOINTS: &[&str] = &[
  "/health",
  "/api/reports/top-products",
  "/api/channels",
  "/api/channels/list",
  "/api/channels/{name}/activity",
  "/api/channels/{name}/analytics",
  "/api/search/messages",
  "/api/engagement/metrics",
  "/api/detections",
  "/api/stats/summary",
];

/// `GET /`
pub async fn root() -> Envelope<ServiceInfo> {
  Envelope::one("Telegram channel analytics API", ServiceInfo {
    name:      env!("CARGO_PKG_NAME"),
    version:   env!("CARGO_PKG_VERSION"),
    endpoints: ENDPOINTS,
  })
}

#[derive(Debug, Serialize)]
pub struct Health {
  pub database: &'static str,
}

/// `GET /health`: 200 when the warehouse answers, 503 otherwise.
pub async fn health<S>(
  State(store): State<Arc<S>>,
) -> Result<Envelope<Health>, ApiError>
where
  S: Warehouse,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  store.ping().await.map_err(|e| {
    tracing::warn!(error = %e, "health check failed");
    ApiError::Unavailable(format!("warehouse unreachable: {e}"))
  })?;
  Ok(Envelope::one("Service is healthy", Health { database: "connected" }))
}

/// `GET /api/stats/summary`
pub async fn summary<S>(
  State(store): State<Arc<S>>,
) -> Result<Envelope<SummaryStats>, ApiError>
where
  S: Warehouse,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let stats = store.summary().await.map_err(ApiError::store)?;
  Ok(Envelope::one("Summary statistics retrieved successfully", stats))
}
