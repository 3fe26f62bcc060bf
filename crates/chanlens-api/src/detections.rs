//! Handler for `GET /api/detections`.

use std::sync::Arc;

use axum::extract::{Query, State, rejection::QueryRejection};
use chanlens_core::{
  ladder::ConfidenceLevel,
  warehouse::{DetectionDetail, DetectionFilter, Warehouse},
};
use serde::Deserialize;

use crate::{envelope::Envelope, error::ApiError, params::bounded};

#[derive(Debug, Deserialize)]
pub struct DetectionParams {
  pub object_class:     Option<String>,
  /// `high`, `medium` or `low`.
  pub confidence_level: Option<String>,
  pub limit:            Option<u32>,
}

/// `GET /api/detections[?object_class=..][&confidence_level=..][&limit=1..200]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  query: Result<Query<DetectionParams>, QueryRejection>,
) -> Result<Envelope<Vec<DetectionDetail>>, ApiError>
where
  S: Warehouse,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let Query(params) = query?;
  let confidence_level = params
    .confidence_level
    .as_deref()
    .map(|l| ConfidenceLevel::parse(&l.trim().to_lowercase()))
    .transpose()
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
  let filter = DetectionFilter {
    object_class: params.object_class.filter(|c| !c.trim().is_empty()),
    confidence_level,
    limit: bounded("limit", params.limit, 50, (1, 200))? as usize,
  };

  let detections = store.detections(&filter).await.map_err(ApiError::store)?;
  Ok(Envelope::list(
    format!("Retrieved {} object detections", detections.len()),
    detections,
  ))
}
