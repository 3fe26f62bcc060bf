//! Handler for `GET /api/engagement/metrics`.

use std::sync::Arc;

use axum::extract::{Query, State, rejection::QueryRejection};
use chanlens_core::warehouse::{EngagementMetric, Warehouse};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
  envelope::Envelope,
  error::ApiError,
  params::{bounded, window_start},
};

#[derive(Debug, Deserialize)]
pub struct MetricsParams {
  pub days:  Option<u32>,
  pub as_of: Option<NaiveDate>,
}

/// `GET /api/engagement/metrics[?days=1..365][&as_of=YYYY-MM-DD]`
pub async fn metrics<S>(
  State(store): State<Arc<S>>,
  query: Result<Query<MetricsParams>, QueryRejection>,
) -> Result<Envelope<Vec<EngagementMetric>>, ApiError>
where
  S: Warehouse,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let Query(params) = query?;
  let days = bounded("days", params.days, 30, (1, 365))?;
  let metrics = store
    .engagement_metrics(window_start(params.as_of, days))
    .await
    .map_err(ApiError::store)?;
  Ok(Envelope::list(
    format!("Retrieved engagement metrics for the last {days} days"),
    metrics,
  ))
}
