//! Handler for `GET /api/reports/top-products`.

use std::sync::Arc;

use axum::extract::{Query, State, rejection::QueryRejection};
use chanlens_core::warehouse::{TopObject, Warehouse};
use serde::Deserialize;

use crate::{envelope::Envelope, error::ApiError, params::bounded};

#[derive(Debug, Deserialize)]
pub struct TopProductsParams {
  pub limit: Option<u32>,
}

/// `GET /api/reports/top-products[?limit=1..100]`
pub async fn top_products<S>(
  State(store): State<Arc<S>>,
  query: Result<Query<TopProductsParams>, QueryRejection>,
) -> Result<Envelope<Vec<TopObject>>, ApiError>
where
  S: Warehouse,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let Query(params) = query?;
  let limit = bounded("limit", params.limit, 10, (1, 100))?;
  let objects = store
    .top_objects(limit as usize)
    .await
    .map_err(ApiError::store)?;
  Ok(
    Envelope::list(
      format!("Retrieved top {} detected objects", objects.len()),
      objects,
    )
    .with_limit(limit),
  )
}
