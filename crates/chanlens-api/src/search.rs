//! Handler for `GET /api/search/messages`.

use std::sync::Arc;

use axum::extract::{Query, State, rejection::QueryRejection};
use chanlens_core::warehouse::{MessageHit, Warehouse};
use serde::Deserialize;

use crate::{envelope::Envelope, error::ApiError, params::bounded};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  /// Case-insensitive substring to look for in message text.
  pub query: Option<String>,
  pub limit: Option<u32>,
}

/// `GET /api/search/messages?query=...[&limit=1..200]`
pub async fn messages<S>(
  State(store): State<Arc<S>>,
  query: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Envelope<Vec<MessageHit>>, ApiError>
where
  S: Warehouse,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let Query(params) = query?;
  let text = params
    .query
    .map(|q| q.trim().to_owned())
    .filter(|q| !q.is_empty())
    .ok_or_else(|| ApiError::BadRequest("query must not be empty".into()))?;
  let limit = bounded("limit", params.limit, 50, (1, 200))?;

  let hits = store
    .search_messages(&text, limit as usize)
    .await
    .map_err(ApiError::store)?;
  Ok(
    Envelope::list(
      format!("Found {} messages matching {text:?}", hits.len()),
      hits,
    )
    .with_query(text),
  )
}
