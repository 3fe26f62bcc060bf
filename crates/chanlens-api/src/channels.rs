//! Handlers for `/api/channels` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/channels` | Top channels by message count; `?limit=1..50` |
//! | `GET`  | `/api/channels/list` | Every channel by name |
//! | `GET`  | `/api/channels/{name}/activity` | `?days=1..365&as_of=YYYY-MM-DD`; 404 if empty |
//! | `GET`  | `/api/channels/{name}/analytics` | 404 if the channel is unknown |

use std::sync::Arc;

use axum::extract::{Path, Query, State, rejection::QueryRejection};
use chanlens_core::warehouse::{
  ChannelActivity, ChannelAnalytics, ChannelInfo, Warehouse,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
  envelope::Envelope,
  error::ApiError,
  params::{bounded, window_start},
};

// ─── Top ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TopParams {
  pub limit: Option<u32>,
}

/// `GET /api/channels[?limit=1..50]`
pub async fn top<S>(
  State(store): State<Arc<S>>,
  query: Result<Query<TopParams>, QueryRejection>,
) -> Result<Envelope<Vec<ChannelInfo>>, ApiError>
where
  S: Warehouse,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let Query(params) = query?;
  let limit = bounded("limit", params.limit, 10, (1, 50))?;
  let channels = store
    .top_channels(limit as usize)
    .await
    .map_err(ApiError::store)?;
  Ok(Envelope::list(
    format!("Retrieved {} channels", channels.len()),
    channels,
  ))
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /api/channels/list`
pub async fn list<S>(
  State(store): State<Arc<S>>,
) -> Result<Envelope<Vec<ChannelInfo>>, ApiError>
where
  S: Warehouse,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let channels = store.channel_list().await.map_err(ApiError::store)?;
  Ok(Envelope::list("Channel list retrieved successfully", channels))
}

// ─── Activity ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActivityParams {
  pub days:  Option<u32>,
  pub as_of: Option<NaiveDate>,
}

/// `GET /api/channels/{name}/activity[?days=1..365][&as_of=YYYY-MM-DD]`
pub async fn activity<S>(
  State(store): State<Arc<S>>,
  Path(name): Path<String>,
  query: Result<Query<ActivityParams>, QueryRejection>,
) -> Result<Envelope<Vec<ChannelActivity>>, ApiError>
where
  S: Warehouse,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let Query(params) = query?;
  let days = bounded("days", params.days, 30, (1, 365))?;
  let since = window_start(params.as_of, days);

  let activity = store
    .channel_activity(&name, since)
    .await
    .map_err(ApiError::store)?;
  if activity.is_empty() {
    return Err(ApiError::NotFound(format!(
      "no activity found for channel {name:?} in the last {days} days"
    )));
  }
  Ok(Envelope::list(
    format!("Retrieved activity for channel {name}"),
    activity,
  ))
}

// ─── Analytics ────────────────────────────────────────────────────────────────

/// `GET /api/channels/{name}/analytics`
pub async fn analytics<S>(
  State(store): State<Arc<S>>,
  Path(name): Path<String>,
) -> Result<Envelope<ChannelAnalytics>, ApiError>
where
  S: Warehouse,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let analytics = store
    .channel_analytics(&name)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("channel {name:?} not found")))?;
  Ok(Envelope::one(
    format!("Retrieved analytics for channel {name}"),
    analytics,
  ))
}
