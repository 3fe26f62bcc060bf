//! The success envelope wrapped around every response payload.

use axum::{
  Json,
  response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// `{"status":"success","message":..,"timestamp":..,"data":..}` plus
/// `total_records` for list payloads.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
  pub status:        &'static str,
  pub message:       String,
  pub timestamp:     DateTime<Utc>,
  pub data:          T,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub total_records: Option<usize>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub query:         Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit:         Option<u32>,
}

impl<T> Envelope<T> {
  /// Wrap a single object.
  pub fn one(message: impl Into<String>, data: T) -> Self {
    Self {
      status: "success",
      message: message.into(),
      timestamp: Utc::now(),
      data,
      total_records: None,
      query: None,
      limit: None,
    }
  }

  pub fn with_query(mut self, query: impl Into<String>) -> Self {
    self.query = Some(query.into());
    self
  }

  pub fn with_limit(mut self, limit: u32) -> Self {
    self.limit = Some(limit);
    self
  }
}

impl<T> Envelope<Vec<T>> {
  /// Wrap a list, recording its length in `total_records`.
  pub fn list(message: impl Into<String>, data: Vec<T>) -> Self {
    let total = data.len();
    Self {
      total_records: Some(total),
      ..Self::one(message, data)
    }
  }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
  fn into_response(self) -> Response { Json(self).into_response() }
}
