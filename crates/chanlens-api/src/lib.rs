//! JSON REST API for chanlens.
//!
//! Exposes an axum [`Router`] backed by any [`Warehouse`]. Every response,
//! success or error, is wrapped in a JSON envelope; see [`envelope`] and
//! [`error`]. Auth and TLS are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! axum::serve(listener, chanlens_api::api_router(warehouse.clone())).await?;
//! ```

pub mod channels;
pub mod detections;
pub mod engagement;
pub mod envelope;
pub mod error;
pub mod params;
pub mod reports;
pub mod search;
pub mod stats;

use std::sync::Arc;

use axum::{Router, routing::get};
use chanlens_core::warehouse::Warehouse;
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

pub use envelope::Envelope;
pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be served directly or nested into any parent
/// router regardless of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: Warehouse + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let cors = CorsLayer::new()
    .allow_origin(Any)
    .allow_methods(Any)
    .allow_headers(Any);

  Router::new()
    .route("/", get(stats::root))
    .route("/health", get(stats::health::<S>))
    // Reports
    .route("/api/reports/top-products", get(reports::top_products::<S>))
    // Channels
    .route("/api/channels", get(channels::top::<S>))
    .route("/api/channels/list", get(channels::list::<S>))
    .route("/api/channels/{name}/activity", get(channels::activity::<S>))
    .route("/api/channels/{name}/analytics", get(channels::analytics::<S>))
    // Messages
    .route("/api/search/messages", get(search::messages::<S>))
    .route("/api/engagement/metrics", get(engagement::metrics::<S>))
    // Detections
    .route("/api/detections", get(detections::list::<S>))
    // Stats
    .route("/api/stats/summary", get(stats::summary::<S>))
    .with_state(store)
    .layer(TraceLayer::new_for_http())
    .layer(cors)
}

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use chanlens_core::{
    lookup::ObjectCategories,
    pipeline::transform,
    raw::{RawDetection, RawMessage},
  };
  use chanlens_store_sqlite::SqliteWarehouse;
  use serde_json::Value;
  use tower::ServiceExt as _;

  fn message(id: i64, channel: &str, date: &str, text: &str, views: i64) -> RawMessage {
    RawMessage {
      id:         Some(id),
      channel:    Some(channel.into()),
      date:       Some(date.into()),
      text:       Some(text.into()),
      views:      Some(views),
      forwards:   Some(views / 50),
      replies:    Some(1),
      has_media:  Some(true),
      scraped_at: None,
    }
  }

  fn detection(id: i64, message_id: i64, class: &str, confidence: f64) -> RawDetection {
    RawDetection {
      id: Some(id),
      message_id: Some(message_id),
      detected_object_class: Some(class.into()),
      confidence_score: Some(confidence),
      ..Default::default()
    }
  }

  async fn warehouse() -> Arc<SqliteWarehouse> {
    let store = SqliteWarehouse::open_in_memory().await.unwrap();
    let messages = vec![
      message(1, "CheMed123", "2025-07-10 09:00:00", "Amoxicillin restocked", 500),
      message(2, "CheMed123", "2025-07-20 12:00:00", "Blood pressure monitor", 250),
      message(3, "tikvahpharma", "2025-07-21 20:00:00", "amoxicillin 250mg", 1000),
    ];
    let detections = vec![
      detection(1, 1, "person", 0.92),
      detection(2, 2, "bottle", 0.55),
      detection(3, 3, "person", 0.41),
    ];
    let (marts, _) = transform(messages, detections, &ObjectCategories::default());
    store.replace_marts(&marts).await.unwrap();
    Arc::new(store)
  }

  async fn get_json(uri: &str) -> (StatusCode, Value) {
    let resp = api_router(warehouse().await)
      .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
      .await
      .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  // ── Envelope ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn root_and_health_succeed() {
    let (status, body) = get_json("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert!(body["timestamp"].is_string());

    let (status, body) = get_json("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["database"], "connected");
  }

  #[tokio::test]
  async fn errors_use_error_envelope() {
    let (status, body) = get_json("/api/reports/top-products?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error_code"], "HTTP_400");
    assert!(body["message"].as_str().unwrap().contains("limit"));
  }

  #[tokio::test]
  async fn malformed_parameter_is_bad_request() {
    let (status, body) = get_json("/api/channels?limit=many").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "HTTP_400");
  }

  // ── Reports and channels ────────────────────────────────────────────────────

  #[tokio::test]
  async fn top_products() {
    let (status, body) = get_json("/api/reports/top-products?limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_records"], 2);
    assert_eq!(body["limit"], 5);
    assert_eq!(body["data"][0]["object_class"], "person");
    assert_eq!(body["data"][0]["object_category"], "people");
    assert_eq!(body["data"][0]["total_detections"], 2);
  }

  #[tokio::test]
  async fn channel_ranking_and_list() {
    let (_, top) = get_json("/api/channels?limit=1").await;
    assert_eq!(top["total_records"], 1);
    assert_eq!(top["data"][0]["channel_name"], "CheMed123");

    let (_, list) = get_json("/api/channels/list").await;
    assert_eq!(list["total_records"], 2);
    assert_eq!(list["data"][1]["channel_name"], "tikvahpharma");

    let (status, _) = get_json("/api/channels?limit=51").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn channel_activity_window() {
    let (status, body) =
      get_json("/api/channels/CheMed123/activity?days=7&as_of=2025-07-21").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_records"], 1);
    assert_eq!(body["data"][0]["date"], "2025-07-20");

    let (status, body) =
      get_json("/api/channels/CheMed123/activity?days=30&as_of=2025-07-21").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_records"], 2);

    let (status, body) =
      get_json("/api/channels/CheMed123/activity?days=1&as_of=2025-08-30").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "HTTP_404");

    let (status, _) = get_json("/api/channels/CheMed123/activity?days=366").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn channel_analytics() {
    let (status, body) = get_json("/api/channels/CheMed123/analytics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_messages"], 2);
    assert_eq!(body["data"]["total_views"], 750);
    assert_eq!(body["data"]["detection_count"], 2);
    assert!(body.get("total_records").is_none());

    let (status, _) = get_json("/api/channels/ghost/analytics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Search, engagement, detections ──────────────────────────────────────────

  #[tokio::test]
  async fn search_messages() {
    let (status, body) = get_json("/api/search/messages?query=AMOXICILLIN").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "AMOXICILLIN");
    assert_eq!(body["total_records"], 2);

    let (status, _) = get_json("/api/search/messages?query=%20%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = get_json("/api/search/messages").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = get_json("/api/search/messages?query=x&limit=201").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn engagement_metrics() {
    let (status, body) =
      get_json("/api/engagement/metrics?days=5&as_of=2025-07-22").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_records"], 2);
    assert_eq!(body["data"][0]["date"], "2025-07-21");
    assert_eq!(body["data"][0]["total_views"], 1000);
  }

  #[tokio::test]
  async fn detections_with_filters() {
    let (_, all) = get_json("/api/detections").await;
    assert_eq!(all["total_records"], 3);
    assert_eq!(all["data"][0]["detection_id"], 1);

    let (_, people) = get_json("/api/detections?object_class=person&confidence_level=low").await;
    assert_eq!(people["total_records"], 1);
    assert_eq!(people["data"][0]["detection_id"], 3);

    let (status, body) = get_json("/api/detections?confidence_level=certain").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
  }

  #[tokio::test]
  async fn summary() {
    let (status, body) = get_json("/api/stats/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_channels"], 2);
    assert_eq!(body["data"]["total_messages"], 3);
    assert_eq!(body["data"]["total_detections"], 3);
    assert_eq!(body["data"]["unique_objects_detected"], 2);
  }
}
