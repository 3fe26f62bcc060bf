//! The `Warehouse` trait and its read models.
//!
//! Implemented by storage backends (e.g. `chanlens-store-sqlite`). The API
//! and the job runner depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
  ladder::{
    ActivityLevel, ConfidenceLevel, FrequencyCategory, ObjectCategory,
    ReachCategory,
  },
  pipeline::{MartCounts, Marts},
  raw::{RawDetection, RawMessage},
};

// ─── Read models ─────────────────────────────────────────────────────────────

/// A detected object class ranked by detection count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopObject {
  pub object_class:         String,
  pub object_category:      ObjectCategory,
  pub total_detections:     i64,
  pub messages_with_object: i64,
  pub channels_with_object: i64,
  pub avg_confidence:       f64,
  pub frequency_category:   FrequencyCategory,
  pub importance_score:     f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
  pub channel_name:           String,
  pub total_messages:         i64,
  pub avg_views_per_message:  f64,
  pub overall_forward_rate:   f64,
  pub channel_activity_level: ActivityLevel,
}

/// One channel's activity on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelActivity {
  pub channel_name:         String,
  pub date:                 NaiveDate,
  pub message_count:        i64,
  pub total_views:          i64,
  pub total_forwards:       i64,
  pub avg_engagement_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAnalytics {
  pub channel_name:           String,
  pub total_messages:         i64,
  pub total_views:            i64,
  pub total_forwards:         i64,
  pub total_replies:          i64,
  pub avg_engagement_score:   f64,
  pub avg_views_per_message:  f64,
  pub overall_forward_rate:   f64,
  pub channel_activity_level: ActivityLevel,
  /// Up to five most frequently detected classes, most frequent first.
  pub top_detected_objects:   Vec<String>,
  /// Detections across those top classes.
  pub detection_count:        i64,
  /// Mean of the per-class average confidences of those top classes.
  pub avg_confidence:         f64,
}

/// A message matching a text search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHit {
  pub message_id:       i64,
  pub channel_name:     String,
  pub message_date:     NaiveDateTime,
  pub view_count:       i64,
  pub forward_count:    i64,
  pub reply_count:      i64,
  pub engagement_score: f64,
  pub reach_category:   ReachCategory,
  pub message_text:     Option<String>,
  pub has_media:        bool,
}

/// Engagement aggregated over all channels for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementMetric {
  pub date:                     NaiveDate,
  pub total_messages:           i64,
  pub total_views:              i64,
  pub total_forwards:           i64,
  pub total_replies:            i64,
  pub avg_engagement_score:     f64,
  /// Messages with `engagement_score > HIGH_ENGAGEMENT_THRESHOLD`.
  pub high_engagement_messages: i64,
}

/// Engagement score above which a message counts as highly engaging.
pub const HIGH_ENGAGEMENT_THRESHOLD: f64 = 0.5;

/// Parameters for [`Warehouse::detections`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionFilter {
  pub object_class:     Option<String>,
  pub confidence_level: Option<ConfidenceLevel>,
  pub limit:            usize,
}

impl Default for DetectionFilter {
  fn default() -> Self {
    Self {
      object_class:     None,
      confidence_level: None,
      limit:            50,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionDetail {
  pub detection_id:     i64,
  pub message_id:       i64,
  pub channel_name:     Option<String>,
  pub object_class:     String,
  pub confidence_score: f64,
  pub confidence_level: ConfidenceLevel,
  pub bbox_area:        f64,
  pub detection_score:  f64,
  pub detection_date:   Option<NaiveDateTime>,
  pub message_date:     Option<NaiveDateTime>,
  pub engagement_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
  pub total_channels:          i64,
  pub total_messages:          i64,
  pub total_views:             i64,
  pub total_forwards:          i64,
  pub avg_engagement_score:    f64,
  pub unique_objects_detected: i64,
  pub total_detections:        i64,
}

/// Quality profile of the raw message table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityReport {
  pub total_rows:    i64,
  /// Rows minus distinct message ids.
  pub duplicates:    i64,
  pub null_channels: i64,
  pub null_dates:    i64,
  pub first_date:    Option<String>,
  pub last_date:     Option<String>,
  pub avg_views:     Option<f64>,
  pub min_views:     Option<i64>,
  pub max_views:     Option<i64>,
  pub quality_score: i64,
}

impl DataQualityReport {
  /// Ten points off per issue, floored at zero.
  pub fn score(duplicates: i64, null_channels: i64, null_dates: i64) -> i64 {
    let issues = duplicates + null_channels + null_dates;
    100_i64.saturating_sub(issues.saturating_mul(10)).max(0)
  }
}

/// One `dim_objects` category and the number of classes in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
  pub object_category: ObjectCategory,
  pub classes:         i64,
}

/// Quality profile of the published detection marts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionQualityReport {
  pub total_detections:      i64,
  pub high_confidence:       i64,
  pub medium_confidence:     i64,
  pub low_confidence:        i64,
  /// Detections whose message has no fact row.
  pub orphaned_detections:   i64,
  /// Largest category first.
  pub category_distribution: Vec<CategoryCount>,
  pub avg_detection_score:   Option<f64>,
  pub quality_score:         i64,
}

impl DetectionQualityReport {
  /// Out of 100: the high-confidence share weighs 50, the non-orphaned share
  /// 30 and the average detection score (capped at 1) 20. Truncated.
  pub fn score(
    total: i64,
    high: i64,
    orphaned: i64,
    avg_detection_score: Option<f64>,
  ) -> i64 {
    let high_ratio = rate_or_zero(high, total);
    let orphan_ratio = rate_or_zero(orphaned, total);
    let avg = avg_detection_score.unwrap_or(0.0).clamp(0.0, 1.0);
    (high_ratio * 50.0 + (1.0 - orphan_ratio) * 30.0 + avg * 20.0) as i64
  }
}

fn rate_or_zero(part: i64, whole: i64) -> f64 {
  if whole > 0 { part as f64 / whole as f64 } else { 0.0 }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a chanlens warehouse backend.
///
/// Raw tables are append-only. Mart tables are replaced wholesale by
/// [`Warehouse::replace_marts`], which either publishes a complete,
/// consistent set of marts or leaves the previous set untouched.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait Warehouse: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Raw layer ─────────────────────────────────────────────────────────

  /// Append scraped messages; returns the number of rows written.
  fn load_raw_messages(
    &self,
    messages: Vec<RawMessage>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Append detector output; returns the number of rows written.
  fn load_raw_detections(
    &self,
    detections: Vec<RawDetection>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Every raw message row in load order.
  fn raw_messages(
    &self,
  ) -> impl Future<Output = Result<Vec<RawMessage>, Self::Error>> + Send + '_;

  /// Every raw detection row in load order.
  fn raw_detections(
    &self,
  ) -> impl Future<Output = Result<Vec<RawDetection>, Self::Error>> + Send + '_;

  fn data_quality(
    &self,
  ) -> impl Future<Output = Result<DataQualityReport, Self::Error>> + Send + '_;

  /// Profile the published detection marts.
  fn detection_quality(
    &self,
  ) -> impl Future<Output = Result<DetectionQualityReport, Self::Error>>
  + Send
  + '_;

  // ── Marts ─────────────────────────────────────────────────────────────

  /// Replace all mart tables in one transaction.
  ///
  /// The store re-runs its own consistency checks against the written rows
  /// before committing; on any violation the transaction is rolled back and
  /// the previously published marts remain visible.
  fn replace_marts<'a>(
    &'a self,
    marts: &'a Marts,
  ) -> impl Future<Output = Result<MartCounts, Self::Error>> + Send + 'a;

  fn mart_counts(
    &self,
  ) -> impl Future<Output = Result<MartCounts, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Object classes by detection count, highest first.
  fn top_objects(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<TopObject>, Self::Error>> + Send + '_;

  /// Channels by message count, highest first.
  fn top_channels(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<ChannelInfo>, Self::Error>> + Send + '_;

  /// Every channel, ordered by name.
  fn channel_list(
    &self,
  ) -> impl Future<Output = Result<Vec<ChannelInfo>, Self::Error>> + Send + '_;

  /// Daily activity for one channel on or after `since`, newest first.
  fn channel_activity<'a>(
    &'a self,
    channel_name: &'a str,
    since: NaiveDate,
  ) -> impl Future<Output = Result<Vec<ChannelActivity>, Self::Error>> + Send + 'a;

  /// `None` if the channel has no dimension row.
  fn channel_analytics<'a>(
    &'a self,
    channel_name: &'a str,
  ) -> impl Future<Output = Result<Option<ChannelAnalytics>, Self::Error>>
  + Send
  + 'a;

  /// Case-insensitive substring search over message text, ordered by
  /// engagement score then views, both descending.
  fn search_messages<'a>(
    &'a self,
    query: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<MessageHit>, Self::Error>> + Send + 'a;

  /// Daily engagement aggregates on or after `since`, newest first.
  fn engagement_metrics(
    &self,
    since: NaiveDate,
  ) -> impl Future<Output = Result<Vec<EngagementMetric>, Self::Error>> + Send + '_;

  /// Detections ordered by detection score then confidence, both descending.
  fn detections<'a>(
    &'a self,
    filter: &'a DetectionFilter,
  ) -> impl Future<Output = Result<Vec<DetectionDetail>, Self::Error>> + Send + 'a;

  fn summary(
    &self,
  ) -> impl Future<Output = Result<SummaryStats, Self::Error>> + Send + '_;

  /// Round-trip to the backend; used by health checks.
  fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
