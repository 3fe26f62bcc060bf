//! Encoding and decoding helpers between chanlens types and the plain-text
//! representations stored in SQLite columns.
//!
//! Days are stored as `YYYY-MM-DD` and timestamps as
//! `YYYY-MM-DD HH:MM:SS[.fraction]` so that string order is time order and
//! SQLite's date functions accept them. Labels are stored as their
//! snake_case names.

use chanlens_core::{
  ladder::{
    ActivityLevel, ConfidenceLevel, FrequencyCategory, ObjectCategory,
    ReachCategory,
  },
  math::{round_to, round2},
  warehouse::{
    CategoryCount, ChannelActivity, ChannelInfo, DetectionDetail,
    DetectionQualityReport, EngagementMetric, MessageHit, TopObject,
  },
};
use chrono::{NaiveDate, NaiveDateTime};

use crate::{Error, Result};

const DAY_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_day(day: NaiveDate) -> String { day.format(DAY_FORMAT).to_string() }

pub fn decode_day(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DAY_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── NaiveDateTime ───────────────────────────────────────────────────────────

pub fn encode_ts(ts: NaiveDateTime) -> String {
  ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn decode_ts(s: &str) -> Result<NaiveDateTime> {
  NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_opt_ts(s: Option<String>) -> Result<Option<NaiveDateTime>> {
  s.as_deref().map(decode_ts).transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────
//
// Read straight off a `rusqlite::Row` inside the connection thread, then
// decoded into read models on the async side.

pub struct RawTopObject {
  pub object_class:         String,
  pub object_category:      String,
  pub total_detections:     i64,
  pub messages_with_object: i64,
  pub channels_with_object: i64,
  pub avg_confidence:       f64,
  pub frequency_category:   String,
  pub importance_score:     f64,
}

impl RawTopObject {
  pub fn into_top_object(self) -> Result<TopObject> {
    Ok(TopObject {
      object_class:         self.object_class,
      object_category:      ObjectCategory::parse(&self.object_category)?,
      total_detections:     self.total_detections,
      messages_with_object: self.messages_with_object,
      channels_with_object: self.channels_with_object,
      avg_confidence:       self.avg_confidence,
      frequency_category:   FrequencyCategory::parse(&self.frequency_category)?,
      importance_score:     self.importance_score,
    })
  }
}

pub struct RawChannelInfo {
  pub channel_name:           String,
  pub total_messages:         i64,
  pub avg_views_per_message:  f64,
  pub overall_forward_rate:   f64,
  pub channel_activity_level: String,
}

impl RawChannelInfo {
  pub fn into_channel_info(self) -> Result<ChannelInfo> {
    Ok(ChannelInfo {
      channel_name:           self.channel_name,
      total_messages:         self.total_messages,
      avg_views_per_message:  self.avg_views_per_message,
      overall_forward_rate:   self.overall_forward_rate,
      channel_activity_level: ActivityLevel::parse(&self.channel_activity_level)?,
    })
  }
}

pub struct RawChannelActivity {
  pub channel_name:         String,
  pub date:                 String,
  pub message_count:        i64,
  pub total_views:          i64,
  pub total_forwards:       i64,
  pub avg_engagement_score: f64,
}

impl RawChannelActivity {
  pub fn into_activity(self) -> Result<ChannelActivity> {
    Ok(ChannelActivity {
      channel_name:         self.channel_name,
      date:                 decode_day(&self.date)?,
      message_count:        self.message_count,
      total_views:          self.total_views,
      total_forwards:       self.total_forwards,
      avg_engagement_score: round2(self.avg_engagement_score),
    })
  }
}

pub struct RawMessageHit {
  pub message_id:       i64,
  pub channel_name:     String,
  pub message_date:     String,
  pub view_count:       i64,
  pub forward_count:    i64,
  pub reply_count:      i64,
  pub engagement_score: f64,
  pub reach_category:   String,
  pub message_text:     String,
  pub has_media:        bool,
}

impl RawMessageHit {
  pub fn into_hit(self) -> Result<MessageHit> {
    Ok(MessageHit {
      message_id:       self.message_id,
      channel_name:     self.channel_name,
      message_date:     decode_ts(&self.message_date)?,
      view_count:       self.view_count,
      forward_count:    self.forward_count,
      reply_count:      self.reply_count,
      engagement_score: self.engagement_score,
      reach_category:   ReachCategory::parse(&self.reach_category)?,
      message_text:     Some(self.message_text).filter(|t| !t.is_empty()),
      has_media:        self.has_media,
    })
  }
}

pub struct RawEngagementMetric {
  pub date:                     String,
  pub total_messages:           i64,
  pub total_views:              i64,
  pub total_forwards:           i64,
  pub total_replies:            i64,
  pub avg_engagement_score:     f64,
  pub high_engagement_messages: i64,
}

impl RawEngagementMetric {
  pub fn into_metric(self) -> Result<EngagementMetric> {
    Ok(EngagementMetric {
      date:                     decode_day(&self.date)?,
      total_messages:           self.total_messages,
      total_views:              self.total_views,
      total_forwards:           self.total_forwards,
      total_replies:            self.total_replies,
      avg_engagement_score:     round2(self.avg_engagement_score),
      high_engagement_messages: self.high_engagement_messages,
    })
  }
}

pub struct RawDetectionDetail {
  pub detection_id:     i64,
  pub message_id:       i64,
  pub channel_name:     Option<String>,
  pub object_class:     String,
  pub confidence_score: f64,
  pub confidence_level: String,
  pub bbox_area:        f64,
  pub detection_score:  f64,
  pub detection_date:   Option<String>,
  pub message_date:     Option<String>,
  pub engagement_score: Option<f64>,
}

impl RawDetectionDetail {
  pub fn into_detail(self) -> Result<DetectionDetail> {
    Ok(DetectionDetail {
      detection_id:     self.detection_id,
      message_id:       self.message_id,
      channel_name:     self.channel_name,
      object_class:     self.object_class,
      confidence_score: self.confidence_score,
      confidence_level: ConfidenceLevel::parse(&self.confidence_level)?,
      bbox_area:        self.bbox_area,
      detection_score:  self.detection_score,
      detection_date:   decode_opt_ts(self.detection_date)?,
      message_date:     decode_opt_ts(self.message_date)?,
      engagement_score: self.engagement_score,
    })
  }
}

pub struct RawDetectionQuality {
  pub total:      i64,
  pub high:       i64,
  pub medium:     i64,
  pub low:        i64,
  pub orphaned:   i64,
  pub avg_score:  Option<f64>,
  pub categories: Vec<(String, i64)>,
}

impl RawDetectionQuality {
  pub fn into_report(self) -> Result<DetectionQualityReport> {
    let category_distribution = self
      .categories
      .into_iter()
      .map(|(category, classes)| {
        Ok(CategoryCount {
          object_category: ObjectCategory::parse(&category)?,
          classes,
        })
      })
      .collect::<Result<Vec<_>>>()?;
    Ok(DetectionQualityReport {
      total_detections: self.total,
      high_confidence: self.high,
      medium_confidence: self.medium,
      low_confidence: self.low,
      orphaned_detections: self.orphaned,
      category_distribution,
      avg_detection_score: self.avg_score.map(|v| round_to(v, 4)),
      quality_score: DetectionQualityReport::score(
        self.total,
        self.high,
        self.orphaned,
        self.avg_score,
      ),
    })
  }
}
