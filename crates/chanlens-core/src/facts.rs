//! Fact builders: one row per message and one row per detected object.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{
  dimensions::{DimChannel, DimDate, detection_channel},
  keys::{channel_key, date_key, object_key},
  ladder::{
    CONTENT_LENGTH, ConfidenceLevel, ContentLengthCategory, INTERACTION,
    InteractionCategory, MessageType, REACH, ReachCategory, TIME_OF_DAY,
    TimeOfDay, VIRALITY, ViralityCategory,
  },
  lookup::detection_multiplier,
  math::{round_to, round2},
  staging::{StagedDetection, StagedMessage},
};

/// Weighted interactions per view, as a percentage.
///
/// Forwards weigh 3, replies 2 and the view itself 1. Zero views score 0.
pub fn engagement_score(views: i64, forwards: i64, replies: i64) -> f64 {
  if views == 0 {
    return 0.0;
  }
  // In f64 so counts near i64::MAX cannot overflow.
  let weighted = forwards as f64 * 3.0 + replies as f64 * 2.0 + views as f64;
  round2(weighted / views as f64 * 100.0)
}

/// `round(confidence × multiplier, 4)`.
pub fn detection_score(object_class: &str, confidence: f64) -> f64 {
  round_to(confidence * detection_multiplier(object_class), 4)
}

// ─── FactMessage ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactMessage {
  pub message_id:              i64,
  /// `None` when the channel has no dimension row.
  pub channel_key:             Option<String>,
  /// `None` when the day has no dimension row.
  pub date_key:                Option<String>,
  pub channel_name:            String,
  pub message_date:            NaiveDateTime,
  pub message_text:            String,
  pub message_length:          i64,
  pub word_count:              i64,
  pub view_count:              i64,
  pub forward_count:           i64,
  pub reply_count:             i64,
  pub has_media:               bool,
  pub message_type:            MessageType,
  pub is_empty_message:        bool,
  pub forward_rate:            f64,
  pub reply_rate:              f64,
  pub engagement_score:        f64,
  pub reach_category:          ReachCategory,
  pub virality_category:       ViralityCategory,
  pub interaction_category:    InteractionCategory,
  pub time_of_day:             TimeOfDay,
  pub content_length_category: ContentLengthCategory,
  pub has_no_engagement:       bool,
  pub is_engaging_content:     bool,
}

impl FactMessage {
  pub fn from_staged(
    m: &StagedMessage,
    channel_key: Option<String>,
    date_key: Option<String>,
  ) -> Self {
    let forward_rate = m.forward_rate();
    let reply_rate = m.reply_rate();
    Self {
      message_id: m.message_id,
      channel_key,
      date_key,
      channel_name: m.channel_name.clone(),
      message_date: m.message_date,
      message_text: m.message_text.clone(),
      message_length: m.message_length,
      word_count: m.word_count,
      view_count: m.view_count,
      forward_count: m.forward_count,
      reply_count: m.reply_count,
      has_media: m.has_media,
      message_type: m.message_type,
      is_empty_message: m.is_empty_message,
      forward_rate,
      reply_rate,
      engagement_score: engagement_score(
        m.view_count,
        m.forward_count,
        m.reply_count,
      ),
      reach_category: REACH.classify(m.view_count as f64),
      virality_category: VIRALITY.classify(forward_rate),
      interaction_category: INTERACTION.classify(m.reply_count as f64),
      time_of_day: TIME_OF_DAY.classify(f64::from(m.message_hour())),
      content_length_category: CONTENT_LENGTH
        .classify(m.message_length as f64),
      has_no_engagement: m.forward_count == 0 && m.reply_count == 0,
      is_engaging_content: forward_rate > 0.0 || reply_rate > 0.0,
    }
  }
}

/// Left join each staged message to the channel and date dimensions.
pub fn build_fct_messages(
  messages: &[StagedMessage],
  channels: &[DimChannel],
  dates: &[DimDate],
) -> Vec<FactMessage> {
  let channel_keys: HashSet<&str> =
    channels.iter().map(|c| c.channel_key.as_str()).collect();
  let date_keys: HashSet<&str> =
    dates.iter().map(|d| d.date_key.as_str()).collect();

  messages
    .iter()
    .map(|m| {
      let ck = channel_key(&m.channel_name);
      let dk = date_key(m.message_day());
      FactMessage::from_staged(
        m,
        channel_keys.contains(ck.as_str()).then_some(ck),
        date_keys.contains(dk.as_str()).then_some(dk),
      )
    })
    .collect()
}

// ─── FactImageDetection ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactImageDetection {
  pub detection_id:     i64,
  pub message_id:       i64,
  pub channel_key:      Option<String>,
  pub date_key:         Option<String>,
  pub object_key:       String,
  pub object_class:     String,
  pub confidence_score: f64,
  pub confidence_level: ConfidenceLevel,
  pub detection_score:  f64,
  pub bbox_x1:          f64,
  pub bbox_y1:          f64,
  pub bbox_x2:          f64,
  pub bbox_y2:          f64,
  pub bbox_area:        f64,
  pub bbox_center_x:    f64,
  pub bbox_center_y:    f64,
  pub image_path:       Option<String>,
  pub image_hash:       Option<String>,
  pub model_version:    String,
  pub detection_date:   Option<NaiveDateTime>,
  /// Inherited from the message fact; `None` when the message is absent.
  pub message_date:     Option<NaiveDateTime>,
  /// Inherited from the message fact; `None` when the message is absent.
  pub engagement_score: Option<f64>,
}

pub fn build_fct_image_detections(
  detections: &[StagedDetection],
  fct_messages: &[FactMessage],
  messages: &[StagedMessage],
  channels: &[DimChannel],
  dates: &[DimDate],
) -> Vec<FactImageDetection> {
  let facts_by_id: HashMap<i64, &FactMessage> =
    fct_messages.iter().map(|f| (f.message_id, f)).collect();
  let messages_by_id: HashMap<i64, &StagedMessage> =
    messages.iter().map(|m| (m.message_id, m)).collect();
  let channel_keys: HashSet<&str> =
    channels.iter().map(|c| c.channel_key.as_str()).collect();
  let date_keys: HashSet<&str> =
    dates.iter().map(|d| d.date_key.as_str()).collect();

  detections
    .iter()
    .map(|d| {
      let fact = facts_by_id.get(&d.message_id);
      let ck = detection_channel(d, &messages_by_id)
        .map(channel_key)
        .filter(|k| channel_keys.contains(k.as_str()));
      let dk = fact
        .map(|f| date_key(f.message_date.date()))
        .filter(|k| date_keys.contains(k.as_str()));

      FactImageDetection {
        detection_id:     d.detection_id,
        message_id:       d.message_id,
        channel_key:      ck,
        date_key:         dk,
        object_key:       object_key(&d.object_class),
        object_class:     d.object_class.clone(),
        confidence_score: d.confidence_score,
        confidence_level: d.confidence_level,
        detection_score:  detection_score(&d.object_class, d.confidence_score),
        bbox_x1:          d.bbox_x1,
        bbox_y1:          d.bbox_y1,
        bbox_x2:          d.bbox_x2,
        bbox_y2:          d.bbox_y2,
        bbox_area:        d.bbox_area,
        bbox_center_x:    d.bbox_center_x,
        bbox_center_y:    d.bbox_center_y,
        image_path:       d.image_path.clone(),
        image_hash:       d.image_hash.clone(),
        model_version:    d.model_version.clone(),
        detection_date:   d.detection_date,
        message_date:     fact.map(|f| f.message_date),
        engagement_score: fact.map(|f| f.engagement_score),
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    dimensions::{build_dim_channels, build_dim_dates},
    raw::{RawDetection, RawMessage},
    staging::{stage_detection, stage_message},
  };

  fn msg(id: i64, date: &str, views: i64, forwards: i64, replies: i64) -> StagedMessage {
    stage_message(RawMessage {
      id: Some(id),
      channel: Some("CheMed123".into()),
      date: Some(date.into()),
      text: Some("Paracetamol in stock now".into()),
      views: Some(views),
      forwards: Some(forwards),
      replies: Some(replies),
      has_media: Some(false),
      scraped_at: None,
    })
    .unwrap()
  }

  fn det(id: i64, message_id: i64, class: &str, confidence: f64) -> StagedDetection {
    stage_detection(RawDetection {
      id: Some(id),
      message_id: Some(message_id),
      detected_object_class: Some(class.into()),
      confidence_score: Some(confidence),
      ..Default::default()
    })
    .unwrap()
  }

  #[test]
  fn engagement_score_weights() {
    assert_eq!(engagement_score(100, 5, 2), 119.0);
    assert_eq!(engagement_score(0, 5, 2), 0.0);
    assert_eq!(engagement_score(3, 0, 0), 100.0);
    assert_eq!(engagement_score(3, 1, 0), 200.0);
  }

  #[test]
  fn engagement_score_near_i64_max() {
    let huge = i64::MAX / 2;
    assert_eq!(engagement_score(huge, huge, 0), 400.0);
    assert!(engagement_score(1, i64::MAX, i64::MAX).is_finite());
  }

  #[test]
  fn detection_score_applies_multiplier() {
    assert_eq!(detection_score("person", 0.9), 1.08);
    assert_eq!(detection_score("bottle", 0.5), 0.55);
    assert_eq!(detection_score("dog", 0.4321), 0.4321);
  }

  #[test]
  fn message_fact_derivations() {
    let messages = vec![msg(1, "2025-07-10 19:30:00", 100, 5, 2)];
    let channels = build_dim_channels(&messages);
    let dates = build_dim_dates(&messages);
    let facts = build_fct_messages(&messages, &channels, &dates);

    let f = &facts[0];
    assert_eq!(f.channel_key.as_deref(), Some(channels[0].channel_key.as_str()));
    assert_eq!(f.date_key.as_deref(), Some(dates[0].date_key.as_str()));
    assert_eq!(f.forward_rate, 5.0);
    assert_eq!(f.reply_rate, 2.0);
    assert_eq!(f.engagement_score, 119.0);
    assert_eq!(f.reach_category, ReachCategory::LowReach);
    assert_eq!(f.virality_category, ViralityCategory::HighVirality);
    assert_eq!(f.interaction_category, InteractionCategory::LowInteraction);
    assert_eq!(f.time_of_day, TimeOfDay::Evening);
    assert_eq!(f.content_length_category, ContentLengthCategory::Short);
    assert!(f.is_engaging_content);
    assert!(!f.has_no_engagement);
  }

  #[test]
  fn quality_flags_are_exclusive() {
    let messages = vec![
      msg(1, "2025-07-10 03:00:00", 0, 0, 0),
      msg(2, "2025-07-10 03:00:00", 0, 4, 1),
      msg(3, "2025-07-10 03:00:00", 10, 0, 0),
    ];
    let facts = build_fct_messages(&messages, &[], &[]);
    for f in &facts {
      assert!(!(f.has_no_engagement && f.is_engaging_content));
      if f.is_engaging_content {
        assert!(f.view_count > 0);
      }
    }
    // Forwards without views: neither flag.
    assert!(!facts[1].has_no_engagement);
    assert!(!facts[1].is_engaging_content);
    assert_eq!(facts[1].time_of_day, TimeOfDay::Night);
  }

  #[test]
  fn missing_dimension_rows_leave_keys_empty() {
    let messages = vec![msg(1, "2025-07-10 09:00:00", 1, 0, 0)];
    let facts = build_fct_messages(&messages, &[], &[]);
    assert_eq!(facts[0].channel_key, None);
    assert_eq!(facts[0].date_key, None);
  }

  #[test]
  fn detection_fact_inherits_from_message() {
    let messages = vec![msg(1, "2025-07-10 09:00:00", 100, 5, 2)];
    let channels = build_dim_channels(&messages);
    let dates = build_dim_dates(&messages);
    let facts = build_fct_messages(&messages, &channels, &dates);
    let detections = vec![det(7, 1, "person", 0.9), det(8, 404, "cup", 0.5)];

    let rows =
      build_fct_image_detections(&detections, &facts, &messages, &channels, &dates);

    let joined = &rows[0];
    assert_eq!(joined.detection_score, 1.08);
    assert_eq!(joined.engagement_score, Some(119.0));
    assert_eq!(joined.message_date, Some(messages[0].message_date));
    assert_eq!(joined.channel_key.as_deref(), Some(channels[0].channel_key.as_str()));
    assert_eq!(joined.date_key.as_deref(), Some(dates[0].date_key.as_str()));

    let orphan = &rows[1];
    assert_eq!(orphan.engagement_score, None);
    assert_eq!(orphan.message_date, None);
    assert_eq!(orphan.channel_key, None);
    assert_eq!(orphan.date_key, None);
    assert_eq!(orphan.detection_score, 0.55);
  }
}
