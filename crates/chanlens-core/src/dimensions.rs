//! Dimension builders: channel, date and object dimensions.
//!
//! Channel and object dimensions group staged records by their natural key,
//! aggregate, then bucket the aggregates through the ladders in
//! [`crate::ladder`]. The date dimension is a spine: one row for every
//! calendar day between the first and last message, including days with no
//! messages.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike as _, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
  keys::{channel_key, date_key, object_key},
  ladder::{
    ACTIVITY, ActivityLevel, ConfidenceLevel, FREQUENCY, FrequencyCategory,
    ObjectCategory, REACH, ReachCategory,
  },
  lookup::ObjectCategories,
  math::{mean, rate, round_to, round2},
  staging::{StagedDetection, StagedMessage},
};

// ─── DimChannel ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimChannel {
  pub channel_key:              String,
  pub channel_name:             String,
  pub total_messages:           i64,
  pub total_views:              i64,
  pub total_forwards:           i64,
  pub total_replies:            i64,
  pub avg_views_per_message:    f64,
  pub avg_forwards_per_message: f64,
  pub avg_replies_per_message:  f64,
  /// `total_forwards / total_views × 100`, 0 when the channel has no views.
  pub overall_forward_rate:     f64,
  pub first_message_date:       NaiveDate,
  pub last_message_date:        NaiveDate,
  /// Inclusive span in days between first and last message.
  pub active_days:              i64,
  pub media_message_pct:        f64,
  pub empty_message_pct:        f64,
  pub channel_activity_level:   ActivityLevel,
  pub channel_reach_category:   ReachCategory,
}

#[derive(Default)]
struct ChannelAcc {
  messages: i64,
  views:    i64,
  forwards: i64,
  replies:  i64,
  media:    i64,
  empty:    i64,
  first:    Option<NaiveDate>,
  last:     Option<NaiveDate>,
}

pub fn build_dim_channels(messages: &[StagedMessage]) -> Vec<DimChannel> {
  let mut groups: BTreeMap<&str, ChannelAcc> = BTreeMap::new();
  for m in messages {
    let acc = groups.entry(m.channel_name.as_str()).or_default();
    let day = m.message_day();
    acc.messages += 1;
    acc.views = acc.views.saturating_add(m.view_count);
    acc.forwards = acc.forwards.saturating_add(m.forward_count);
    acc.replies = acc.replies.saturating_add(m.reply_count);
    acc.media += i64::from(m.has_media);
    acc.empty += i64::from(m.is_empty_message);
    acc.first = Some(acc.first.map_or(day, |d| d.min(day)));
    acc.last = Some(acc.last.map_or(day, |d| d.max(day)));
  }

  groups
    .into_iter()
    .filter_map(|(name, acc)| {
      let first = acc.first?;
      let last = acc.last?;
      let avg_views = mean(acc.views, acc.messages);
      Some(DimChannel {
        channel_key:              channel_key(name),
        channel_name:             name.to_owned(),
        total_messages:           acc.messages,
        total_views:              acc.views,
        total_forwards:           acc.forwards,
        total_replies:            acc.replies,
        avg_views_per_message:    avg_views,
        avg_forwards_per_message: mean(acc.forwards, acc.messages),
        avg_replies_per_message:  mean(acc.replies, acc.messages),
        overall_forward_rate:     rate(acc.forwards, acc.views),
        first_message_date:       first,
        last_message_date:        last,
        active_days:              (last - first).num_days() + 1,
        media_message_pct:        rate(acc.media, acc.messages),
        empty_message_pct:        rate(acc.empty, acc.messages),
        channel_activity_level:   ACTIVITY.classify(acc.messages as f64),
        channel_reach_category:   REACH.classify(avg_views),
      })
    })
    .collect()
}

// ─── DimDate ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimDate {
  pub date_key:     String,
  pub date_day:     NaiveDate,
  pub year:         i32,
  pub month:        u32,
  pub day_of_month: u32,
  pub quarter:      u32,
  /// ISO weekday, Monday = 1 … Sunday = 7.
  pub day_of_week:  u32,
  pub day_of_year:  u32,
  /// ISO week number.
  pub week_of_year: u32,
  pub month_name:   String,
  pub day_name:     String,
  /// `YYYY-MM`.
  pub year_month:   String,
  pub is_weekend:   bool,
  pub is_weekday:   bool,
}

impl DimDate {
  pub fn for_day(day: NaiveDate) -> Self {
    let day_of_week = day.weekday().number_from_monday();
    let is_weekend = day_of_week >= 6;
    Self {
      date_key: date_key(day),
      date_day: day,
      year: day.year(),
      month: day.month(),
      day_of_month: day.day(),
      quarter: (day.month() - 1) / 3 + 1,
      day_of_week,
      day_of_year: day.ordinal(),
      week_of_year: day.iso_week().week(),
      month_name: day.format("%B").to_string(),
      day_name: day.format("%A").to_string(),
      year_month: day.format("%Y-%m").to_string(),
      is_weekend,
      is_weekday: !is_weekend,
    }
  }
}

/// One row per day in `[min(message_date), max(message_date)]`.
pub fn build_dim_dates(messages: &[StagedMessage]) -> Vec<DimDate> {
  let Some(first) = messages.iter().map(StagedMessage::message_day).min() else {
    return Vec::new();
  };
  let last = messages
    .iter()
    .map(StagedMessage::message_day)
    .max()
    .unwrap_or(first);
  date_spine(first, last)
}

/// Every calendar day from `first` to `last`, inclusive.
pub fn date_spine(first: NaiveDate, last: NaiveDate) -> Vec<DimDate> {
  first
    .iter_days()
    .take_while(|d| *d <= last)
    .map(DimDate::for_day)
    .collect()
}

// ─── DimObject ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimObject {
  pub object_key:                 String,
  pub object_class:               String,
  pub object_category:            ObjectCategory,
  pub total_detections:           i64,
  pub messages_with_object:       i64,
  pub channels_with_object:       i64,
  pub avg_confidence:             f64,
  pub min_confidence:             f64,
  pub max_confidence:             f64,
  pub high_confidence_detections: i64,
  pub avg_bbox_area:              f64,
  /// `total_detections × avg_confidence`.
  pub importance_score:           f64,
  pub frequency_category:         FrequencyCategory,
}

#[derive(Default)]
struct ObjectAcc<'a> {
  count:           i64,
  confidence_sum:  f64,
  min_confidence:  f64,
  max_confidence:  f64,
  high_confidence: i64,
  area_sum:        f64,
  messages:        BTreeSet<i64>,
  channels:        BTreeSet<&'a str>,
}

/// Resolve a detection's channel: its own, else its message's.
pub(crate) fn detection_channel<'a>(
  detection: &'a StagedDetection,
  messages_by_id: &HashMap<i64, &'a StagedMessage>,
) -> Option<&'a str> {
  detection.channel_name.as_deref().or_else(|| {
    messages_by_id
      .get(&detection.message_id)
      .map(|m| m.channel_name.as_str())
  })
}

pub fn build_dim_objects(
  detections: &[StagedDetection],
  messages: &[StagedMessage],
  categories: &ObjectCategories,
) -> Vec<DimObject> {
  let messages_by_id: HashMap<i64, &StagedMessage> =
    messages.iter().map(|m| (m.message_id, m)).collect();

  let mut groups: BTreeMap<&str, ObjectAcc<'_>> = BTreeMap::new();
  for d in detections {
    let acc = groups.entry(d.object_class.as_str()).or_default();
    if acc.count == 0 {
      acc.min_confidence = d.confidence_score;
      acc.max_confidence = d.confidence_score;
    }
    acc.count += 1;
    acc.confidence_sum += d.confidence_score;
    acc.min_confidence = acc.min_confidence.min(d.confidence_score);
    acc.max_confidence = acc.max_confidence.max(d.confidence_score);
    acc.high_confidence += i64::from(d.confidence_level == ConfidenceLevel::High);
    acc.area_sum += d.bbox_area;
    acc.messages.insert(d.message_id);
    if let Some(channel) = detection_channel(d, &messages_by_id) {
      acc.channels.insert(channel);
    }
  }

  groups
    .into_iter()
    .map(|(class, acc)| {
      let avg_confidence = round_to(acc.confidence_sum / acc.count as f64, 4);
      DimObject {
        object_key:                 object_key(class),
        object_class:               class.to_owned(),
        object_category:            categories.category(class),
        total_detections:           acc.count,
        messages_with_object:       acc.messages.len() as i64,
        channels_with_object:       acc.channels.len() as i64,
        avg_confidence,
        min_confidence:             acc.min_confidence,
        max_confidence:             acc.max_confidence,
        high_confidence_detections: acc.high_confidence,
        avg_bbox_area:              round2(acc.area_sum / acc.count as f64),
        importance_score:           round2(acc.count as f64 * avg_confidence),
        frequency_category:         FREQUENCY.classify(acc.count as f64),
      }
    })
    .collect()
}
