//! Staging normalizer: raw scraped rows → typed, de-nulled records.
//!
//! Rows missing a required field are excluded rather than failing the run;
//! partial scraped data is expected. Nullable counts default to zero.

use std::{
  collections::{BTreeMap, btree_map::Entry},
  sync::LazyLock,
};

use chrono::{NaiveDate, NaiveDateTime, Timelike as _};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
  ladder::{CONFIDENCE, ConfidenceLevel, MessageType},
  math::rate,
  raw::{RawDetection, RawMessage, parse_timestamp},
};

/// Messages longer than this many characters are classified `long_text`.
pub const LONG_TEXT_THRESHOLD: i64 = 500;

pub const DEFAULT_MODEL_VERSION: &str = "yolov8n";

static URL_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)https?://|www\.").expect("valid regex"));
static MENTION_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"@\w+").expect("valid regex"));
static HASHTAG_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"#\w+").expect("valid regex"));

// ─── StagedMessage ───────────────────────────────────────────────────────────

/// One cleaned message.
///
/// Rates are not stored: they are always derived from the counts, see
/// [`StagedMessage::forward_rate`] and [`StagedMessage::reply_rate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedMessage {
  pub message_id:       i64,
  pub channel_name:     String,
  pub message_date:     NaiveDateTime,
  pub message_text:     String,
  pub view_count:       i64,
  pub forward_count:    i64,
  pub reply_count:      i64,
  pub has_media:        bool,
  pub message_length:   i64,
  pub word_count:       i64,
  pub message_type:     MessageType,
  pub is_empty_message: bool,
  pub scraped_at:       Option<NaiveDateTime>,
}

impl StagedMessage {
  pub fn message_day(&self) -> NaiveDate { self.message_date.date() }

  pub fn message_hour(&self) -> u32 { self.message_date.hour() }

  pub fn forward_rate(&self) -> f64 { rate(self.forward_count, self.view_count) }

  pub fn reply_rate(&self) -> f64 { rate(self.reply_count, self.view_count) }
}

/// Classify message content. Rules are checked in a fixed order and the first
/// match wins: link, mention, hashtag, media, long text, regular.
pub fn classify_message(text: &str, has_media: bool) -> MessageType {
  if URL_RE.is_match(text) {
    MessageType::Link
  } else if MENTION_RE.is_match(text) {
    MessageType::Mention
  } else if HASHTAG_RE.is_match(text) {
    MessageType::Hashtag
  } else if has_media {
    MessageType::Media
  } else if text.chars().count() as i64 > LONG_TEXT_THRESHOLD {
    MessageType::LongText
  } else {
    MessageType::Regular
  }
}

/// Stage one raw message; `None` when id, channel or timestamp is missing.
pub fn stage_message(raw: RawMessage) -> Option<StagedMessage> {
  let message_id = raw.id?;
  let channel_name = raw
    .channel
    .map(|c| c.trim().to_owned())
    .filter(|c| !c.is_empty())?;
  let message_date = raw.date.as_deref().and_then(parse_timestamp)?;

  let message_text = raw.text.unwrap_or_default();
  let has_media = raw.has_media.unwrap_or(false);

  Some(StagedMessage {
    message_id,
    channel_name,
    message_date,
    view_count: raw.views.unwrap_or(0).max(0),
    forward_count: raw.forwards.unwrap_or(0).max(0),
    reply_count: raw.replies.unwrap_or(0).max(0),
    has_media,
    message_length: message_text.chars().count() as i64,
    word_count: message_text.split_whitespace().count() as i64,
    message_type: classify_message(&message_text, has_media),
    is_empty_message: message_text.trim().is_empty(),
    scraped_at: raw.scraped_at.as_deref().and_then(parse_timestamp),
    message_text,
  })
}

// ─── StagedDetection ─────────────────────────────────────────────────────────

/// One detected object instance, cleaned and with derived geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedDetection {
  pub detection_id:     i64,
  pub image_path:       Option<String>,
  pub image_hash:       Option<String>,
  pub message_id:       i64,
  pub channel_name:     Option<String>,
  /// Trimmed and lower-cased.
  pub object_class:     String,
  /// Clamped to `[0, 1]`.
  pub confidence_score: f64,
  pub confidence_level: ConfidenceLevel,
  pub bbox_x1:          f64,
  pub bbox_y1:          f64,
  pub bbox_x2:          f64,
  pub bbox_y2:          f64,
  pub bbox_area:        f64,
  pub bbox_center_x:    f64,
  pub bbox_center_y:    f64,
  pub detection_date:   Option<NaiveDateTime>,
  pub model_version:    String,
}

/// Stage one raw detection; `None` when id, message id, class or confidence
/// is missing.
pub fn stage_detection(raw: RawDetection) -> Option<StagedDetection> {
  let detection_id = raw.id?;
  let message_id = raw.message_id?;
  let object_class = raw
    .detected_object_class
    .map(|c| c.trim().to_lowercase())
    .filter(|c| !c.is_empty())?;
  let confidence_score = raw.confidence_score.filter(|c| c.is_finite())?.clamp(0.0, 1.0);

  let x1 = raw.bbox_x1.unwrap_or(0.0);
  let y1 = raw.bbox_y1.unwrap_or(0.0);
  let x2 = raw.bbox_x2.unwrap_or(0.0);
  let y2 = raw.bbox_y2.unwrap_or(0.0);

  Some(StagedDetection {
    detection_id,
    image_path: raw.image_path,
    image_hash: raw.image_hash,
    message_id,
    channel_name: raw
      .channel_name
      .map(|c| c.trim().to_owned())
      .filter(|c| !c.is_empty()),
    object_class,
    confidence_score,
    confidence_level: CONFIDENCE.classify(confidence_score),
    bbox_x1: x1,
    bbox_y1: y1,
    bbox_x2: x2,
    bbox_y2: y2,
    bbox_area: (x2 - x1).abs() * (y2 - y1).abs(),
    bbox_center_x: (x1 + x2) / 2.0,
    bbox_center_y: (y1 + y2) / 2.0,
    detection_date: raw.detection_date.as_deref().and_then(parse_timestamp),
    model_version: raw
      .model_version
      .filter(|v| !v.trim().is_empty())
      .unwrap_or_else(|| DEFAULT_MODEL_VERSION.to_owned()),
  })
}

// ─── Batch staging ───────────────────────────────────────────────────────────

/// Row accounting for one staging pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingReport {
  pub accepted:   usize,
  pub rejected:   usize,
  pub duplicates: usize,
}

/// Stage every message and deduplicate by message id.
///
/// Of two rows with the same id, the one with the later `scraped_at` wins;
/// a missing `scraped_at` sorts before any present one and later input
/// position breaks ties. Output is ordered by message id.
pub fn stage_messages(
  raws: impl IntoIterator<Item = RawMessage>,
) -> (Vec<StagedMessage>, StagingReport) {
  let mut report = StagingReport::default();
  let mut by_id: BTreeMap<i64, StagedMessage> = BTreeMap::new();

  for raw in raws {
    let Some(staged) = stage_message(raw) else {
      report.rejected += 1;
      continue;
    };
    match by_id.entry(staged.message_id) {
      Entry::Vacant(slot) => {
        slot.insert(staged);
      }
      Entry::Occupied(mut slot) => {
        report.duplicates += 1;
        if staged.scraped_at >= slot.get().scraped_at {
          slot.insert(staged);
        }
      }
    }
  }

  report.accepted = by_id.len();
  tracing::debug!(
    accepted = report.accepted,
    rejected = report.rejected,
    duplicates = report.duplicates,
    "staged messages"
  );
  (by_id.into_values().collect(), report)
}

/// Stage every detection and deduplicate by detection id (first row wins).
/// Output is ordered by detection id.
pub fn stage_detections(
  raws: impl IntoIterator<Item = RawDetection>,
) -> (Vec<StagedDetection>, StagingReport) {
  let mut report = StagingReport::default();
  let mut by_id: BTreeMap<i64, StagedDetection> = BTreeMap::new();

  for raw in raws {
    let Some(staged) = stage_detection(raw) else {
      report.rejected += 1;
      continue;
    };
    match by_id.entry(staged.detection_id) {
      Entry::Vacant(slot) => {
        slot.insert(staged);
      }
      Entry::Occupied(_) => report.duplicates += 1,
    }
  }

  report.accepted = by_id.len();
  tracing::debug!(
    accepted = report.accepted,
    rejected = report.rejected,
    duplicates = report.duplicates,
    "staged detections"
  );
  (by_id.into_values().collect(), report)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn raw(id: i64, channel: &str, date: &str, text: &str) -> RawMessage {
    RawMessage {
      id:         Some(id),
      channel:    Some(channel.into()),
      date:       Some(date.into()),
      text:       Some(text.into()),
      views:      Some(100),
      forwards:   Some(5),
      replies:    Some(2),
      has_media:  Some(false),
      scraped_at: None,
    }
  }

  // ── Classification ──────────────────────────────────────────────────────

  #[test]
  fn classification_precedence_is_first_match() {
    // A link that also mentions and tags is still a link.
    assert_eq!(
      classify_message("see https://x.io @pharma #sale", true),
      MessageType::Link
    );
    assert_eq!(classify_message("ask @pharma about #sale", true), MessageType::Mention);
    assert_eq!(classify_message("big #sale today", true), MessageType::Hashtag);
    assert_eq!(classify_message("photo attached", true), MessageType::Media);
    assert_eq!(classify_message(&"a".repeat(501), false), MessageType::LongText);
    assert_eq!(classify_message(&"a".repeat(500), false), MessageType::Regular);
    assert_eq!(classify_message("hello", false), MessageType::Regular);
  }

  #[test]
  fn www_without_scheme_is_a_link() {
    assert_eq!(classify_message("visit WWW.example.com", false), MessageType::Link);
  }

  #[test]
  fn long_text_counts_characters_not_bytes() {
    // 300 two-byte characters: 600 bytes but only 300 chars.
    assert_eq!(classify_message(&"é".repeat(300), false), MessageType::Regular);
  }

  // ── Messages ────────────────────────────────────────────────────────────

  #[test]
  fn stage_message_derives_fields() {
    let staged =
      stage_message(raw(7, " CheMed123 ", "2025-07-14T10:20:30+00:00", "Paracetamol in stock now"))
        .unwrap();
    assert_eq!(staged.channel_name, "CheMed123");
    assert_eq!(staged.message_length, 24);
    assert_eq!(staged.word_count, 4);
    assert_eq!(staged.forward_rate(), 5.0);
    assert_eq!(staged.reply_rate(), 2.0);
    assert_eq!(staged.message_hour(), 10);
    assert_eq!(staged.message_type, MessageType::Regular);
    assert!(!staged.is_empty_message);
  }

  #[test]
  fn nulls_default_to_zero_and_empty() {
    let staged = stage_message(RawMessage {
      id: Some(1),
      channel: Some("c".into()),
      date: Some("2025-07-14 08:00:00".into()),
      ..Default::default()
    })
    .unwrap();
    assert_eq!(staged.view_count, 0);
    assert_eq!(staged.forward_count, 0);
    assert_eq!(staged.reply_count, 0);
    assert_eq!(staged.message_text, "");
    assert!(staged.is_empty_message);
    assert!(!staged.has_media);
    assert_eq!(staged.forward_rate(), 0.0);
  }

  #[test]
  fn negative_counts_are_clamped() {
    let mut r = raw(1, "c", "2025-07-14 08:00:00", "x");
    r.views = Some(-4);
    assert_eq!(stage_message(r).unwrap().view_count, 0);
  }

  #[test]
  fn rows_missing_required_fields_are_rejected() {
    let mut no_id = raw(1, "c", "2025-07-14 08:00:00", "x");
    no_id.id = None;
    let mut no_channel = raw(1, "c", "2025-07-14 08:00:00", "x");
    no_channel.channel = Some("   ".into());
    let mut no_date = raw(1, "c", "2025-07-14 08:00:00", "x");
    no_date.date = None;
    let bad_date = raw(1, "c", "not a date", "x");

    assert!(stage_message(no_id).is_none());
    assert!(stage_message(no_channel).is_none());
    assert!(stage_message(no_date).is_none());
    assert!(stage_message(bad_date).is_none());
  }

  #[test]
  fn duplicates_keep_the_latest_scrape() {
    let mut first = raw(1, "c", "2025-07-14 08:00:00", "old");
    first.scraped_at = Some("2025-07-15 00:00:00".into());
    let mut second = raw(1, "c", "2025-07-14 08:00:00", "new");
    second.scraped_at = Some("2025-07-16 00:00:00".into());
    let mut stale = raw(1, "c", "2025-07-14 08:00:00", "stale");
    stale.scraped_at = Some("2025-07-14 09:00:00".into());

    let (staged, report) = stage_messages([first, second, stale, raw(0, "c", "bad", "")]);
    assert_eq!(staged.len(), 1);
    assert_eq!(staged[0].message_text, "new");
    assert_eq!(report, StagingReport { accepted: 1, rejected: 1, duplicates: 2 });
  }

  #[test]
  fn staged_messages_are_sorted_by_id() {
    let (staged, _) = stage_messages([
      raw(3, "c", "2025-07-14 08:00:00", ""),
      raw(1, "c", "2025-07-14 08:00:00", ""),
      raw(2, "c", "2025-07-14 08:00:00", ""),
    ]);
    let ids: Vec<_> = staged.iter().map(|m| m.message_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
  }

  // ── Detections ──────────────────────────────────────────────────────────

  fn detection(id: i64, class: &str, confidence: f64) -> RawDetection {
    RawDetection {
      id: Some(id),
      message_id: Some(10),
      detected_object_class: Some(class.into()),
      confidence_score: Some(confidence),
      bbox_x1: Some(10.0),
      bbox_y1: Some(20.0),
      bbox_x2: Some(30.0),
      bbox_y2: Some(60.0),
      ..Default::default()
    }
  }

  #[test]
  fn stage_detection_derives_geometry_and_level() {
    let d = stage_detection(detection(1, " Person ", 0.9)).unwrap();
    assert_eq!(d.object_class, "person");
    assert_eq!(d.bbox_area, 800.0);
    assert_eq!(d.bbox_center_x, 20.0);
    assert_eq!(d.bbox_center_y, 40.0);
    assert_eq!(d.confidence_level, ConfidenceLevel::High);
    assert_eq!(d.model_version, DEFAULT_MODEL_VERSION);
  }

  #[test]
  fn detection_without_message_id_is_rejected() {
    let mut d = detection(1, "person", 0.9);
    d.message_id = None;
    assert!(stage_detection(d).is_none());
    let mut d = detection(1, "", 0.9);
    d.message_id = Some(1);
    assert!(stage_detection(d).is_none());
  }

  #[test]
  fn confidence_is_clamped() {
    assert_eq!(stage_detection(detection(1, "cup", 1.7)).unwrap().confidence_score, 1.0);
    assert!(stage_detection(detection(1, "cup", f64::NAN)).is_none());
  }

  #[test]
  fn duplicate_detections_keep_the_first() {
    let (staged, report) =
      stage_detections([detection(2, "cup", 0.6), detection(1, "dog", 0.4), detection(2, "car", 0.9)]);
    assert_eq!(staged.len(), 2);
    assert_eq!(staged[0].detection_id, 1);
    assert_eq!(staged[1].object_class, "cup");
    assert_eq!(report.duplicates, 1);
  }
}
