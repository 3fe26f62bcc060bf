//! Raw records as delivered by the external loader and detector.
//!
//! Every field is optional: partial scraped data is expected, and rejecting
//! incomplete rows is the staging normalizer's job, not the loader's.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One scraped Telegram message, exactly as the scraper emitted it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
  #[serde(default)]
  pub id:         Option<i64>,
  #[serde(default)]
  pub channel:    Option<String>,
  /// Message timestamp; see [`parse_timestamp`] for accepted forms.
  #[serde(default)]
  pub date:       Option<String>,
  #[serde(default)]
  pub text:       Option<String>,
  #[serde(default)]
  pub views:      Option<i64>,
  #[serde(default)]
  pub forwards:   Option<i64>,
  #[serde(default)]
  pub replies:    Option<i64>,
  #[serde(default)]
  pub has_media:  Option<bool>,
  #[serde(default)]
  pub scraped_at: Option<String>,
}

/// One scraper output file: `{"messages": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeFile {
  #[serde(default)]
  pub messages: Vec<RawMessage>,
}

/// One detected object instance in a scraped image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
  #[serde(default)]
  pub id:                    Option<i64>,
  #[serde(default)]
  pub image_path:            Option<String>,
  /// Content hash of the image file; used upstream to skip re-processing.
  #[serde(default)]
  pub image_hash:            Option<String>,
  #[serde(default)]
  pub message_id:            Option<i64>,
  #[serde(default)]
  pub channel_name:          Option<String>,
  #[serde(default)]
  pub detected_object_class: Option<String>,
  #[serde(default)]
  pub confidence_score:      Option<f64>,
  #[serde(default)]
  pub bbox_x1:               Option<f64>,
  #[serde(default)]
  pub bbox_y1:               Option<f64>,
  #[serde(default)]
  pub bbox_x2:               Option<f64>,
  #[serde(default)]
  pub bbox_y2:               Option<f64>,
  #[serde(default)]
  pub detection_date:        Option<String>,
  #[serde(default)]
  pub model_version:         Option<String>,
}

/// Parse a scraped timestamp into a naive UTC datetime.
///
/// Accepts RFC 3339, ISO 8601 without offset (`T` or space separated,
/// optional fractional seconds) and the space-separated form with an offset.
/// Offsets are normalised to UTC.
pub fn parse_timestamp(input: &str) -> Option<NaiveDateTime> {
  let s = input.trim();
  if s.is_empty() {
    return None;
  }
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.naive_utc());
  }
  if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
    return Some(dt.naive_utc());
  }
  ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 7, 14)
      .unwrap()
      .and_hms_opt(h, m, s)
      .unwrap()
  }

  #[test]
  fn parses_rfc3339_and_normalises_offset() {
    assert_eq!(parse_timestamp("2025-07-14T10:20:30+00:00"), Some(at(10, 20, 30)));
    assert_eq!(parse_timestamp("2025-07-14T13:20:30+03:00"), Some(at(10, 20, 30)));
    assert_eq!(parse_timestamp("2025-07-14T10:20:30Z"), Some(at(10, 20, 30)));
  }

  #[test]
  fn parses_naive_forms() {
    assert_eq!(parse_timestamp("2025-07-14T10:20:30"), Some(at(10, 20, 30)));
    assert_eq!(parse_timestamp("2025-07-14 10:20:30"), Some(at(10, 20, 30)));
    assert!(parse_timestamp("2025-07-14 10:20:30.123456").is_some());
    assert_eq!(parse_timestamp("2025-07-14 10:20:30+00:00"), Some(at(10, 20, 30)));
  }

  #[test]
  fn rejects_garbage() {
    assert_eq!(parse_timestamp(""), None);
    assert_eq!(parse_timestamp("   "), None);
    assert_eq!(parse_timestamp("yesterday"), None);
  }

  #[test]
  fn scrape_file_tolerates_nulls_and_missing_fields() {
    let json = r#"{"messages": [
      {"id": 1, "channel": "CheMed123", "date": "2025-07-14T10:20:30+00:00",
       "text": null, "views": null, "has_media": true},
      {"channel": "lobelia4cosmetics"}
    ]}"#;
    let file: ScrapeFile = serde_json::from_str(json).unwrap();
    assert_eq!(file.messages.len(), 2);
    assert_eq!(file.messages[0].views, None);
    assert_eq!(file.messages[0].has_media, Some(true));
    assert_eq!(file.messages[1].id, None);
  }
}
