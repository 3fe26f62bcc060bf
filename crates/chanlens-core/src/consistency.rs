//! Consistency checks over built marts.
//!
//! Each check collects the offending rows; an empty result passes. A run
//! whose checks report anything must not replace the published marts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
  dimensions::date_spine,
  facts::{detection_score, engagement_score},
  math::rate,
  pipeline::Marts,
};

/// Number of offending row identifiers kept per failure.
pub const SAMPLE_SIZE: usize = 5;

/// A check that found violating rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFailure {
  pub check:      String,
  pub violations: usize,
  /// Identifiers of the first few offending rows.
  pub sample:     Vec<String>,
}

impl CheckFailure {
  /// `None` when `offenders` is empty.
  pub fn from_offenders(
    check: &str,
    offenders: impl IntoIterator<Item = String>,
  ) -> Option<Self> {
    let mut violations = 0;
    let mut sample = Vec::new();
    for row in offenders {
      violations += 1;
      if sample.len() < SAMPLE_SIZE {
        sample.push(row);
      }
    }
    (violations > 0).then(|| Self {
      check: check.to_owned(),
      violations,
      sample,
    })
  }
}

/// Run every check and return the failures.
pub fn run_all(marts: &Marts) -> Vec<CheckFailure> {
  let failures: Vec<CheckFailure> = [
    channel_aggregates(marts),
    message_rates(marts),
    channel_forward_rate(marts),
    detection_scores(marts),
    engaging_has_views(marts),
    quality_flags_exclusive(marts),
    date_spine_complete(marts),
  ]
  .into_iter()
  .flatten()
  .collect();

  for f in &failures {
    tracing::warn!(
      check = %f.check,
      violations = f.violations,
      sample = ?f.sample,
      "consistency check failed"
    );
  }
  failures
}

#[derive(Default)]
struct ChannelSums {
  messages: i64,
  views:    i64,
  forwards: i64,
}

/// Fact totals per channel key. Facts without a key belong to no channel.
fn channel_sums(marts: &Marts) -> BTreeMap<&str, ChannelSums> {
  let mut sums: BTreeMap<&str, ChannelSums> = BTreeMap::new();
  for f in &marts.fct_messages {
    let Some(key) = f.channel_key.as_deref() else { continue };
    let s = sums.entry(key).or_default();
    s.messages += 1;
    s.views = s.views.saturating_add(f.view_count);
    s.forwards = s.forwards.saturating_add(f.forward_count);
  }
  sums
}

/// Per channel key, the fact row count and view sum match the dimension
/// totals.
pub fn channel_aggregates(marts: &Marts) -> Option<CheckFailure> {
  let sums = channel_sums(marts);
  let mut offenders: Vec<String> = marts
    .dim_channels
    .iter()
    .filter(|c| {
      sums.get(c.channel_key.as_str()).is_none_or(|s| {
        s.messages != c.total_messages || s.views != c.total_views
      })
    })
    .map(|c| c.channel_name.clone())
    .collect();
  offenders.extend(
    sums
      .keys()
      .filter(|key| !marts.dim_channels.iter().any(|c| c.channel_key == **key))
      .map(|key| (*key).to_owned()),
  );
  CheckFailure::from_offenders("channel_aggregates", offenders)
}

/// Stored rates and engagement scores equal their recomputation.
pub fn message_rates(marts: &Marts) -> Option<CheckFailure> {
  let offenders = marts
    .fct_messages
    .iter()
    .filter(|f| {
      f.forward_rate != rate(f.forward_count, f.view_count)
        || f.reply_rate != rate(f.reply_count, f.view_count)
        || f.engagement_score
          != engagement_score(f.view_count, f.forward_count, f.reply_count)
    })
    .map(|f| f.message_id.to_string());
  CheckFailure::from_offenders("message_rates", offenders)
}

pub fn channel_forward_rate(marts: &Marts) -> Option<CheckFailure> {
  let sums = channel_sums(marts);
  let offenders = marts
    .dim_channels
    .iter()
    .filter(|c| {
      let expected = sums
        .get(c.channel_key.as_str())
        .map_or(0.0, |s| rate(s.forwards, s.views));
      c.overall_forward_rate != expected
    })
    .map(|c| c.channel_name.clone());
  CheckFailure::from_offenders("channel_forward_rate", offenders)
}

pub fn detection_scores(marts: &Marts) -> Option<CheckFailure> {
  let offenders = marts
    .fct_image_detections
    .iter()
    .filter(|d| {
      d.detection_score != detection_score(&d.object_class, d.confidence_score)
    })
    .map(|d| d.detection_id.to_string());
  CheckFailure::from_offenders("detection_scores", offenders)
}

pub fn engaging_has_views(marts: &Marts) -> Option<CheckFailure> {
  let offenders = marts
    .fct_messages
    .iter()
    .filter(|f| f.is_engaging_content && f.view_count == 0)
    .map(|f| f.message_id.to_string());
  CheckFailure::from_offenders("engaging_has_views", offenders)
}

pub fn quality_flags_exclusive(marts: &Marts) -> Option<CheckFailure> {
  let offenders = marts
    .fct_messages
    .iter()
    .filter(|f| f.is_engaging_content && f.has_no_engagement)
    .map(|f| f.message_id.to_string());
  CheckFailure::from_offenders("quality_flags_exclusive", offenders)
}

/// Exactly one date row per day between the first and last message.
pub fn date_spine_complete(marts: &Marts) -> Option<CheckFailure> {
  let days = marts.fct_messages.iter().map(|f| f.message_date.date());
  let expected = match (days.clone().min(), days.max()) {
    (Some(first), Some(last)) => date_spine(first, last),
    _ => Vec::new(),
  };

  let mut seen: BTreeMap<_, usize> = BTreeMap::new();
  for d in &marts.dim_dates {
    *seen.entry(d.date_day).or_default() += 1;
  }

  let mut offenders: Vec<String> = expected
    .iter()
    .filter(|d| seen.get(&d.date_day) != Some(&1))
    .map(|d| d.date_day.to_string())
    .collect();
  offenders.extend(
    seen
      .keys()
      .filter(|day| !expected.iter().any(|d| d.date_day == **day))
      .map(ToString::to_string),
  );
  CheckFailure::from_offenders("date_spine", offenders)
}
