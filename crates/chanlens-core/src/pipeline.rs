//! The full transformation: raw rows in, five mart tables out.

use serde::{Deserialize, Serialize};

use crate::{
  dimensions::{
    DimChannel, DimDate, DimObject, build_dim_channels, build_dim_dates,
    build_dim_objects,
  },
  facts::{
    FactImageDetection, FactMessage, build_fct_image_detections,
    build_fct_messages,
  },
  lookup::ObjectCategories,
  raw::{RawDetection, RawMessage},
  staging::{StagingReport, stage_detections, stage_messages},
};

/// Every mart table produced by one run.
///
/// Contains no wall-clock values: the same input always yields equal marts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Marts {
  pub dim_channels:         Vec<DimChannel>,
  pub dim_dates:            Vec<DimDate>,
  pub dim_objects:          Vec<DimObject>,
  pub fct_messages:         Vec<FactMessage>,
  pub fct_image_detections: Vec<FactImageDetection>,
}

impl Marts {
  pub fn counts(&self) -> MartCounts {
    MartCounts {
      dim_channels:         self.dim_channels.len(),
      dim_dates:            self.dim_dates.len(),
      dim_objects:          self.dim_objects.len(),
      fct_messages:         self.fct_messages.len(),
      fct_image_detections: self.fct_image_detections.len(),
    }
  }
}

/// Row counts per mart table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MartCounts {
  pub dim_channels:         usize,
  pub dim_dates:            usize,
  pub dim_objects:          usize,
  pub fct_messages:         usize,
  pub fct_image_detections: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformReport {
  pub messages:   StagingReport,
  pub detections: StagingReport,
  pub marts:      MartCounts,
}

/// Stage, then build dimensions, message facts and detection facts.
pub fn transform(
  raw_messages: impl IntoIterator<Item = RawMessage>,
  raw_detections: impl IntoIterator<Item = RawDetection>,
  categories: &ObjectCategories,
) -> (Marts, TransformReport) {
  let (messages, message_report) = stage_messages(raw_messages);
  let (detections, detection_report) = stage_detections(raw_detections);

  let dim_channels = build_dim_channels(&messages);
  let dim_dates = build_dim_dates(&messages);
  let dim_objects = build_dim_objects(&detections, &messages, categories);
  let fct_messages = build_fct_messages(&messages, &dim_channels, &dim_dates);
  let fct_image_detections = build_fct_image_detections(
    &detections,
    &fct_messages,
    &messages,
    &dim_channels,
    &dim_dates,
  );

  let marts = Marts {
    dim_channels,
    dim_dates,
    dim_objects,
    fct_messages,
    fct_image_detections,
  };
  let report = TransformReport {
    messages:   message_report,
    detections: detection_report,
    marts:      marts.counts(),
  };
  tracing::info!(
    channels = report.marts.dim_channels,
    dates = report.marts.dim_dates,
    objects = report.marts.dim_objects,
    messages = report.marts.fct_messages,
    detections = report.marts.fct_image_detections,
    "transformed marts"
  );
  (marts, report)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn raw_message(id: i64, channel: &str, date: &str, views: i64) -> RawMessage {
    RawMessage {
      id:         Some(id),
      channel:    Some(channel.into()),
      date:       Some(date.into()),
      text:       Some(format!("message {id} https://t.me/x")),
      views:      Some(views),
      forwards:   Some(views / 20),
      replies:    Some(1),
      has_media:  Some(id % 2 == 0),
      scraped_at: None,
    }
  }

  fn raw_detection(id: i64, message_id: i64, class: &str) -> RawDetection {
    RawDetection {
      id: Some(id),
      message_id: Some(message_id),
      detected_object_class: Some(class.into()),
      confidence_score: Some(0.85),
      ..Default::default()
    }
  }

  fn sample() -> (Vec<RawMessage>, Vec<RawDetection>) {
    let messages = vec![
      raw_message(1, "CheMed123", "2025-07-10T08:00:00+00:00", 1200),
      raw_message(2, "CheMed123", "2025-07-12T14:00:00+00:00", 300),
      raw_message(3, "tikvahpharma", "2025-07-11T21:00:00+00:00", 90),
      RawMessage { id: Some(4), ..Default::default() },
    ];
    let detections = vec![
      raw_detection(1, 2, "person"),
      raw_detection(2, 2, "bottle"),
      raw_detection(3, 99, "person"),
    ];
    (messages, detections)
  }

  #[test]
  fn builds_every_table() {
    let (messages, detections) = sample();
    let (marts, report) =
      transform(messages, detections, &ObjectCategories::default());

    assert_eq!(report.messages.accepted, 3);
    assert_eq!(report.messages.rejected, 1);
    assert_eq!(report.marts, MartCounts {
      dim_channels:         2,
      dim_dates:            3,
      dim_objects:          2,
      fct_messages:         3,
      fct_image_detections: 3,
    });
    assert!(crate::consistency::run_all(&marts).is_empty());
  }

  #[test]
  fn rerun_is_identical() {
    let (messages, detections) = sample();
    let categories = ObjectCategories::default();
    let (first, _) =
      transform(messages.clone(), detections.clone(), &categories);
    let (second, _) = transform(messages, detections, &categories);
    assert_eq!(first, second);
  }

  #[test]
  fn input_order_does_not_matter() {
    let (mut messages, mut detections) = sample();
    let categories = ObjectCategories::default();
    let (first, _) =
      transform(messages.clone(), detections.clone(), &categories);
    messages.reverse();
    detections.reverse();
    let (second, _) = transform(messages, detections, &categories);
    assert_eq!(first, second);
  }

  #[test]
  fn huge_counts_saturate_instead_of_overflowing() {
    let huge = i64::MAX / 2;
    let messages: Vec<_> = (1..=3)
      .map(|id| RawMessage {
        forwards: Some(huge),
        replies: Some(0),
        ..raw_message(id, "CheMed123", "2025-07-10T08:00:00+00:00", huge)
      })
      .collect();
    let (marts, report) = transform(
      messages,
      Vec::<RawDetection>::new(),
      &ObjectCategories::default(),
    );

    assert_eq!(report.messages.accepted, 3);
    assert_eq!(marts.dim_channels[0].total_views, i64::MAX);
    assert_eq!(marts.dim_channels[0].overall_forward_rate, 100.0);
    assert_eq!(marts.fct_messages[0].engagement_score, 400.0);
    assert!(crate::consistency::run_all(&marts).is_empty());
  }

  #[test]
  fn empty_input_gives_empty_marts() {
    let (marts, _) = transform(
      Vec::<RawMessage>::new(),
      Vec::<RawDetection>::new(),
      &ObjectCategories::default(),
    );
    assert_eq!(marts, Marts::default());
  }
}
