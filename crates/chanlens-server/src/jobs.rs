//! Pipeline jobs: raw loading, quality profiling, transformation, and the
//! `run` job graph that chains them.

use std::path::Path;

use chanlens_core::{
  TransformReport,
  consistency,
  lookup::ObjectCategories,
  transform as build_marts,
  warehouse::{DataQualityReport, DetectionQualityReport, Warehouse},
};

use crate::{config::ServerConfig, ingest};

pub async fn load_messages<W: Warehouse>(store: &W, dir: &Path) -> anyhow::Result<usize> {
  let messages = ingest::read_scrape_dir(dir)?;
  let written = store.load_raw_messages(messages).await?;
  tracing::info!(rows = written, dir = ?dir, "raw messages loaded");
  Ok(written)
}

pub async fn load_detections<W: Warehouse>(
  store: &W,
  path: &Path,
) -> anyhow::Result<usize> {
  let detections = ingest::read_detections(path)?;
  let written = store.load_raw_detections(detections).await?;
  tracing::info!(rows = written, file = ?path, "raw detections loaded");
  Ok(written)
}

pub async fn raw_quality<W: Warehouse>(
  store: &W,
) -> anyhow::Result<DataQualityReport> {
  Ok(store.data_quality().await?)
}

pub async fn detection_quality<W: Warehouse>(
  store: &W,
) -> anyhow::Result<DetectionQualityReport> {
  Ok(store.detection_quality().await?)
}

/// Both quality profiles: raw messages and published detections.
#[derive(Debug, serde::Serialize)]
pub struct QualityReport {
  pub raw:        DataQualityReport,
  pub detections: DetectionQualityReport,
}

pub async fn quality<W: Warehouse>(store: &W) -> anyhow::Result<QualityReport> {
  Ok(QualityReport {
    raw:        raw_quality(store).await?,
    detections: detection_quality(store).await?,
  })
}

/// Rebuild every mart from the raw tables.
///
/// The in-memory checks gate the write; the store then re-checks inside its
/// transaction. Either failing leaves the published marts untouched.
pub async fn transform<W: Warehouse>(
  store: &W,
  categories: &ObjectCategories,
) -> anyhow::Result<TransformReport> {
  let messages = store.raw_messages().await?;
  let detections = store.raw_detections().await?;
  let (marts, report) = build_marts(messages, detections, categories);

  let failures = consistency::run_all(&marts);
  if !failures.is_empty() {
    return Err(chanlens_core::Error::ConsistencyFailed(failures).into());
  }

  store.replace_marts(&marts).await?;
  tracing::info!(
    accepted = report.messages.accepted,
    rejected = report.messages.rejected,
    duplicates = report.messages.duplicates,
    "transform complete"
  );
  Ok(report)
}

/// Summary of one `run`.
#[derive(Debug, serde::Serialize)]
pub struct RunReport {
  pub messages_loaded:   usize,
  pub detections_loaded: usize,
  pub quality:           DataQualityReport,
  pub transform:         TransformReport,
  pub detection_quality: DetectionQualityReport,
}

/// Load messages, load detections when the file exists, profile, transform,
/// then profile the published detections.
pub async fn run<W: Warehouse>(
  store: &W,
  cfg: &ServerConfig,
  categories: &ObjectCategories,
) -> anyhow::Result<RunReport> {
  let messages_loaded = load_messages(store, &cfg.raw_messages_dir).await?;
  let detections_loaded = if cfg.detections_path.exists() {
    load_detections(store, &cfg.detections_path).await?
  } else {
    tracing::info!(file = ?cfg.detections_path, "no detector output; skipping");
    0
  };
  let quality = raw_quality(store).await?;
  let transform = transform(store, categories).await?;
  let detection_quality = detection_quality(store).await?;
  Ok(RunReport {
    messages_loaded,
    detections_loaded,
    quality,
    transform,
    detection_quality,
  })
}

#[cfg(test)]
mod tests {
  use chanlens_core::raw::RawMessage;
  use chanlens_store_sqlite::SqliteWarehouse;

  use super::*;

  const SCRAPE: &str = r#"{"messages": [
    {"id": 1, "channel": "CheMed123", "date": "2025-07-14T08:30:00+00:00",
     "text": "Panadol", "views": 320, "forwards": 4, "replies": 1,
     "has_media": true, "scraped_at": "2025-07-14T09:00:00"},
    {"id": 2, "channel": "CheMed123", "date": "2025-07-15T08:30:00+00:00",
     "text": "Vitamin D", "views": 120, "forwards": 0, "replies": 0,
     "has_media": false, "scraped_at": "2025-07-15T09:00:00"},
    {"id": 3, "channel": null, "date": "2025-07-15T08:30:00+00:00"}
  ]}"#;

  const DETECTIONS: &str = r#"[
    {"id": 1, "message_id": 1, "detected_object_class": "person", "confidence_score": 0.9},
    {"id": 2, "message_id": 1, "detected_object_class": "bottle", "confidence_score": 0.4}
  ]"#;

  fn config(dir: &Path, with_detections: bool) -> ServerConfig {
    let raw = dir.join("raw");
    std::fs::create_dir_all(&raw).unwrap();
    std::fs::write(raw.join("CheMed123.json"), SCRAPE).unwrap();
    let detections_path = dir.join("detections.json");
    if with_detections {
      std::fs::write(&detections_path, DETECTIONS).unwrap();
    }
    ServerConfig {
      raw_messages_dir: raw,
      detections_path,
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn run_builds_marts_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), true);
    let store = SqliteWarehouse::open_in_memory().await.unwrap();

    let report = run(&store, &cfg, &ObjectCategories::default()).await.unwrap();
    assert_eq!(report.messages_loaded, 3);
    assert_eq!(report.detections_loaded, 2);
    assert_eq!(report.quality.null_channels, 1);
    assert_eq!(report.quality.quality_score, 90);
    assert_eq!(report.transform.messages.accepted, 2);
    assert_eq!(report.transform.messages.rejected, 1);

    let detections = &report.detection_quality;
    assert_eq!(detections.total_detections, 2);
    assert_eq!(detections.high_confidence, 1);
    assert_eq!(detections.low_confidence, 1);
    assert_eq!(detections.orphaned_detections, 0);
    assert_eq!(detections.avg_detection_score, Some(0.76));
    assert_eq!(detections.quality_score, 70);

    let counts = store.mart_counts().await.unwrap();
    assert_eq!(counts.fct_messages, 2);
    assert_eq!(counts.dim_dates, 2);
    assert_eq!(counts.fct_image_detections, 2);
  }

  #[tokio::test]
  async fn run_without_detector_output() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), false);
    let store = SqliteWarehouse::open_in_memory().await.unwrap();

    let report = run(&store, &cfg, &ObjectCategories::default()).await.unwrap();
    assert_eq!(report.detections_loaded, 0);
    assert_eq!(store.mart_counts().await.unwrap().fct_image_detections, 0);
    assert_eq!(report.detection_quality.total_detections, 0);
  }

  #[tokio::test]
  async fn quality_reports_raw_and_detection_profiles() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), true);
    let store = SqliteWarehouse::open_in_memory().await.unwrap();
    run(&store, &cfg, &ObjectCategories::default()).await.unwrap();

    let report = quality(&store).await.unwrap();
    assert_eq!(report.raw.total_rows, 3);
    assert_eq!(report.detections.category_distribution.len(), 2);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["detections"]["quality_score"], 70);
    assert_eq!(json["raw"]["quality_score"], 90);
  }

  #[tokio::test]
  async fn transform_twice_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), true);
    let store = SqliteWarehouse::open_in_memory().await.unwrap();
    load_messages(&store, &cfg.raw_messages_dir).await.unwrap();
    load_detections(&store, &cfg.detections_path).await.unwrap();

    let categories = ObjectCategories::default();
    let first = transform(&store, &categories).await.unwrap();
    let summary = store.summary().await.unwrap();
    let second = transform(&store, &categories).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(store.summary().await.unwrap(), summary);
  }

  #[tokio::test]
  async fn reloading_a_message_keeps_one_fact_row() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), false);
    let store = SqliteWarehouse::open_in_memory().await.unwrap();
    load_messages(&store, &cfg.raw_messages_dir).await.unwrap();
    store
      .load_raw_messages(vec![RawMessage {
        id: Some(1),
        channel: Some("CheMed123".into()),
        date: Some("2025-07-14T08:30:00+00:00".into()),
        text: Some("Panadol".into()),
        views: Some(900),
        scraped_at: Some("2025-07-16T09:00:00".into()),
        ..Default::default()
      }])
      .await
      .unwrap();

    let report = transform(&store, &ObjectCategories::default()).await.unwrap();
    assert_eq!(report.messages.duplicates, 1);
    let channels = store.top_channels(10).await.unwrap();
    assert_eq!(channels[0].total_messages, 2);
    assert_eq!(channels[0].avg_views_per_message, 510.0);
  }
}
