//! Readers for scraper and detector output files.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chanlens_core::raw::{RawDetection, RawMessage, ScrapeFile};

/// Every `*.json` file under `dir`, recursively, in path order.
pub fn scrape_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
  let mut files = Vec::new();
  let mut pending = vec![dir.to_path_buf()];
  while let Some(current) = pending.pop() {
    let entries = std::fs::read_dir(&current)
      .with_context(|| format!("failed to list {current:?}"))?;
    for entry in entries {
      let path = entry?.path();
      if path.is_dir() {
        pending.push(path);
      } else if path.extension().is_some_and(|ext| ext == "json") {
        files.push(path);
      }
    }
  }
  files.sort();
  Ok(files)
}

/// Read one scraper output file (`{"messages": [...]}`).
pub fn read_scrape_file(path: &Path) -> anyhow::Result<Vec<RawMessage>> {
  let text = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read {path:?}"))?;
  let file: ScrapeFile = serde_json::from_str(&text)
    .with_context(|| format!("invalid scraper output in {path:?}"))?;
  Ok(file.messages)
}

/// Read every scraper file under `dir`, in path order.
pub fn read_scrape_dir(dir: &Path) -> anyhow::Result<Vec<RawMessage>> {
  let mut messages = Vec::new();
  for path in scrape_files(dir)? {
    let batch = read_scrape_file(&path)?;
    tracing::debug!(file = ?path, messages = batch.len(), "read scraper file");
    messages.extend(batch);
  }
  Ok(messages)
}

/// Read detector output (a JSON array of detections).
pub fn read_detections(path: &Path) -> anyhow::Result<Vec<RawDetection>> {
  let text = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read {path:?}"))?;
  serde_json::from_str(&text)
    .with_context(|| format!("invalid detector output in {path:?}"))
}
