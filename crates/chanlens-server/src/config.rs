//! Server and job configuration.
//!
//! Read from an optional TOML file, then overridden by `CHANLENS_*`
//! environment variables (e.g. `CHANLENS_PORT=9000`).

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chanlens_core::lookup::ObjectCategories;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                   String,
  pub port:                   u16,
  /// SQLite warehouse file.
  pub store_path:             PathBuf,
  /// Directory tree holding scraper output (`*.json`).
  pub raw_messages_dir:       PathBuf,
  /// Detector output (a JSON array).
  pub detections_path:        PathBuf,
  /// Object category table; the built-in table is used when unset.
  pub object_categories_path: Option<PathBuf>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                   "127.0.0.1".to_string(),
      port:                   8000,
      store_path:             PathBuf::from("data/chanlens.db"),
      raw_messages_dir:       PathBuf::from("data/raw/telegram_messages"),
      detections_path:        PathBuf::from("data/raw/image_detections.json"),
      object_categories_path: None,
    }
  }
}

impl ServerConfig {
  /// Layer the file at `path` (if present) and the environment over the
  /// defaults.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("CHANLENS"))
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// The configured object category table, or the built-in one.
  pub fn object_categories(&self) -> anyhow::Result<ObjectCategories> {
    let Some(path) = &self.object_categories_path else {
      return Ok(ObjectCategories::default());
    };
    let text = std::fs::read_to_string(path)
      .with_context(|| format!("failed to read object categories at {path:?}"))?;
    let categories = ObjectCategories::from_toml_str(&text)
      .with_context(|| format!("invalid object categories in {path:?}"))?;
    tracing::info!(classes = categories.len(), path = ?path, "loaded object categories");
    Ok(categories)
  }
}

#[cfg(test)]
mod tests {
  use chanlens_core::ladder::ObjectCategory;

  use super::*;

  #[test]
  fn missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ServerConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg, ServerConfig::default());
  }

  #[test]
  fn file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chanlens.toml");
    std::fs::write(
      &path,
      "port = 9100\nstore_path = \"/tmp/w.db\"\nobject_categories_path = \"cats.toml\"\n",
    )
    .unwrap();

    let cfg = ServerConfig::load(&path).unwrap();
    assert_eq!(cfg.port, 9100);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.store_path, PathBuf::from("/tmp/w.db"));
    assert_eq!(cfg.object_categories_path, Some(PathBuf::from("cats.toml")));
    assert_eq!(cfg.address(), "127.0.0.1:9100");
  }

  #[test]
  fn category_table_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cats.toml");
    std::fs::write(&path, "[categories]\npeople = [\"person\"]\nother = [\"pill\"]\n")
      .unwrap();

    let cfg = ServerConfig {
      object_categories_path: Some(path),
      ..Default::default()
    };
    let cats = cfg.object_categories().unwrap();
    assert_eq!(cats.category("person"), ObjectCategory::People);
    assert_eq!(cats.category("bottle"), ObjectCategory::Other);
  }

  #[test]
  fn shipped_category_table_matches_built_in() {
    let shipped =
      ObjectCategories::from_toml_str(include_str!("../../../config/object_categories.toml"))
        .unwrap();
    assert_eq!(shipped, ObjectCategories::default());
  }

  #[test]
  fn unreadable_category_table_is_an_error() {
    let cfg = ServerConfig {
      object_categories_path: Some(PathBuf::from("/nonexistent/cats.toml")),
      ..Default::default()
    };
    assert!(cfg.object_categories().is_err());
  }
}
