//! Error types for `chanlens-core`.

use thiserror::Error;

use crate::consistency::CheckFailure;

#[derive(Debug, Error)]
pub enum Error {
  #[error("object class {class:?} is listed under both {first} and {second}")]
  DuplicateObjectClass {
    class:  String,
    first:  String,
    second: String,
  },

  #[error("invalid object category table: {0}")]
  CategoryTable(#[from] toml::de::Error),

  #[error("unknown label {label:?} for {kind}")]
  UnknownLabel { kind: &'static str, label: String },

  #[error("{} consistency check(s) failed: {}", .0.len(), summarize(.0))]
  ConsistencyFailed(Vec<CheckFailure>),
}

fn summarize(failures: &[CheckFailure]) -> String {
  failures
    .iter()
    .map(|f| format!("{} ({} rows)", f.check, f.violations))
    .collect::<Vec<_>>()
    .join(", ")
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
