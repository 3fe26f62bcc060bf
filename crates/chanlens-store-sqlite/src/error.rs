//! Error type for `chanlens-store-sqlite`.

use chanlens_core::consistency::CheckFailure;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] chanlens_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// The written marts failed the in-transaction checks; nothing was
  /// committed.
  #[error("mart replacement rolled back: {} check(s) failed", .0.len())]
  ConsistencyFailed(Vec<CheckFailure>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
