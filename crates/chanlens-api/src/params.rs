//! Query-parameter validation shared by the handlers.

use chrono::{Days, NaiveDate, Utc};

use crate::error::ApiError;

/// Resolve an optional integer parameter against its default and inclusive
/// bounds.
pub fn bounded(
  name: &str,
  value: Option<u32>,
  default: u32,
  (min, max): (u32, u32),
) -> Result<u32, ApiError> {
  let value = value.unwrap_or(default);
  if (min..=max).contains(&value) {
    Ok(value)
  } else {
    Err(ApiError::BadRequest(format!(
      "{name} must be between {min} and {max}, got {value}"
    )))
  }
}

/// First day of a `days`-long lookback window ending at `as_of` (today in
/// UTC when absent).
pub fn window_start(as_of: Option<NaiveDate>, days: u32) -> NaiveDate {
  let end = as_of.unwrap_or_else(|| Utc::now().date_naive());
  end
    .checked_sub_days(Days::new(u64::from(days)))
    .unwrap_or(NaiveDate::MIN)
}
