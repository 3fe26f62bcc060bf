//! Surrogate keys for dimension rows.
//!
//! A key is the lowercase hex SHA-256 of the natural key's string form, so
//! the same channel, day or object class always hashes to the same key across
//! runs and across tables.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

pub fn surrogate_key(natural: &str) -> String {
  hex::encode(Sha256::digest(natural.as_bytes()))
}

pub fn channel_key(channel_name: &str) -> String { surrogate_key(channel_name) }

/// Keyed on the date-only value (`YYYY-MM-DD`), never on a timestamp.
pub fn date_key(day: NaiveDate) -> String {
  surrogate_key(&day.format("%Y-%m-%d").to_string())
}

pub fn object_key(object_class: &str) -> String {
  surrogate_key(&object_class.to_lowercase())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keys_are_stable_hex_digests() {
    let key = surrogate_key("CheMed123");
    assert_eq!(key.len(), 64);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(key, surrogate_key("CheMed123"));
    assert_ne!(key, surrogate_key("chemed123"));
  }

  #[test]
  fn date_key_hashes_the_iso_day() {
    let day = NaiveDate::from_ymd_opt(2025, 7, 14).unwrap();
    assert_eq!(date_key(day), surrogate_key("2025-07-14"));
  }

  #[test]
  fn object_key_ignores_case() {
    assert_eq!(object_key("Person"), object_key("person"));
  }
}
