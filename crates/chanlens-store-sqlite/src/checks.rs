//! Consistency checks run in SQL against freshly written marts, inside the
//! replacement transaction.
//!
//! Each query selects one identifier per offending row. Rate recomputation
//! in SQL does not round the way the builders do, so those comparisons
//! allow a small tolerance.

use chanlens_core::{
  consistency::CheckFailure,
  lookup::DETECTION_SCORE_MULTIPLIERS,
};
use rusqlite::Connection;

/// Largest difference between a stored two-place rate and its unrounded
/// recomputation that still counts as equal.
const RATE_TOLERANCE: f64 = 0.0101;

/// Same, for four-place detection scores.
const SCORE_TOLERANCE: f64 = 0.000101;

const CHANNEL_AGGREGATES: &str = "
  SELECT dc.channel_name
  FROM dim_channels dc
  LEFT JOIN (
    SELECT channel_key, COUNT(*) AS n, SUM(view_count) AS views
    FROM fct_messages
    GROUP BY channel_key
  ) f ON f.channel_key = dc.channel_key
  WHERE COALESCE(f.n, 0) != dc.total_messages
     OR COALESCE(f.views, 0) != dc.total_views
  ORDER BY dc.channel_name";

const MESSAGE_RATES: &str = "
  SELECT CAST(message_id AS TEXT)
  FROM fct_messages
  WHERE view_count > 0
    AND (ABS(forward_rate - forward_count * 100.0 / view_count) > ?1
      OR ABS(reply_rate - reply_count * 100.0 / view_count) > ?1
      OR ABS(engagement_score
             - (forward_count * 3 + reply_count * 2 + view_count) * 100.0
               / view_count) > ?1)
  ORDER BY message_id";

const ZERO_VIEW_RATES: &str = "
  SELECT CAST(message_id AS TEXT)
  FROM fct_messages
  WHERE view_count = 0
    AND (forward_rate != 0 OR reply_rate != 0 OR engagement_score != 0)
  ORDER BY message_id";

const ENGAGING_HAS_VIEWS: &str = "
  SELECT CAST(message_id AS TEXT)
  FROM fct_messages
  WHERE is_engaging_content = 1 AND view_count = 0
  ORDER BY message_id";

const QUALITY_FLAGS_EXCLUSIVE: &str = "
  SELECT CAST(message_id AS TEXT)
  FROM fct_messages
  WHERE is_engaging_content = 1 AND has_no_engagement = 1
  ORDER BY message_id";

/// `CASE` expression mapping `object_class` to its score multiplier.
fn multiplier_case() -> String {
  let arms: String = DETECTION_SCORE_MULTIPLIERS
    .iter()
    .map(|(class, m)| format!(" WHEN '{}' THEN {m:?}", class.replace('\'', "''")))
    .collect();
  format!("CASE object_class{arms} ELSE 1.0 END")
}

fn detection_scores_sql() -> String {
  format!(
    "SELECT CAST(detection_id AS TEXT)
     FROM fct_image_detections
     WHERE ABS(detection_score - confidence_score * {}) > ?1
     ORDER BY detection_id",
    multiplier_case()
  )
}

fn offenders(
  conn: &Connection,
  check: &str,
  sql: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Option<CheckFailure>> {
  let mut stmt = conn.prepare(sql)?;
  let rows = stmt
    .query_map(params, |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(CheckFailure::from_offenders(check, rows))
}

/// Run every SQL check; an empty result means the marts may be committed.
pub fn run_all(conn: &Connection) -> rusqlite::Result<Vec<CheckFailure>> {
  let results = [
    offenders(conn, "channel_aggregates", CHANNEL_AGGREGATES, [])?,
    offenders(conn, "message_rates", MESSAGE_RATES, [RATE_TOLERANCE])?,
    offenders(conn, "zero_view_rates", ZERO_VIEW_RATES, [])?,
    offenders(conn, "engaging_has_views", ENGAGING_HAS_VIEWS, [])?,
    offenders(conn, "quality_flags_exclusive", QUALITY_FLAGS_EXCLUSIVE, [])?,
    offenders(
      conn,
      "detection_scores",
      &detection_scores_sql(),
      [SCORE_TOLERANCE],
    )?,
  ];
  Ok(results.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn multiplier_case_lists_every_class() {
    let case = multiplier_case();
    assert!(case.starts_with("CASE object_class WHEN 'person' THEN 1.2"));
    assert!(case.contains("WHEN 'cell phone' THEN 1.1"));
    assert!(case.ends_with("ELSE 1.0 END"));
  }
}
