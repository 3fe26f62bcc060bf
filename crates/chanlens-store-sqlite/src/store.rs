//! [`SqliteWarehouse`]: the SQLite implementation of [`Warehouse`].

use std::path::Path;

use chanlens_core::{
  ladder::{ActivityLevel, ConfidenceLevel},
  math::{round_to, round2},
  pipeline::{MartCounts, Marts},
  raw::{RawDetection, RawMessage},
  warehouse::{
    ChannelActivity, ChannelAnalytics, ChannelInfo, DataQualityReport,
    DetectionDetail, DetectionFilter, DetectionQualityReport, EngagementMetric,
    HIGH_ENGAGEMENT_THRESHOLD, MessageHit, SummaryStats, TopObject, Warehouse,
  },
};
use chrono::NaiveDate;
use rusqlite::OptionalExtension as _;

use crate::{
  Error, Result, checks,
  encode::{
    RawChannelActivity, RawChannelInfo, RawDetectionDetail,
    RawDetectionQuality, RawEngagementMetric, RawMessageHit, RawTopObject,
    encode_day,
  },
  schema::SCHEMA,
  write,
};

/// Number of detected classes reported per channel in analytics.
const CHANNEL_TOP_OBJECTS: i64 = 5;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A chanlens warehouse backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteWarehouse {
  conn: tokio_rusqlite::Connection,
}

impl SqliteWarehouse {
  /// Open (or create) a warehouse at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory warehouse, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        register_functions(conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn channel_infos(
    &self,
    sql: &'static str,
    limit: Option<i64>,
  ) -> Result<Vec<ChannelInfo>> {
    let raws: Vec<RawChannelInfo> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map([limit.unwrap_or(-1)], |row| {
            Ok(RawChannelInfo {
              channel_name:           row.get(0)?,
              total_messages:         row.get(1)?,
              avg_views_per_message:  row.get(2)?,
              overall_forward_rate:   row.get(3)?,
              channel_activity_level: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawChannelInfo::into_channel_info).collect()
  }
}

fn to_limit(n: usize) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

/// SQLite's `lower()` only folds ASCII; `unicode_lower` folds the way
/// `str::to_lowercase` does, so search needles and haystacks agree.
fn register_functions(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
  use rusqlite::functions::FunctionFlags;

  conn.create_scalar_function(
    "unicode_lower",
    1,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
  )
}

fn mart_counts(conn: &rusqlite::Connection) -> rusqlite::Result<MartCounts> {
  conn.query_row(
    "SELECT (SELECT COUNT(*) FROM dim_channels),
            (SELECT COUNT(*) FROM dim_dates),
            (SELECT COUNT(*) FROM dim_objects),
            (SELECT COUNT(*) FROM fct_messages),
            (SELECT COUNT(*) FROM fct_image_detections)",
    [],
    |row| {
      Ok(MartCounts {
        dim_channels:         row.get(0)?,
        dim_dates:            row.get(1)?,
        dim_objects:          row.get(2)?,
        fct_messages:         row.get(3)?,
        fct_image_detections: row.get(4)?,
      })
    },
  )
}

// ─── Warehouse impl ──────────────────────────────────────────────────────────

impl Warehouse for SqliteWarehouse {
  type Error = Error;

  // ── Raw layer ─────────────────────────────────────────────────────────────

  async fn load_raw_messages(&self, messages: Vec<RawMessage>) -> Result<usize> {
    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let n = write::insert_raw_messages(&tx, &messages)?;
        tx.commit()?;
        Ok(n)
      })
      .await?;
    tracing::info!(rows = written, "loaded raw messages");
    Ok(written)
  }

  async fn load_raw_detections(
    &self,
    detections: Vec<RawDetection>,
  ) -> Result<usize> {
    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let n = write::insert_raw_detections(&tx, &detections)?;
        tx.commit()?;
        Ok(n)
      })
      .await?;
    tracing::info!(rows = written, "loaded raw detections");
    Ok(written)
  }

  async fn raw_messages(&self) -> Result<Vec<RawMessage>> {
    Ok(
      self
        .conn
        .call(|conn| {
          let mut stmt = conn.prepare(
            "SELECT id, channel, date, text, views, forwards, replies,
                    has_media, scraped_at
             FROM raw_telegram_messages
             ORDER BY row_id",
          )?;
          let rows = stmt
            .query_map([], |row| {
              Ok(RawMessage {
                id:         row.get(0)?,
                channel:    row.get(1)?,
                date:       row.get(2)?,
                text:       row.get(3)?,
                views:      row.get(4)?,
                forwards:   row.get(5)?,
                replies:    row.get(6)?,
                has_media:  row.get(7)?,
                scraped_at: row.get(8)?,
              })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  async fn raw_detections(&self) -> Result<Vec<RawDetection>> {
    Ok(
      self
        .conn
        .call(|conn| {
          let mut stmt = conn.prepare(
            "SELECT id, image_path, image_hash, message_id, channel_name,
                    detected_object_class, confidence_score,
                    bbox_x1, bbox_y1, bbox_x2, bbox_y2,
                    detection_date, model_version
             FROM raw_image_detections
             ORDER BY row_id",
          )?;
          let rows = stmt
            .query_map([], |row| {
              Ok(RawDetection {
                id:                    row.get(0)?,
                image_path:            row.get(1)?,
                image_hash:            row.get(2)?,
                message_id:            row.get(3)?,
                channel_name:          row.get(4)?,
                detected_object_class: row.get(5)?,
                confidence_score:      row.get(6)?,
                bbox_x1:               row.get(7)?,
                bbox_y1:               row.get(8)?,
                bbox_x2:               row.get(9)?,
                bbox_y2:               row.get(10)?,
                detection_date:        row.get(11)?,
                model_version:         row.get(12)?,
              })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  async fn data_quality(&self) -> Result<DataQualityReport> {
    let report = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*),
                  COUNT(*) - COUNT(DISTINCT id),
                  COALESCE(SUM(channel IS NULL), 0),
                  COALESCE(SUM(date IS NULL), 0),
                  MIN(date), MAX(date),
                  AVG(views), MIN(views), MAX(views)
           FROM raw_telegram_messages",
          [],
          |row| {
            let duplicates: i64 = row.get(1)?;
            let null_channels: i64 = row.get(2)?;
            let null_dates: i64 = row.get(3)?;
            Ok(DataQualityReport {
              total_rows: row.get(0)?,
              duplicates,
              null_channels,
              null_dates,
              first_date: row.get(4)?,
              last_date: row.get(5)?,
              avg_views: row.get::<_, Option<f64>>(6)?.map(round2),
              min_views: row.get(7)?,
              max_views: row.get(8)?,
              quality_score: DataQualityReport::score(
                duplicates,
                null_channels,
                null_dates,
              ),
            })
          },
        )?)
      })
      .await?;
    tracing::info!(
      score = report.quality_score,
      duplicates = report.duplicates,
      null_channels = report.null_channels,
      null_dates = report.null_dates,
      "raw data quality"
    );
    Ok(report)
  }

  async fn detection_quality(&self) -> Result<DetectionQualityReport> {
    let raw = self
      .conn
      .call(|conn| {
        let (total, high, medium, low, orphaned, avg_score): (
          i64,
          i64,
          i64,
          i64,
          i64,
          Option<f64>,
        ) = conn.query_row(
          "SELECT COUNT(*),
                  COALESCE(SUM(d.confidence_level = ?1), 0),
                  COALESCE(SUM(d.confidence_level = ?2), 0),
                  COALESCE(SUM(d.confidence_level = ?3), 0),
                  COALESCE(SUM(m.message_id IS NULL), 0),
                  AVG(d.detection_score)
           FROM fct_image_detections d
           LEFT JOIN fct_messages m ON m.message_id = d.message_id",
          rusqlite::params![
            ConfidenceLevel::High.as_str(),
            ConfidenceLevel::Medium.as_str(),
            ConfidenceLevel::Low.as_str(),
          ],
          |row| {
            Ok((
              row.get(0)?,
              row.get(1)?,
              row.get(2)?,
              row.get(3)?,
              row.get(4)?,
              row.get(5)?,
            ))
          },
        )?;
        let mut stmt = conn.prepare(
          "SELECT object_category, COUNT(*) AS classes
           FROM dim_objects
           GROUP BY object_category
           ORDER BY classes DESC, object_category",
        )?;
        let categories = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(RawDetectionQuality {
          total,
          high,
          medium,
          low,
          orphaned,
          avg_score,
          categories,
        })
      })
      .await?;
    let report = raw.into_report()?;
    tracing::info!(
      score = report.quality_score,
      detections = report.total_detections,
      orphaned = report.orphaned_detections,
      "detection data quality"
    );
    Ok(report)
  }

  // ── Marts ─────────────────────────────────────────────────────────────────

  async fn replace_marts(&self, marts: &Marts) -> Result<MartCounts> {
    let marts = marts.clone();
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        write::clear_marts(&tx)?;
        write::insert_marts(&tx, &marts)?;
        let failures = checks::run_all(&tx)?;
        if !failures.is_empty() {
          // Dropping the transaction rolls it back.
          return Ok(Err(failures));
        }
        let counts = mart_counts(&tx)?;
        tx.commit()?;
        Ok(Ok(counts))
      })
      .await?;

    match outcome {
      Ok(counts) => {
        tracing::info!(
          channels = counts.dim_channels,
          dates = counts.dim_dates,
          objects = counts.dim_objects,
          messages = counts.fct_messages,
          detections = counts.fct_image_detections,
          "published marts"
        );
        Ok(counts)
      }
      Err(failures) => {
        for f in &failures {
          tracing::error!(
            check = %f.check,
            violations = f.violations,
            sample = ?f.sample,
            "mart check failed; rolled back"
          );
        }
        Err(Error::ConsistencyFailed(failures))
      }
    }
  }

  async fn mart_counts(&self) -> Result<MartCounts> {
    Ok(self.conn.call(|conn| Ok(mart_counts(conn)?)).await?)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn top_objects(&self, limit: usize) -> Result<Vec<TopObject>> {
    let limit = to_limit(limit);
    let raws: Vec<RawTopObject> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT object_class, object_category, total_detections,
                  messages_with_object, channels_with_object, avg_confidence,
                  frequency_category, importance_score
           FROM dim_objects
           ORDER BY total_detections DESC, object_class
           LIMIT ?1",
        )?;
        let rows = stmt
          .query_map([limit], |row| {
            Ok(RawTopObject {
              object_class:         row.get(0)?,
              object_category:      row.get(1)?,
              total_detections:     row.get(2)?,
              messages_with_object: row.get(3)?,
              channels_with_object: row.get(4)?,
              avg_confidence:       row.get(5)?,
              frequency_category:   row.get(6)?,
              importance_score:     row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTopObject::into_top_object).collect()
  }

  async fn top_channels(&self, limit: usize) -> Result<Vec<ChannelInfo>> {
    self
      .channel_infos(
        "SELECT channel_name, total_messages, avg_views_per_message,
                overall_forward_rate, channel_activity_level
         FROM dim_channels
         ORDER BY total_messages DESC, channel_name
         LIMIT ?1",
        Some(to_limit(limit)),
      )
      .await
  }

  async fn channel_list(&self) -> Result<Vec<ChannelInfo>> {
    self
      .channel_infos(
        "SELECT channel_name, total_messages, avg_views_per_message,
                overall_forward_rate, channel_activity_level
         FROM dim_channels
         ORDER BY channel_name
         LIMIT ?1",
        None,
      )
      .await
  }

  async fn channel_activity(
    &self,
    channel_name: &str,
    since: NaiveDate,
  ) -> Result<Vec<ChannelActivity>> {
    let name = channel_name.to_owned();
    let since = encode_day(since);
    let raws: Vec<RawChannelActivity> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT dc.channel_name, dd.date_day,
                  COUNT(fm.message_id), SUM(fm.view_count),
                  SUM(fm.forward_count), AVG(fm.engagement_score)
           FROM fct_messages fm
           JOIN dim_channels dc ON fm.channel_key = dc.channel_key
           JOIN dim_dates dd    ON fm.date_key = dd.date_key
           WHERE dc.channel_name = ?1 AND dd.date_day >= ?2
           GROUP BY dc.channel_name, dd.date_day
           ORDER BY dd.date_day DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![name, since], |row| {
            Ok(RawChannelActivity {
              channel_name:         row.get(0)?,
              date:                 row.get(1)?,
              message_count:        row.get(2)?,
              total_views:          row.get(3)?,
              total_forwards:       row.get(4)?,
              avg_engagement_score: row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawChannelActivity::into_activity).collect()
  }

  async fn channel_analytics(
    &self,
    channel_name: &str,
  ) -> Result<Option<ChannelAnalytics>> {
    let name = channel_name.to_owned();
    let found = self
      .conn
      .call(move |conn| {
        let main = conn
          .query_row(
            "SELECT dc.channel_name, dc.total_messages,
                    COALESCE(SUM(fm.view_count), 0),
                    COALESCE(SUM(fm.forward_count), 0),
                    COALESCE(SUM(fm.reply_count), 0),
                    AVG(fm.engagement_score),
                    dc.avg_views_per_message, dc.overall_forward_rate,
                    dc.channel_activity_level
             FROM dim_channels dc
             LEFT JOIN fct_messages fm ON fm.channel_key = dc.channel_key
             WHERE dc.channel_name = ?1
             GROUP BY dc.channel_key",
            [&name],
            |row| {
              Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, Option<f64>>(5)?,
                row.get::<_, f64>(6)?,
                row.get::<_, f64>(7)?,
                row.get::<_, String>(8)?,
              ))
            },
          )
          .optional()?;
        let Some(main) = main else {
          return Ok(None);
        };

        let mut stmt = conn.prepare(
          "SELECT fid.object_class, COUNT(*), AVG(fid.confidence_score)
           FROM fct_image_detections fid
           JOIN dim_channels dc ON fid.channel_key = dc.channel_key
           WHERE dc.channel_name = ?1
           GROUP BY fid.object_class
           ORDER BY COUNT(*) DESC, fid.object_class
           LIMIT ?2",
        )?;
        let objects = stmt
          .query_map(rusqlite::params![name, CHANNEL_TOP_OBJECTS], |row| {
            Ok((
              row.get::<_, String>(0)?,
              row.get::<_, i64>(1)?,
              row.get::<_, f64>(2)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some((main, objects)))
      })
      .await?;

    let Some((main, objects)) = found else {
      return Ok(None);
    };
    let (
      channel_name,
      total_messages,
      total_views,
      total_forwards,
      total_replies,
      avg_engagement,
      avg_views_per_message,
      overall_forward_rate,
      activity,
    ) = main;

    let avg_confidence = if objects.is_empty() {
      0.0
    } else {
      objects.iter().map(|(_, _, c)| c).sum::<f64>() / objects.len() as f64
    };

    Ok(Some(ChannelAnalytics {
      channel_name,
      total_messages,
      total_views,
      total_forwards,
      total_replies,
      avg_engagement_score: round2(avg_engagement.unwrap_or(0.0)),
      avg_views_per_message,
      overall_forward_rate,
      channel_activity_level: ActivityLevel::parse(&activity)?,
      detection_count: objects.iter().map(|(_, n, _)| n).sum(),
      avg_confidence: round_to(avg_confidence, 4),
      top_detected_objects: objects.into_iter().map(|(c, _, _)| c).collect(),
    }))
  }

  async fn search_messages(
    &self,
    query: &str,
    limit: usize,
  ) -> Result<Vec<MessageHit>> {
    let needle = query.to_lowercase();
    let limit = to_limit(limit);
    let raws: Vec<RawMessageHit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT message_id, channel_name, message_date, view_count,
                  forward_count, reply_count, engagement_score,
                  reach_category, message_text, has_media
           FROM fct_messages
           WHERE instr(unicode_lower(message_text), ?1) > 0
           ORDER BY engagement_score DESC, view_count DESC, message_id
           LIMIT ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![needle, limit], |row| {
            Ok(RawMessageHit {
              message_id:       row.get(0)?,
              channel_name:     row.get(1)?,
              message_date:     row.get(2)?,
              view_count:       row.get(3)?,
              forward_count:    row.get(4)?,
              reply_count:      row.get(5)?,
              engagement_score: row.get(6)?,
              reach_category:   row.get(7)?,
              message_text:     row.get(8)?,
              has_media:        row.get(9)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessageHit::into_hit).collect()
  }

  async fn engagement_metrics(
    &self,
    since: NaiveDate,
  ) -> Result<Vec<EngagementMetric>> {
    let since = encode_day(since);
    let raws: Vec<RawEngagementMetric> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT dd.date_day, COUNT(fm.message_id),
                  SUM(fm.view_count), SUM(fm.forward_count),
                  SUM(fm.reply_count), AVG(fm.engagement_score),
                  SUM(CASE WHEN fm.engagement_score > ?2 THEN 1 ELSE 0 END)
           FROM fct_messages fm
           JOIN dim_dates dd ON fm.date_key = dd.date_key
           WHERE dd.date_day >= ?1
           GROUP BY dd.date_day
           ORDER BY dd.date_day DESC",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![since, HIGH_ENGAGEMENT_THRESHOLD],
            |row| {
              Ok(RawEngagementMetric {
                date:                     row.get(0)?,
                total_messages:           row.get(1)?,
                total_views:              row.get(2)?,
                total_forwards:           row.get(3)?,
                total_replies:            row.get(4)?,
                avg_engagement_score:     row.get(5)?,
                high_engagement_messages: row.get(6)?,
              })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEngagementMetric::into_metric).collect()
  }

  async fn detections(
    &self,
    filter: &DetectionFilter,
  ) -> Result<Vec<DetectionDetail>> {
    let class = filter
      .object_class
      .as_deref()
      .map(|c| c.trim().to_lowercase());
    let level = filter.confidence_level.map(|l| l.as_str());
    let limit = to_limit(filter.limit);
    let raws: Vec<RawDetectionDetail> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT fid.detection_id, fid.message_id, dc.channel_name,
                  fid.object_class, fid.confidence_score,
                  fid.confidence_level, fid.bbox_area, fid.detection_score,
                  fid.detection_date, fid.message_date, fid.engagement_score
           FROM fct_image_detections fid
           LEFT JOIN dim_channels dc ON fid.channel_key = dc.channel_key
           WHERE (?1 IS NULL OR fid.object_class = ?1)
             AND (?2 IS NULL OR fid.confidence_level = ?2)
           ORDER BY fid.detection_score DESC, fid.confidence_score DESC,
                    fid.detection_id
           LIMIT ?3",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![class, level, limit], |row| {
            Ok(RawDetectionDetail {
              detection_id:     row.get(0)?,
              message_id:       row.get(1)?,
              channel_name:     row.get(2)?,
              object_class:     row.get(3)?,
              confidence_score: row.get(4)?,
              confidence_level: row.get(5)?,
              bbox_area:        row.get(6)?,
              detection_score:  row.get(7)?,
              detection_date:   row.get(8)?,
              message_date:     row.get(9)?,
              engagement_score: row.get(10)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDetectionDetail::into_detail).collect()
  }

  async fn summary(&self) -> Result<SummaryStats> {
    Ok(
      self
        .conn
        .call(|conn| {
          Ok(conn.query_row(
            "SELECT (SELECT COUNT(*) FROM dim_channels),
                    (SELECT COUNT(*) FROM fct_messages),
                    (SELECT COALESCE(SUM(view_count), 0) FROM fct_messages),
                    (SELECT COALESCE(SUM(forward_count), 0) FROM fct_messages),
                    (SELECT AVG(engagement_score) FROM fct_messages),
                    (SELECT COUNT(DISTINCT object_class) FROM fct_image_detections),
                    (SELECT COUNT(*) FROM fct_image_detections)",
            [],
            |row| {
              Ok(SummaryStats {
                total_channels:          row.get(0)?,
                total_messages:          row.get(1)?,
                total_views:             row.get(2)?,
                total_forwards:          row.get(3)?,
                avg_engagement_score:    round2(
                  row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                ),
                unique_objects_detected: row.get(5)?,
                total_detections:        row.get(6)?,
              })
            },
          )?)
        })
        .await?,
    )
  }

  async fn ping(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
