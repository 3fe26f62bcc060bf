//! Row writers for the raw and mart tables. Each runs on the connection
//! thread against an open transaction.

use chanlens_core::{
  pipeline::Marts,
  raw::{RawDetection, RawMessage},
};
use rusqlite::{Transaction, params};

use crate::{
  encode::{encode_day, encode_ts},
  schema::MART_TABLES,
};

// ─── Raw layer ───────────────────────────────────────────────────────────────

pub fn insert_raw_messages(
  tx: &Transaction<'_>,
  messages: &[RawMessage],
) -> rusqlite::Result<usize> {
  let mut stmt = tx.prepare(
    "INSERT INTO raw_telegram_messages
       (id, channel, date, text, views, forwards, replies, has_media, scraped_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
  )?;
  for m in messages {
    stmt.execute(params![
      m.id,
      m.channel,
      m.date,
      m.text,
      m.views,
      m.forwards,
      m.replies,
      m.has_media,
      m.scraped_at,
    ])?;
  }
  Ok(messages.len())
}

pub fn insert_raw_detections(
  tx: &Transaction<'_>,
  detections: &[RawDetection],
) -> rusqlite::Result<usize> {
  let mut stmt = tx.prepare(
    "INSERT INTO raw_image_detections
       (id, image_path, image_hash, message_id, channel_name,
        detected_object_class, confidence_score,
        bbox_x1, bbox_y1, bbox_x2, bbox_y2, detection_date, model_version)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
  )?;
  for d in detections {
    stmt.execute(params![
      d.id,
      d.image_path,
      d.image_hash,
      d.message_id,
      d.channel_name,
      d.detected_object_class,
      d.confidence_score,
      d.bbox_x1,
      d.bbox_y1,
      d.bbox_x2,
      d.bbox_y2,
      d.detection_date,
      d.model_version,
    ])?;
  }
  Ok(detections.len())
}

// ─── Marts ───────────────────────────────────────────────────────────────────

pub fn clear_marts(tx: &Transaction<'_>) -> rusqlite::Result<()> {
  for table in MART_TABLES {
    tx.execute(&format!("DELETE FROM {table}"), [])?;
  }
  Ok(())
}

/// Insert every mart row, dimensions before the facts that reference them.
pub fn insert_marts(tx: &Transaction<'_>, marts: &Marts) -> rusqlite::Result<()> {
  insert_dim_channels(tx, marts)?;
  insert_dim_dates(tx, marts)?;
  insert_dim_objects(tx, marts)?;
  insert_fct_messages(tx, marts)?;
  insert_fct_image_detections(tx, marts)?;
  Ok(())
}

fn insert_dim_channels(tx: &Transaction<'_>, marts: &Marts) -> rusqlite::Result<()> {
  let mut stmt = tx.prepare(
    "INSERT INTO dim_channels VALUES
       (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
  )?;
  for c in &marts.dim_channels {
    stmt.execute(params![
      c.channel_key,
      c.channel_name,
      c.total_messages,
      c.total_views,
      c.total_forwards,
      c.total_replies,
      c.avg_views_per_message,
      c.avg_forwards_per_message,
      c.avg_replies_per_message,
      c.overall_forward_rate,
      encode_day(c.first_message_date),
      encode_day(c.last_message_date),
      c.active_days,
      c.media_message_pct,
      c.empty_message_pct,
      c.channel_activity_level.as_str(),
      c.channel_reach_category.as_str(),
    ])?;
  }
  Ok(())
}

fn insert_dim_dates(tx: &Transaction<'_>, marts: &Marts) -> rusqlite::Result<()> {
  let mut stmt = tx.prepare(
    "INSERT INTO dim_dates VALUES
       (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
  )?;
  for d in &marts.dim_dates {
    stmt.execute(params![
      d.date_key,
      encode_day(d.date_day),
      d.year,
      d.month,
      d.day_of_month,
      d.quarter,
      d.day_of_week,
      d.day_of_year,
      d.week_of_year,
      d.month_name,
      d.day_name,
      d.year_month,
      d.is_weekend,
      d.is_weekday,
    ])?;
  }
  Ok(())
}

fn insert_dim_objects(tx: &Transaction<'_>, marts: &Marts) -> rusqlite::Result<()> {
  let mut stmt = tx.prepare(
    "INSERT INTO dim_objects VALUES
       (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
  )?;
  for o in &marts.dim_objects {
    stmt.execute(params![
      o.object_key,
      o.object_class,
      o.object_category.as_str(),
      o.total_detections,
      o.messages_with_object,
      o.channels_with_object,
      o.avg_confidence,
      o.min_confidence,
      o.max_confidence,
      o.high_confidence_detections,
      o.avg_bbox_area,
      o.importance_score,
      o.frequency_category.as_str(),
    ])?;
  }
  Ok(())
}

fn insert_fct_messages(tx: &Transaction<'_>, marts: &Marts) -> rusqlite::Result<()> {
  let mut stmt = tx.prepare(
    "INSERT INTO fct_messages VALUES
       (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
        ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
  )?;
  for f in &marts.fct_messages {
    stmt.execute(params![
      f.message_id,
      f.channel_key,
      f.date_key,
      f.channel_name,
      encode_ts(f.message_date),
      f.message_text,
      f.message_length,
      f.word_count,
      f.view_count,
      f.forward_count,
      f.reply_count,
      f.has_media,
      f.message_type.as_str(),
      f.is_empty_message,
      f.forward_rate,
      f.reply_rate,
      f.engagement_score,
      f.reach_category.as_str(),
      f.virality_category.as_str(),
      f.interaction_category.as_str(),
      f.time_of_day.as_str(),
      f.content_length_category.as_str(),
      f.has_no_engagement,
      f.is_engaging_content,
    ])?;
  }
  Ok(())
}

fn insert_fct_image_detections(
  tx: &Transaction<'_>,
  marts: &Marts,
) -> rusqlite::Result<()> {
  let mut stmt = tx.prepare(
    "INSERT INTO fct_image_detections VALUES
       (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
        ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
  )?;
  for d in &marts.fct_image_detections {
    stmt.execute(params![
      d.detection_id,
      d.message_id,
      d.channel_key,
      d.date_key,
      d.object_key,
      d.object_class,
      d.confidence_score,
      d.confidence_level.as_str(),
      d.detection_score,
      d.bbox_x1,
      d.bbox_y1,
      d.bbox_x2,
      d.bbox_y2,
      d.bbox_area,
      d.bbox_center_x,
      d.bbox_center_y,
      d.image_path,
      d.image_hash,
      d.model_version,
      d.detection_date.map(encode_ts),
      d.message_date.map(encode_ts),
      d.engagement_score,
    ])?;
  }
  Ok(())
}
