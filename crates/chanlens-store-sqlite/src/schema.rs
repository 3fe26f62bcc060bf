//! SQL schema for the chanlens SQLite warehouse.
//!
//! Two layers: append-only `raw_*` landing tables, and the mart tables that
//! are replaced wholesale on every transform run.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Raw layer. Rows are appended as scraped; never updated.
CREATE TABLE IF NOT EXISTS raw_telegram_messages (
    row_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    id         INTEGER,
    channel    TEXT,
    date       TEXT,
    text       TEXT,
    views      INTEGER,
    forwards   INTEGER,
    replies    INTEGER,
    has_media  INTEGER,
    scraped_at TEXT,
    loaded_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS raw_image_detections (
    row_id                INTEGER PRIMARY KEY AUTOINCREMENT,
    id                    INTEGER,
    image_path            TEXT,
    image_hash            TEXT,
    message_id            INTEGER,
    channel_name          TEXT,
    detected_object_class TEXT,
    confidence_score      REAL,
    bbox_x1               REAL,
    bbox_y1               REAL,
    bbox_x2               REAL,
    bbox_y2               REAL,
    detection_date        TEXT,
    model_version         TEXT,
    loaded_at             TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- Marts. Dates are 'YYYY-MM-DD', timestamps 'YYYY-MM-DD HH:MM:SS[.f]',
-- labels their snake_case names.
CREATE TABLE IF NOT EXISTS dim_channels (
    channel_key              TEXT PRIMARY KEY,
    channel_name             TEXT NOT NULL UNIQUE,
    total_messages           INTEGER NOT NULL,
    total_views              INTEGER NOT NULL,
    total_forwards           INTEGER NOT NULL,
    total_replies            INTEGER NOT NULL,
    avg_views_per_message    REAL NOT NULL,
    avg_forwards_per_message REAL NOT NULL,
    avg_replies_per_message  REAL NOT NULL,
    overall_forward_rate     REAL NOT NULL,
    first_message_date       TEXT NOT NULL,
    last_message_date        TEXT NOT NULL,
    active_days              INTEGER NOT NULL,
    media_message_pct        REAL NOT NULL,
    empty_message_pct        REAL NOT NULL,
    channel_activity_level   TEXT NOT NULL,
    channel_reach_category   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dim_dates (
    date_key     TEXT PRIMARY KEY,
    date_day     TEXT NOT NULL UNIQUE,
    year         INTEGER NOT NULL,
    month        INTEGER NOT NULL,
    day_of_month INTEGER NOT NULL,
    quarter      INTEGER NOT NULL,
    day_of_week  INTEGER NOT NULL,  -- ISO, Monday = 1
    day_of_year  INTEGER NOT NULL,
    week_of_year INTEGER NOT NULL,
    month_name   TEXT NOT NULL,
    day_name     TEXT NOT NULL,
    year_month   TEXT NOT NULL,
    is_weekend   INTEGER NOT NULL,
    is_weekday   INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS dim_objects (
    object_key                 TEXT PRIMARY KEY,
    object_class               TEXT NOT NULL UNIQUE,
    object_category            TEXT NOT NULL,
    total_detections           INTEGER NOT NULL,
    messages_with_object       INTEGER NOT NULL,
    channels_with_object       INTEGER NOT NULL,
    avg_confidence             REAL NOT NULL,
    min_confidence             REAL NOT NULL,
    max_confidence             REAL NOT NULL,
    high_confidence_detections INTEGER NOT NULL,
    avg_bbox_area              REAL NOT NULL,
    importance_score           REAL NOT NULL,
    frequency_category         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS fct_messages (
    message_id              INTEGER PRIMARY KEY,
    channel_key             TEXT REFERENCES dim_channels(channel_key),
    date_key                TEXT REFERENCES dim_dates(date_key),
    channel_name            TEXT NOT NULL,
    message_date            TEXT NOT NULL,
    message_text            TEXT NOT NULL,
    message_length          INTEGER NOT NULL,
    word_count              INTEGER NOT NULL,
    view_count              INTEGER NOT NULL,
    forward_count           INTEGER NOT NULL,
    reply_count             INTEGER NOT NULL,
    has_media               INTEGER NOT NULL,
    message_type            TEXT NOT NULL,
    is_empty_message        INTEGER NOT NULL,
    forward_rate            REAL NOT NULL,
    reply_rate              REAL NOT NULL,
    engagement_score        REAL NOT NULL,
    reach_category          TEXT NOT NULL,
    virality_category       TEXT NOT NULL,
    interaction_category    TEXT NOT NULL,
    time_of_day             TEXT NOT NULL,
    content_length_category TEXT NOT NULL,
    has_no_engagement       INTEGER NOT NULL,
    is_engaging_content     INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS fct_image_detections (
    detection_id     INTEGER PRIMARY KEY,
    message_id       INTEGER NOT NULL,   -- may reference a message with no fact row
    channel_key      TEXT REFERENCES dim_channels(channel_key),
    date_key         TEXT REFERENCES dim_dates(date_key),
    object_key       TEXT NOT NULL REFERENCES dim_objects(object_key),
    object_class     TEXT NOT NULL,
    confidence_score REAL NOT NULL,
    confidence_level TEXT NOT NULL,
    detection_score  REAL NOT NULL,
    bbox_x1          REAL NOT NULL,
    bbox_y1          REAL NOT NULL,
    bbox_x2          REAL NOT NULL,
    bbox_y2          REAL NOT NULL,
    bbox_area        REAL NOT NULL,
    bbox_center_x    REAL NOT NULL,
    bbox_center_y    REAL NOT NULL,
    image_path       TEXT,
    image_hash       TEXT,
    model_version    TEXT NOT NULL,
    detection_date   TEXT,
    message_date     TEXT,
    engagement_score REAL
);

CREATE INDEX IF NOT EXISTS raw_messages_id_idx       ON raw_telegram_messages(id);
CREATE INDEX IF NOT EXISTS fct_messages_channel_idx  ON fct_messages(channel_key);
CREATE INDEX IF NOT EXISTS fct_messages_date_idx     ON fct_messages(date_key);
CREATE INDEX IF NOT EXISTS fct_detections_class_idx  ON fct_image_detections(object_class);
CREATE INDEX IF NOT EXISTS fct_detections_msg_idx    ON fct_image_detections(message_id);

PRAGMA user_version = 1;
";

/// Mart tables, in the order they are cleared on replacement.
pub const MART_TABLES: &[&str] = &[
  "fct_image_detections",
  "fct_messages",
  "dim_objects",
  "dim_dates",
  "dim_channels",
];
