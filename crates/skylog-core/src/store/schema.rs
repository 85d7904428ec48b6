use rusqlite::Connection;

use crate::error::Result;

/// Tables and derived views. Night-session membership is never stored;
/// both views compute it from `(create_time, timezone_offset)` with the
/// day boundary at local noon.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS images (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    filename            TEXT NOT NULL UNIQUE,
    create_time         TEXT NOT NULL,
    latitude            REAL,
    longitude           REAL,
    timezone_offset     REAL,
    offset_origin       TEXT,
    width               INTEGER,
    height              INTEGER,
    pixel_size          REAL,
    plate_scale         REAL,
    target              TEXT,
    ra                  REAL,
    dec                 REAL,
    instrument          TEXT,
    telescope           TEXT,
    filter_name         TEXT,
    image_type          TEXT,
    exposure_time       REAL,
    focal_length        REAL,
    ambient_temperature REAL,
    sensor_temperature  REAL,
    gain                REAL,
    bias_offset         REAL,
    sky_brightness      REAL,
    airmass             REAL
);

CREATE INDEX IF NOT EXISTS idx_images_type ON images(image_type, instrument);
CREATE INDEX IF NOT EXISTS idx_images_time ON images(create_time);

CREATE TABLE IF NOT EXISTS attempted_files (
    filename TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS image_analysis (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    image_id       INTEGER NOT NULL UNIQUE REFERENCES images(id),
    fwhm           REAL NOT NULL,
    snr            REAL NOT NULL,
    eccentricity   REAL NOT NULL,
    median         REAL NOT NULL,
    stars_detected INTEGER NOT NULL,
    analyzed_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS user_settings (
    item  TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE VIEW IF NOT EXISTS night_session_images AS
SELECT date(create_time, printf('%+.6f hours', timezone_offset - 12.0)) AS session_date,
       id AS image_id
FROM images
WHERE timezone_offset IS NOT NULL;

CREATE VIEW IF NOT EXISTS night_sessions AS
SELECT s.session_date                                AS session_date,
       COUNT(*)                                      AS image_count,
       SUM(CASE WHEN i.image_type = 'LIGHT' THEN 1 ELSE 0 END) AS light_count,
       MIN(i.create_time)                            AS first_capture,
       MAX(i.create_time)                            AS last_capture
FROM night_session_images s
JOIN images i ON i.id = s.image_id
GROUP BY s.session_date;
"#;

pub(super) fn initialize(conn: &mut Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
