use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::consts::BACKFILL_WINDOW_HOURS;
use crate::error::{Result, SkylogError};
use crate::record::{ImageId, ImageRecord, ImageType, OffsetOrigin, StoredImage};

use super::Store;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const IMAGE_COLUMNS: &str = "id, filename, create_time, latitude, longitude, timezone_offset, \
     offset_origin, width, height, pixel_size, plate_scale, target, ra, dec, instrument, \
     telescope, filter_name, image_type, exposure_time, focal_length, ambient_temperature, \
     sensor_temperature, gain, bias_offset, sky_brightness, airmass";

const INSERT_IMAGE: &str = "INSERT OR FAIL INTO images (filename, create_time, latitude, \
     longitude, timezone_offset, offset_origin, width, height, pixel_size, plate_scale, target, \
     ra, dec, instrument, telescope, filter_name, image_type, exposure_time, focal_length, \
     ambient_temperature, sensor_temperature, gain, bias_offset, sky_brightness, airmass) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, \
     ?19, ?20, ?21, ?22, ?23, ?24, ?25)";

/// For each record without an offset, the nearest known offset within the
/// window from a record of the same instrument. Dark and bias
/// classes substitute a filter match for the telescope match; a dark or
/// bias with no filter accepts any source filter.
const BACKFILL_OFFSETS: &str = r#"
WITH ranked AS (
    SELECT t.id AS target_id,
           s.timezone_offset AS offset_hours,
           ROW_NUMBER() OVER (
               PARTITION BY t.id
               ORDER BY abs(julianday(s.create_time) - julianday(t.create_time)), s.id
           ) AS nearest
    FROM images t
    JOIN images s
      ON s.id != t.id
     AND s.timezone_offset IS NOT NULL
     AND s.instrument IS t.instrument
     AND abs(julianday(s.create_time) - julianday(t.create_time)) <= ?1
     AND CASE
             WHEN t.image_type IN ('DARK', 'BIAS', 'MASTER_DARK', 'MASTER_BIAS')
                 THEN t.filter_name IS NULL OR s.filter_name IS t.filter_name
             ELSE s.telescope IS t.telescope
         END
    WHERE t.timezone_offset IS NULL
)
UPDATE images
SET timezone_offset = ranked.offset_hours,
    offset_origin = 'backfill'
FROM ranked
WHERE ranked.target_id = images.id
  AND ranked.nearest = 1
"#;

/// One row of the `night_sessions` view.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub date: NaiveDate,
    pub image_count: usize,
    pub light_count: usize,
    pub first_capture: DateTime<Utc>,
    pub last_capture: DateTime<Utc>,
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub(super) fn parse_time(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .map(|t| t.and_utc())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(super) fn parse_date(idx: usize, value: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_image(row: &Row<'_>) -> rusqlite::Result<StoredImage> {
    let create_time: String = row.get(2)?;
    let origin: Option<String> = row.get(6)?;
    let image_type: Option<String> = row.get(17)?;

    let mut record = ImageRecord::new(row.get::<_, String>(1)?, parse_time(2, &create_time)?);
    record.latitude = row.get(3)?;
    record.longitude = row.get(4)?;
    record.timezone_offset = row.get(5)?;
    record.offset_origin = origin.as_deref().and_then(OffsetOrigin::from_tag);
    record.width = row.get(7)?;
    record.height = row.get(8)?;
    record.pixel_size = row.get(9)?;
    record.plate_scale = row.get(10)?;
    record.target = row.get(11)?;
    record.ra = row.get(12)?;
    record.dec = row.get(13)?;
    record.instrument = row.get(14)?;
    record.telescope = row.get(15)?;
    record.filter = row.get(16)?;
    record.image_type = image_type.as_deref().and_then(ImageType::from_tag);
    record.exposure_time = row.get(18)?;
    record.focal_length = row.get(19)?;
    record.ambient_temperature = row.get(20)?;
    record.sensor_temperature = row.get(21)?;
    record.gain = row.get(22)?;
    record.offset = row.get(23)?;
    record.sky_brightness = row.get(24)?;
    record.airmass = row.get(25)?;

    Ok(StoredImage {
        id: row.get(0)?,
        record,
    })
}

fn insert_one(conn: &Connection, r: &ImageRecord) -> rusqlite::Result<usize> {
    conn.execute(
        INSERT_IMAGE,
        params![
            r.filename,
            format_time(&r.capture_time),
            r.latitude,
            r.longitude,
            r.timezone_offset,
            r.offset_origin.map(|o| o.as_str()),
            r.width,
            r.height,
            r.pixel_size,
            r.plate_scale,
            r.target,
            r.ra,
            r.dec,
            r.instrument,
            r.telescope,
            r.filter,
            r.image_type.map(|t| t.as_str()),
            r.exposure_time,
            r.focal_length,
            r.ambient_temperature,
            r.sensor_temperature,
            r.gain,
            r.offset,
            r.sky_brightness,
            r.airmass,
        ],
    )
}

pub(super) fn query_images<P: rusqlite::Params>(
    conn: &Connection,
    filter: &str,
    params: P,
) -> Result<Vec<StoredImage>> {
    let sql = format!("SELECT {IMAGE_COLUMNS} FROM images {filter}");
    let mut stmt = conn.prepare(&sql)?;
    let images = stmt
        .query_map(params, row_to_image)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(images)
}

impl Store {
    /// Insert a batch in one transaction. Any failure (e.g. a duplicate
    /// filename) rolls back the whole batch.
    pub fn insert_images(&self, records: Vec<ImageRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        self.call(move |conn| {
            let tx = conn.transaction()?;
            for record in &records {
                insert_one(&tx, record)?;
            }
            tx.commit()?;
            debug!(count = records.len(), "inserted image batch");
            Ok(records.len())
        })
    }

    /// Add filenames to the attempted-files ledger.
    pub fn mark_attempted(&self, filenames: Vec<String>) -> Result<()> {
        if filenames.is_empty() {
            return Ok(());
        }
        self.call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare("INSERT OR IGNORE INTO attempted_files (filename) VALUES (?1)")?;
                for name in &filenames {
                    stmt.execute([name])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Every filename already attempted or ingested.
    pub fn known_filenames(&self) -> Result<HashSet<String>> {
        self.call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT filename FROM attempted_files UNION SELECT filename FROM images",
            )?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<HashSet<_>>>()?;
            Ok(names)
        })
    }

    /// Copy offsets onto records that lack one, repeating until nothing
    /// changes so backfilled offsets can seed further records. Returns the
    /// number of rows updated; a second call over unchanged data updates
    /// nothing.
    pub fn backfill_timezones(&self) -> Result<usize> {
        let window_days = BACKFILL_WINDOW_HOURS as f64 / 24.0;
        let updated = self.call(move |conn| {
            let tx = conn.transaction()?;
            let mut total = 0;
            loop {
                let changed = tx.execute(BACKFILL_OFFSETS, [window_days])?;
                if changed == 0 {
                    break;
                }
                total += changed;
            }
            tx.commit()?;
            Ok(total)
        })?;
        if updated > 0 {
            info!(updated, "backfilled timezone offsets");
        }
        Ok(updated)
    }

    pub fn image(&self, id: ImageId) -> Result<StoredImage> {
        self.call(move |conn| {
            query_images(conn, "WHERE id = ?1", [id])?
                .into_iter()
                .next()
                .ok_or(SkylogError::ImageNotFound(id))
        })
    }

    pub fn image_by_filename(&self, filename: &str) -> Result<Option<StoredImage>> {
        let filename = filename.to_string();
        self.call(move |conn| {
            Ok(query_images(conn, "WHERE filename = ?1", [filename])?
                .into_iter()
                .next())
        })
    }

    pub fn all_images(&self) -> Result<Vec<StoredImage>> {
        self.call(|conn| query_images(conn, "ORDER BY create_time, id", []))
    }

    pub fn images_by_type(&self, image_type: ImageType) -> Result<Vec<StoredImage>> {
        self.call(move |conn| {
            query_images(
                conn,
                "WHERE image_type = ?1 ORDER BY create_time, id",
                [image_type.as_str()],
            )
        })
    }

    /// Frames of one calibration class taken with the given instrument.
    /// Field matching beyond the instrument is left to the resolver.
    pub fn calibration_candidates(
        &self,
        image_type: ImageType,
        instrument: Option<String>,
    ) -> Result<Vec<StoredImage>> {
        self.call(move |conn| {
            query_images(
                conn,
                "WHERE image_type = ?1 AND instrument IS ?2 ORDER BY create_time, id",
                params![image_type.as_str(), instrument],
            )
        })
    }

    /// Night sessions, oldest first.
    pub fn night_sessions(&self) -> Result<Vec<SessionSummary>> {
        self.call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT session_date, image_count, light_count, first_capture, last_capture \
                 FROM night_sessions ORDER BY session_date",
            )?;
            let sessions = stmt
                .query_map([], |row| {
                    let date: String = row.get(0)?;
                    let first: String = row.get(3)?;
                    let last: String = row.get(4)?;
                    Ok(SessionSummary {
                        date: parse_date(0, &date)?,
                        image_count: row.get::<_, i64>(1)? as usize,
                        light_count: row.get::<_, i64>(2)? as usize,
                        first_capture: parse_time(3, &first)?,
                        last_capture: parse_time(4, &last)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(sessions)
        })
    }

    /// Images of one night, in capture order.
    pub fn session_images(&self, date: NaiveDate) -> Result<Vec<StoredImage>> {
        let key = date.format("%Y-%m-%d").to_string();
        self.call(move |conn| {
            query_images(
                conn,
                "WHERE id IN (SELECT image_id FROM night_session_images WHERE session_date = ?1) \
                 ORDER BY create_time, id",
                [key],
            )
        })
    }

    /// Session key of one image as the store derives it.
    pub fn session_of(&self, id: ImageId) -> Result<Option<NaiveDate>> {
        self.call(move |conn| {
            let date: Option<String> = conn
                .query_row(
                    "SELECT session_date FROM night_session_images WHERE image_id = ?1",
                    [id],
                    |row| row.get(0),
                )
                .optional()?;
            match date {
                Some(d) => Ok(Some(parse_date(0, &d)?)),
                None => Ok(None),
            }
        })
    }
}

