use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::error::Result;
use crate::record::ImageId;

use super::images::parse_time;
use super::Store;

/// One sky brightness reading, in magnitudes per square arcsecond.
#[derive(Clone, Debug, PartialEq)]
pub struct SkySample {
    pub image_id: ImageId,
    pub capture_time: DateTime<Utc>,
    /// Capture time at the site.
    pub local_time: NaiveDateTime,
    pub mpsas: f64,
}

impl Store {
    /// Sky brightness readings of one night, in capture order. Images
    /// without a reading are skipped.
    pub fn sky_brightness(&self, night: NaiveDate) -> Result<Vec<SkySample>> {
        let key = night.format("%Y-%m-%d").to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, create_time, timezone_offset, sky_brightness FROM images
                 WHERE id IN (SELECT image_id FROM night_session_images WHERE session_date = ?1)
                   AND sky_brightness IS NOT NULL
                 ORDER BY create_time, id",
            )?;
            let samples = stmt
                .query_map([key], |row| {
                    let time: String = row.get(1)?;
                    let capture_time = parse_time(1, &time)?;
                    let offset: f64 = row.get(2)?;
                    Ok(SkySample {
                        image_id: row.get(0)?,
                        capture_time,
                        local_time: capture_time.naive_utc()
                            + Duration::seconds((offset * 3600.0).round() as i64),
                        mpsas: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(samples)
        })
    }

    /// Most recent night in the catalog.
    pub fn latest_session(&self) -> Result<Option<NaiveDate>> {
        Ok(self.night_sessions()?.last().map(|s| s.date))
    }
}
