use rusqlite::{params, OptionalExtension};

use crate::error::Result;
use crate::record::{AnalysisMetrics, AnalysisResult, ImageId};

use super::Store;

impl Store {
    /// Insert or replace the analysis row of one image.
    pub fn upsert_analysis(&self, image_id: ImageId, metrics: AnalysisMetrics) -> Result<()> {
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO image_analysis (image_id, fwhm, snr, eccentricity, median, stars_detected)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(image_id) DO UPDATE SET
                     fwhm = excluded.fwhm,
                     snr = excluded.snr,
                     eccentricity = excluded.eccentricity,
                     median = excluded.median,
                     stars_detected = excluded.stars_detected,
                     analyzed_at = CURRENT_TIMESTAMP",
                params![
                    image_id,
                    metrics.fwhm,
                    metrics.snr,
                    metrics.eccentricity,
                    metrics.median,
                    metrics.stars_detected as i64,
                ],
            )?;
            Ok(())
        })
    }

    pub fn analysis(&self, image_id: ImageId) -> Result<Option<AnalysisResult>> {
        self.call(move |conn| {
            let row = conn
                .query_row(
                    "SELECT fwhm, snr, eccentricity, median, stars_detected
                     FROM image_analysis WHERE image_id = ?1",
                    [image_id],
                    |row| {
                        Ok(AnalysisMetrics {
                            fwhm: row.get(0)?,
                            snr: row.get(1)?,
                            eccentricity: row.get(2)?,
                            median: row.get(3)?,
                            stars_detected: row.get::<_, i64>(4)? as usize,
                        })
                    },
                )
                .optional()?;
            Ok(row.map(|metrics| AnalysisResult { image_id, metrics }))
        })
    }

    pub fn analysis_count(&self) -> Result<usize> {
        self.call(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM image_analysis", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }
}
