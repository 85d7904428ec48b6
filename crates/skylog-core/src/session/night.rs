use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::consts::NIGHT_BOUNDARY_HOUR;
use crate::record::StoredImage;

/// Observing-night key: the local calendar date, with the day rolling over
/// at local noon rather than midnight.
///
/// The offset is rounded to whole seconds before it is applied.
pub fn night_key(capture_time: DateTime<Utc>, offset_hours: f64) -> NaiveDate {
    let offset = Duration::seconds((offset_hours * 3600.0).round() as i64);
    let local = capture_time.naive_utc() + offset;
    (local - Duration::hours(NIGHT_BOUNDARY_HOUR)).date()
}

/// One observing night and the images captured during it.
#[derive(Clone, Debug)]
pub struct NightSession {
    pub date: NaiveDate,
    pub images: Vec<StoredImage>,
}

impl NightSession {
    /// Distinct non-empty target names, in first-seen order.
    pub fn targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = Vec::new();
        for target in self.images.iter().filter_map(|i| i.record.target.as_deref()) {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        targets
    }
}

/// Group images by night key, oldest night first. Images without a
/// timezone offset have no session and are skipped.
pub fn group_sessions(images: impl IntoIterator<Item = StoredImage>) -> Vec<NightSession> {
    let mut nights: BTreeMap<NaiveDate, Vec<StoredImage>> = BTreeMap::new();
    for image in images {
        if let Some(date) = image.record.night_session() {
            nights.entry(date).or_default().push(image);
        }
    }
    nights
        .into_iter()
        .map(|(date, mut images)| {
            images.sort_by_key(|i| i.record.capture_time);
            NightSession { date, images }
        })
        .collect()
}
