use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::error::{Result, SkylogError};
use crate::record::{CalibrationKind, ImageId, ImageRecord, ImageType, StoredImage};
use crate::store::Store;

use super::validity::ValidityWindow;

/// Calibration frames chosen for one light.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationSet {
    pub light: ImageId,
    pub master_bias: ImageId,
    pub master_dark: ImageId,
    pub session: NaiveDate,
    pub flats: Vec<ImageId>,
}

/// Bias frames must come from the same sensor in the same state.
pub fn bias_matches(light: &ImageRecord, candidate: &ImageRecord) -> bool {
    candidate.instrument == light.instrument
        && candidate.gain == light.gain
        && candidate.offset == light.offset
        && candidate.sensor_temperature == light.sensor_temperature
}

/// Darks additionally need the same exposure time.
pub fn dark_matches(light: &ImageRecord, candidate: &ImageRecord) -> bool {
    bias_matches(light, candidate) && candidate.exposure_time == light.exposure_time
}

/// Flats are matched by night, filter and optical train.
pub fn flat_matches(light: &ImageRecord, candidate: &ImageRecord) -> bool {
    candidate.image_type == Some(ImageType::Flat)
        && light.night_session().is_some()
        && candidate.night_session() == light.night_session()
        && candidate.filter == light.filter
        && candidate.telescope == light.telescope
        && candidate.instrument == light.instrument
}

fn time_distance(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    (a - b).num_milliseconds().abs()
}

/// Pick the master frame closest in time among the exact matches.
///
/// Every mandatory field must match; a closer candidate with any mismatch is
/// never chosen. The validity window, when given, is applied on top.
pub fn select_master<'a>(
    light: &ImageRecord,
    candidates: &'a [StoredImage],
    kind: CalibrationKind,
    validity: Option<&ValidityWindow>,
) -> Option<&'a StoredImage> {
    let fields_match = match kind {
        CalibrationKind::MasterBias => bias_matches,
        CalibrationKind::MasterDark => dark_matches,
        CalibrationKind::Flat => flat_matches,
    };
    candidates
        .iter()
        .filter(|c| fields_match(light, &c.record))
        .filter(|c| validity.map_or(true, |w| w.admits(c.record.capture_time, light.capture_time)))
        .min_by_key(|c| (time_distance(c.record.capture_time, light.capture_time), c.id))
}

/// Finds the bias, dark and flats for a light frame.
#[derive(Clone)]
pub struct CalibrationResolver {
    store: Store,
    validity: Option<ValidityWindow>,
}

impl CalibrationResolver {
    pub fn new(store: Store, validity: Option<ValidityWindow>) -> Self {
        Self { store, validity }
    }

    pub fn validity(&self) -> Option<&ValidityWindow> {
        self.validity.as_ref()
    }

    fn resolve_master(&self, light: &StoredImage, kind: CalibrationKind) -> Result<StoredImage> {
        let image_type = match kind {
            CalibrationKind::MasterBias => ImageType::MasterBias,
            CalibrationKind::MasterDark => ImageType::MasterDark,
            CalibrationKind::Flat => ImageType::Flat,
        };
        let candidates = self
            .store
            .calibration_candidates(image_type, light.record.instrument.clone())?;
        let chosen = select_master(&light.record, &candidates, kind, self.validity.as_ref())
            .cloned()
            .ok_or(SkylogError::NoCalibrationMatch {
                kind,
                image_id: light.id,
            })?;
        debug!(light = light.id, %kind, chosen = chosen.id, "resolved calibration frame");
        Ok(chosen)
    }

    pub fn resolve_master_bias(&self, light: &StoredImage) -> Result<StoredImage> {
        self.resolve_master(light, CalibrationKind::MasterBias)
    }

    pub fn resolve_master_dark(&self, light: &StoredImage) -> Result<StoredImage> {
        self.resolve_master(light, CalibrationKind::MasterDark)
    }

    /// Every flat of the light's night with the same filter, telescope and
    /// instrument, in capture order.
    pub fn resolve_flats(&self, light: &StoredImage) -> Result<Vec<StoredImage>> {
        let candidates = self
            .store
            .calibration_candidates(ImageType::Flat, light.record.instrument.clone())?;
        let flats: Vec<StoredImage> = candidates
            .into_iter()
            .filter(|c| flat_matches(&light.record, &c.record))
            .collect();
        if flats.is_empty() {
            return Err(SkylogError::NoCalibrationMatch {
                kind: CalibrationKind::Flat,
                image_id: light.id,
            });
        }
        Ok(flats)
    }

    /// Master bias nearest in time from the same instrument, used to
    /// bias-subtract flats. Sensor settings are not compared.
    pub fn flat_bias(&self, light: &StoredImage) -> Result<Option<StoredImage>> {
        let candidates = self
            .store
            .calibration_candidates(ImageType::MasterBias, light.record.instrument.clone())?;
        Ok(candidates
            .into_iter()
            .min_by_key(|c| (time_distance(c.record.capture_time, light.record.capture_time), c.id)))
    }

    /// Resolve everything for one light. Any missing class is an error.
    pub fn resolve(&self, light_id: ImageId) -> Result<CalibrationSet> {
        let light = self.store.image(light_id)?;
        let session = light
            .record
            .night_session()
            .ok_or(SkylogError::NoCalibrationMatch {
                kind: CalibrationKind::Flat,
                image_id: light_id,
            })?;
        let bias = self.resolve_master_bias(&light)?;
        let dark = self.resolve_master_dark(&light)?;
        let flats = self.resolve_flats(&light)?;
        Ok(CalibrationSet {
            light: light_id,
            master_bias: bias.id,
            master_dark: dark.id,
            session,
            flats: flats.into_iter().map(|f| f.id).collect(),
        })
    }
}
