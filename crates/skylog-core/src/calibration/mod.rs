pub mod cache;
pub mod engine;
pub mod resolver;
pub mod validity;

use std::path::Path;

use tracing::debug;

use crate::error::{Result, SkylogError};
use crate::frame::Frame;
use crate::io::read_pixels;
use crate::record::{CalibrationKind, ImageId};
use crate::stack::SigmaClipParams;
use crate::store::Store;

pub use cache::{FlatKey, MasterFlatCache, SessionCache};
pub use engine::{bias_subtract, calibrate, dark_subtract, flat_correct, flat_stack};
pub use resolver::{select_master, CalibrationResolver, CalibrationSet};
pub use validity::{ValidityWindow, WindowUnit};

/// Produces calibrated pixels for stored light frames.
pub struct Calibrator {
    store: Store,
    resolver: CalibrationResolver,
    flats: MasterFlatCache,
}

impl Calibrator {
    pub fn new(store: Store, validity: Option<ValidityWindow>, params: SigmaClipParams) -> Self {
        let resolver = CalibrationResolver::new(store.clone(), validity);
        Self {
            flats: MasterFlatCache::new(resolver.clone(), params),
            resolver,
            store,
        }
    }

    pub fn resolver(&self) -> &CalibrationResolver {
        &self.resolver
    }

    pub fn flat_cache(&self) -> &MasterFlatCache {
        &self.flats
    }

    /// Bias-, dark- and flat-corrected pixels of one light. A missing
    /// calibration frame is an error; there is no uncalibrated fallback.
    pub fn calibrated_frame(&self, light_id: ImageId) -> Result<Frame> {
        let light = self.store.image(light_id)?;
        let bias = self.resolver.resolve_master_bias(&light)?;
        let dark = self.resolver.resolve_master_dark(&light)?;
        let flat = self
            .flats
            .master_flat(&light)
            .ok_or(SkylogError::NoCalibrationMatch {
                kind: CalibrationKind::Flat,
                image_id: light_id,
            })?;

        let light_frame = read_pixels(Path::new(&light.record.filename))?;
        let bias_frame = read_pixels(Path::new(&bias.record.filename))?;
        let mut dark_frame = read_pixels(Path::new(&dark.record.filename))?;
        dark_frame.exposure_time = dark_frame.exposure_time.or(dark.record.exposure_time);

        let exposure_time = light
            .record
            .exposure_time
            .or(light_frame.exposure_time)
            .ok_or(SkylogError::MissingExposureTime("light"))?;

        debug!(light = light_id, bias = bias.id, dark = dark.id, "calibrating");
        calibrate(&light_frame, &bias_frame, &dark_frame, &flat, exposure_time)
    }
}
