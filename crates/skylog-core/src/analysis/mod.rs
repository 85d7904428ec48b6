//! Per-image quality metrics on raw or calibrated pixels.

pub mod components;
pub mod detector;
pub mod metrics;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::calibration::Calibrator;
use crate::config::AnalysisConfig;
use crate::error::{Result, SkylogError};
use crate::frame::Frame;
use crate::io::read_pixels;
use crate::progress::{ProgressReporter, Stage};
use crate::record::{AnalysisMetrics, AnalysisResult, ImageId};
use crate::store::Store;

pub use detector::{Detection, Star, StarDetector, StarFit, ThresholdStarDetector};
pub use metrics::measure;

/// Outcome of analyzing several images. One failure never stops the rest.
#[derive(Debug, Default)]
pub struct AnalysisReport {
    pub succeeded: Vec<AnalysisResult>,
    pub failed: Vec<(ImageId, SkylogError)>,
}

/// Feeds pixels to a [`StarDetector`] and persists the metrics.
pub struct ImageAnalysis {
    store: Store,
    detector: Box<dyn StarDetector>,
    max_stars: usize,
    calibrator: Option<Calibrator>,
}

impl ImageAnalysis {
    pub fn new(store: Store, config: &AnalysisConfig) -> Self {
        Self::with_detector(
            store,
            Box::new(ThresholdStarDetector {
                sigma: config.detection_sigma,
                fit_box: config.fit_box,
                min_area: config.min_star_area,
            }),
            config.max_fwhm_stars,
        )
    }

    pub fn with_detector(store: Store, detector: Box<dyn StarDetector>, max_stars: usize) -> Self {
        Self {
            store,
            detector,
            max_stars,
            calibrator: None,
        }
    }

    /// Enable the calibrated path.
    pub fn with_calibrator(mut self, calibrator: Calibrator) -> Self {
        self.calibrator = Some(calibrator);
        self
    }

    /// Metrics of one frame. Nothing is persisted.
    pub fn analyze_frame(&self, image_id: ImageId, frame: &Frame) -> Result<AnalysisMetrics> {
        let plane = frame.plane()?;
        measure(&plane, self.detector.as_ref(), self.max_stars)
            .ok_or(SkylogError::NoStarsDetected { image_id })
    }

    /// Analyze one stored image and upsert its result. With `calibrate`,
    /// calibration failures propagate instead of falling back to raw pixels.
    pub fn analyze(&self, image_id: ImageId, calibrate: bool) -> Result<AnalysisResult> {
        let frame = if calibrate {
            let calibrator = self
                .calibrator
                .as_ref()
                .ok_or(SkylogError::NotConfigured("calibration"))?;
            calibrator.calibrated_frame(image_id)?
        } else {
            let image = self.store.image(image_id)?;
            read_pixels(Path::new(&image.record.filename))?
        };

        let metrics = self.analyze_frame(image_id, &frame)?;
        self.store.upsert_analysis(image_id, metrics.clone())?;
        Ok(AnalysisResult { image_id, metrics })
    }

    /// Analyze several images in parallel.
    pub fn analyze_many(
        &self,
        ids: &[ImageId],
        calibrate: bool,
        reporter: &dyn ProgressReporter,
    ) -> AnalysisReport {
        reporter.begin_stage(Stage::Analyze, Some(ids.len()));
        let done = AtomicUsize::new(0);

        let outcomes: Vec<(ImageId, Result<AnalysisResult>)> = ids
            .par_iter()
            .map(|&id| {
                let outcome = self.analyze(id, calibrate);
                reporter.advance(done.fetch_add(1, Ordering::Relaxed) + 1);
                (id, outcome)
            })
            .collect();
        reporter.finish_stage();

        let mut report = AnalysisReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(result) => report.succeeded.push(result),
                Err(e) => {
                    warn!(image = id, error = %e, "analysis failed");
                    report.failed.push((id, e));
                }
            }
        }
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "analysis finished"
        );
        report
    }
}
