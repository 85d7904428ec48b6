use ndarray::ArrayView2;

use crate::record::AnalysisMetrics;
use crate::stack::stats::{compute_median, median_f64};

use super::detector::StarDetector;

/// Measure one plane. `None` when no star was detected or none of the
/// first `max_stars` could be fitted.
///
/// FWHM and eccentricity are medians over the fitted stars; SNR is the
/// median of `(peak - background) / noise`; `median` is the image median.
pub fn measure(
    plane: &ArrayView2<'_, f32>,
    detector: &dyn StarDetector,
    max_stars: usize,
) -> Option<AnalysisMetrics> {
    let detection = detector.detect(plane);
    if detection.stars.is_empty() {
        return None;
    }

    let mut fwhms = Vec::new();
    let mut eccentricities = Vec::new();
    let mut snrs = Vec::new();
    let noise = detection.noise.max(f64::EPSILON);
    for star in detection.stars.iter().take(max_stars) {
        let Some(fit) = detector.fit_fwhm(plane, &detection, star) else {
            continue;
        };
        fwhms.push(fit.fwhm);
        eccentricities.push(fit.eccentricity);
        snrs.push((star.peak - detection.background) / noise);
    }

    let mut pixels: Vec<f32> = plane.iter().copied().collect();
    Some(AnalysisMetrics {
        fwhm: median_f64(&fwhms)?,
        snr: median_f64(&snrs)?,
        eccentricity: median_f64(&eccentricities)?,
        median: compute_median(&mut pixels) as f64,
        stars_detected: detection.stars.len(),
    })
}
