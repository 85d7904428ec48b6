use ndarray::{Array2, ArrayView2};

use crate::consts::{
    DEFAULT_DETECTION_SIGMA, DEFAULT_FIT_BOX, DEFAULT_MIN_STAR_AREA, EPSILON, GAUSSIAN_FWHM_FACTOR,
};
use crate::stack::stats::compute_median;

use super::components::{connected_components, touches_border};

/// A detected star.
#[derive(Clone, Debug, PartialEq)]
pub struct Star {
    /// Centroid column, pixels.
    pub x: f64,
    /// Centroid row, pixels.
    pub y: f64,
    /// Background-subtracted flux.
    pub flux: f64,
    pub peak: f64,
    pub area: usize,
}

/// Stars of one image plus the background they were measured against.
#[derive(Clone, Debug, Default)]
pub struct Detection {
    pub background: f64,
    pub noise: f64,
    /// In detection order.
    pub stars: Vec<Star>,
}

/// Shape of one fitted star.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StarFit {
    pub fwhm: f64,
    /// 0 for a round star, approaching 1 as it elongates.
    pub eccentricity: f64,
}

/// Star detection and per-star FWHM fitting.
pub trait StarDetector: Send + Sync {
    fn detect(&self, plane: &ArrayView2<'_, f32>) -> Detection;

    /// `None` when the star cannot be fitted (e.g. no signal in the window).
    fn fit_fwhm(&self, plane: &ArrayView2<'_, f32>, detection: &Detection, star: &Star)
        -> Option<StarFit>;
}

/// Median background, k-sigma threshold, 4-connected blobs and
/// second-moment shape fitting.
#[derive(Clone, Debug)]
pub struct ThresholdStarDetector {
    /// Threshold above background in noise standard deviations.
    pub sigma: f32,
    /// Side of the square fitting window.
    pub fit_box: usize,
    pub min_area: usize,
}

impl Default for ThresholdStarDetector {
    fn default() -> Self {
        Self {
            sigma: DEFAULT_DETECTION_SIGMA,
            fit_box: DEFAULT_FIT_BOX,
            min_area: DEFAULT_MIN_STAR_AREA,
        }
    }
}

/// Median and robust standard deviation (scaled MAD, falling back to the
/// plain standard deviation when more than half the pixels are identical).
pub fn background_level(plane: &ArrayView2<'_, f32>) -> (f64, f64) {
    let mut values: Vec<f32> = plane.iter().copied().collect();
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let median = compute_median(&mut values);
    let mut deviations: Vec<f32> = values.iter().map(|v| (v - median).abs()).collect();
    let mad = compute_median(&mut deviations) as f64 * 1.4826;
    if mad > EPSILON as f64 {
        return (median as f64, mad);
    }

    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
    (median as f64, var.sqrt())
}

impl StarDetector for ThresholdStarDetector {
    fn detect(&self, plane: &ArrayView2<'_, f32>) -> Detection {
        let (h, w) = plane.dim();
        let (background, noise) = background_level(plane);
        let threshold = (background + self.sigma as f64 * noise) as f32;

        let mask = Array2::from_shape_fn((h, w), |(r, c)| plane[[r, c]] > threshold);
        let stars = connected_components(&mask, plane, background as f32)
            .into_iter()
            .filter(|c| c.area >= self.min_area && !touches_border(c.bbox, h, w))
            .map(|c| Star {
                x: c.centroid.1,
                y: c.centroid.0,
                flux: c.flux,
                peak: c.peak as f64,
                area: c.area,
            })
            .collect();

        Detection {
            background,
            noise,
            stars,
        }
    }

    fn fit_fwhm(
        &self,
        plane: &ArrayView2<'_, f32>,
        detection: &Detection,
        star: &Star,
    ) -> Option<StarFit> {
        let (h, w) = plane.dim();
        let half = (self.fit_box / 2) as isize;
        let cy = star.y.round() as isize;
        let cx = star.x.round() as isize;

        let r0 = (cy - half).max(0) as usize;
        let r1 = ((cy + half) as usize).min(h.checked_sub(1)?);
        let c0 = (cx - half).max(0) as usize;
        let c1 = ((cx + half) as usize).min(w.checked_sub(1)?);

        // Flux-weighted centroid inside the window.
        let mut total = 0.0f64;
        let mut sum_r = 0.0f64;
        let mut sum_c = 0.0f64;
        for r in r0..=r1 {
            for c in c0..=c1 {
                let v = (plane[[r, c]] as f64 - detection.background).max(0.0);
                total += v;
                sum_r += v * r as f64;
                sum_c += v * c as f64;
            }
        }
        if total <= 0.0 {
            return None;
        }
        let (mr, mc) = (sum_r / total, sum_c / total);

        // Second central moments.
        let (mut mrr, mut mcc, mut mrc) = (0.0f64, 0.0f64, 0.0f64);
        for r in r0..=r1 {
            for c in c0..=c1 {
                let v = (plane[[r, c]] as f64 - detection.background).max(0.0);
                let dr = r as f64 - mr;
                let dc = c as f64 - mc;
                mrr += v * dr * dr;
                mcc += v * dc * dc;
                mrc += v * dr * dc;
            }
        }
        mrr /= total;
        mcc /= total;
        mrc /= total;

        // Eigenvalues of the covariance matrix.
        let mean = (mrr + mcc) / 2.0;
        let spread = (((mrr - mcc) / 2.0).powi(2) + mrc * mrc).sqrt();
        let major = mean + spread;
        let minor = (mean - spread).max(0.0);
        if major <= 0.0 {
            return None;
        }

        Some(StarFit {
            fwhm: GAUSSIAN_FWHM_FACTOR * mean.sqrt(),
            eccentricity: (1.0 - minor / major).max(0.0).sqrt(),
        })
    }
}
