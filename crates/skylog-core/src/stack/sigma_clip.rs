use ndarray::{ArrayD, IxDyn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::{EPSILON, PARALLEL_PIXEL_THRESHOLD};
use crate::error::{Result, SkylogError};
use crate::frame::Frame;

use super::stats::mean_stddev;

/// Parameters for sigma-clipped mean stacking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigmaClipParams {
    /// Number of rejection iterations (default: 2).
    pub iterations: usize,
    /// Values beyond mean +/- sigma * stddev are rejected (default: 2.5).
    pub sigma: f32,
}

impl Default for SigmaClipParams {
    fn default() -> Self {
        Self {
            iterations: 2,
            sigma: 2.5,
        }
    }
}

/// Stack frames using sigma-clipped mean.
///
/// Per pixel: compute mean and stddev, reject values more than `sigma` standard
/// deviations from the mean, then recompute the mean from remaining values.
/// Repeat for the configured number of iterations. Frames may have any
/// shape as long as they all agree.
pub fn sigma_clip_stack(frames: &[Frame], params: &SigmaClipParams) -> Result<Frame> {
    let first = frames.first().ok_or(SkylogError::EmptySequence)?;
    let shape = first.shape().to_vec();
    for frame in &frames[1..] {
        if frame.shape() != shape.as_slice() {
            return Err(SkylogError::ShapeMismatch {
                frame: shape,
                calibration: frame.shape().to_vec(),
            });
        }
    }

    let planes: Vec<Vec<f32>> = frames
        .iter()
        .map(|f| f.data.iter().copied().collect())
        .collect();
    let pixels = planes[0].len();
    // One work unit per image row, including all of its channels.
    let row_len = shape.iter().skip(1).product::<usize>().max(1);

    let mut result = vec![0.0f32; pixels];
    let fill_row = |(row, out): (usize, &mut [f32])| {
        let n = planes.len();
        let mut values = vec![0.0f32; n];
        let mut mask = vec![true; n];
        for (col, slot) in out.iter_mut().enumerate() {
            let idx = row * row_len + col;
            for (i, plane) in planes.iter().enumerate() {
                values[i] = plane[idx];
            }
            *slot = clipped_mean(&values, &mut mask, params);
        }
    };

    if pixels >= PARALLEL_PIXEL_THRESHOLD && frames.len() > 1 {
        result
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(fill_row);
    } else {
        result.chunks_mut(row_len).enumerate().for_each(fill_row);
    }

    let data = ArrayD::from_shape_vec(IxDyn(&shape), result)
        .map_err(|_| SkylogError::ShapeMismatch {
            frame: shape.clone(),
            calibration: shape.clone(),
        })?;
    let mut stacked = Frame::new(data);
    stacked.exposure_time = first.exposure_time;
    Ok(stacked)
}

fn clipped_mean(values: &[f32], mask: &mut [bool], params: &SigmaClipParams) -> f32 {
    let n = values.len();
    mask.iter_mut().for_each(|m| *m = true);

    for _ in 0..params.iterations {
        let (mean, stddev) = mean_stddev(values, mask);
        if stddev < EPSILON {
            break;
        }
        let lo = mean - params.sigma * stddev;
        let hi = mean + params.sigma * stddev;
        for i in 0..n {
            if mask[i] && (values[i] < lo || values[i] > hi) {
                mask[i] = false;
            }
        }
    }

    let mut sum = 0.0f32;
    let mut count = 0u32;
    for i in 0..n {
        if mask[i] {
            sum += values[i];
            count += 1;
        }
    }
    if count > 0 {
        sum / count as f32
    } else {
        // Everything rejected: fall back to the plain mean.
        values.iter().sum::<f32>() / n as f32
    }
}
