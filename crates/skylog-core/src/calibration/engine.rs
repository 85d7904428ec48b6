//! Calibration arithmetic. Every function returns a new frame and leaves
//! its inputs untouched.

use ndarray::{ArrayD, Axis, IxDyn, Zip};

use crate::consts::EPSILON;
use crate::error::{Result, SkylogError};
use crate::frame::Frame;
use crate::stack::{sigma_clip_stack, SigmaClipParams};

/// Combine `frame` with a calibration array of compatible shape.
///
/// A singleton trailing axis on the calibration side is dropped when the
/// frame lacks it; a 2-D calibration is broadcast across frame channels.
fn combine(
    frame: &ArrayD<f32>,
    calibration: &ArrayD<f32>,
    op: impl Fn(f32, f32) -> f32 + Sync + Send,
) -> Result<ArrayD<f32>> {
    let target = frame.shape();
    let mismatch = || SkylogError::ShapeMismatch {
        frame: target.to_vec(),
        calibration: calibration.shape().to_vec(),
    };

    let mut view = calibration.view();
    while view.ndim() > target.len() && view.shape().last() == Some(&1) {
        let last = view.ndim() - 1;
        view = view.index_axis_move(Axis(last), 0);
    }
    while view.ndim() < target.len() {
        let next = view.ndim();
        view = view.insert_axis(Axis(next));
    }
    let aligned = view.broadcast(IxDyn(target)).ok_or_else(mismatch)?;

    Ok(Zip::from(frame)
        .and(&aligned)
        .map_collect(|&a, &b| op(a, b)))
}

/// Subtract `bias` pixel for pixel.
pub fn bias_subtract(frame: &Frame, bias: &Frame) -> Result<Frame> {
    let data = combine(&frame.data, &bias.data, |a, b| a - b)?;
    Ok(Frame {
        data,
        exposure_time: frame.exposure_time,
    })
}

/// Subtract a bias-subtracted dark scaled by the ratio of exposure times.
pub fn dark_subtract(light: &Frame, dark: &Frame) -> Result<Frame> {
    let light_exp = light
        .exposure_time
        .ok_or(SkylogError::MissingExposureTime("light"))?;
    let dark_exp = dark
        .exposure_time
        .filter(|t| *t > 0.0)
        .ok_or(SkylogError::MissingExposureTime("dark"))?;
    let scale = (light_exp / dark_exp) as f32;

    let data = combine(&light.data, &dark.data, |l, d| l - d * scale)?;
    Ok(Frame {
        data,
        exposure_time: light.exposure_time,
    })
}

/// Divide by the flat normalized to its mean. Pixels where the normalized
/// flat is not positive are passed through unchanged.
pub fn flat_correct(frame: &Frame, flat: &Frame) -> Result<Frame> {
    let count = flat.data.len().max(1) as f64;
    let mean = (flat.data.iter().map(|&v| v as f64).sum::<f64>() / count) as f32;
    if mean.abs() < EPSILON {
        return Err(SkylogError::DegenerateFlat);
    }

    let data = combine(&frame.data, &flat.data, |v, f| {
        let norm = f / mean;
        if norm > EPSILON {
            v / norm
        } else {
            v
        }
    })?;
    Ok(Frame {
        data,
        exposure_time: frame.exposure_time,
    })
}

/// Bias-subtract every flat, then combine with a sigma-clipped mean.
pub fn flat_stack(flats: &[Frame], bias: &Frame, params: &SigmaClipParams) -> Result<Frame> {
    if flats.is_empty() {
        return Err(SkylogError::EmptySequence);
    }
    let corrected = flats
        .iter()
        .map(|f| bias_subtract(f, bias))
        .collect::<Result<Vec<_>>>()?;
    let mut master = sigma_clip_stack(&corrected, params)?;
    master.exposure_time = None;
    Ok(master)
}

/// Full calibration of one light frame.
///
/// The master dark is `dark - bias`; the light is bias-subtracted too so
/// both sides of the dark subtraction carry no bias level. The light takes
/// `exposure_time`; the dark keeps its own exposure when it has one and
/// otherwise takes `exposure_time` as well. The dark is scaled by the
/// light/dark exposure ratio before subtraction, and the result is
/// flat-corrected.
pub fn calibrate(
    light: &Frame,
    bias: &Frame,
    dark: &Frame,
    flat: &Frame,
    exposure_time: f64,
) -> Result<Frame> {
    let mut master_dark = bias_subtract(dark, bias)?;
    master_dark.exposure_time = master_dark.exposure_time.or(Some(exposure_time));

    let mut debiased = bias_subtract(light, bias)?;
    debiased.exposure_time = Some(exposure_time);

    let dark_subtracted = dark_subtract(&debiased, &master_dark)?;
    flat_correct(&dark_subtracted, flat)
}
