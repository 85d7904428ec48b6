use approx::assert_relative_eq;
use ndarray::{arr2, Array2, ArrayD, IxDyn};

use skylog_core::calibration::{bias_subtract, calibrate, dark_subtract, flat_correct, flat_stack};
use skylog_core::error::SkylogError;
use skylog_core::frame::Frame;
use skylog_core::stack::{sigma_clip_stack, SigmaClipParams};

fn frame(data: Array2<f32>) -> Frame {
    Frame::new(data.into_dyn())
}

fn filled(h: usize, w: usize, v: f32) -> Frame {
    frame(Array2::from_elem((h, w), v))
}

#[test]
fn test_bias_subtract_self_is_zero() {
    let f = frame(Array2::from_shape_fn((4, 5), |(r, c)| (r * 5 + c) as f32));
    let out = bias_subtract(&f, &f).unwrap();
    assert!(out.data.iter().all(|&v| v == 0.0));
    // Inputs untouched.
    assert_eq!(f.data[[3, 4]], 19.0);
}

#[test]
fn test_singleton_channel_is_dropped() {
    let light = filled(2, 3, 10.0);
    let bias = Frame::new(ArrayD::from_elem(IxDyn(&[2, 3, 1]), 4.0f32));
    let out = bias_subtract(&light, &bias).unwrap();
    assert_eq!(out.shape(), &[2, 3]);
    assert!(out.data.iter().all(|&v| v == 6.0));
}

#[test]
fn test_mono_calibration_broadcasts_over_channels() {
    let light = Frame::new(ArrayD::from_elem(IxDyn(&[2, 3, 3]), 10.0f32));
    let bias = filled(2, 3, 1.0);
    let out = bias_subtract(&light, &bias).unwrap();
    assert_eq!(out.shape(), &[2, 3, 3]);
    assert!(out.data.iter().all(|&v| v == 9.0));
}

#[test]
fn test_shape_mismatch() {
    let err = bias_subtract(&filled(2, 3, 0.0), &filled(3, 2, 0.0)).unwrap_err();
    assert!(matches!(err, SkylogError::ShapeMismatch { .. }));
}

#[test]
fn test_dark_scaled_by_exposure_ratio() {
    let light = filled(2, 2, 100.0).with_exposure(300.0);
    let dark = filled(2, 2, 10.0).with_exposure(150.0);
    let out = dark_subtract(&light, &dark).unwrap();
    assert!(out.data.iter().all(|&v| (v - 80.0).abs() < 1e-4));
    assert_eq!(out.exposure_time, Some(300.0));
}

#[test]
fn test_dark_needs_exposures() {
    let light = filled(2, 2, 100.0);
    let dark = filled(2, 2, 10.0).with_exposure(150.0);
    assert!(matches!(
        dark_subtract(&light, &dark),
        Err(SkylogError::MissingExposureTime("light"))
    ));
    let light = light.with_exposure(300.0);
    assert!(matches!(
        dark_subtract(&light, &filled(2, 2, 10.0)),
        Err(SkylogError::MissingExposureTime("dark"))
    ));
}

#[test]
fn test_flat_correct_normalizes_by_mean() {
    let light = frame(arr2(&[[10.0, 30.0], [20.0, 20.0]]));
    let flat = frame(arr2(&[[1.0, 3.0], [2.0, 2.0]]));
    let out = flat_correct(&light, &flat).unwrap();
    for v in out.data.iter() {
        assert_relative_eq!(*v, 20.0, epsilon = 1e-4);
    }
}

#[test]
fn test_flat_dead_pixel_passes_through() {
    let light = frame(arr2(&[[10.0, 30.0]]));
    let flat = frame(arr2(&[[0.0, 4.0]]));
    let out = flat_correct(&light, &flat).unwrap();
    assert_eq!(out.data[[0, 0]], 10.0);
    assert_relative_eq!(out.data[[0, 1]], 15.0, epsilon = 1e-4);
}

#[test]
fn test_zero_flat_is_degenerate() {
    let err = flat_correct(&filled(2, 2, 5.0), &filled(2, 2, 0.0)).unwrap_err();
    assert!(matches!(err, SkylogError::DegenerateFlat));
}

#[test]
fn test_sigma_clip_rejects_outlier() {
    let mut frames: Vec<Frame> = (0..10).map(|_| filled(3, 3, 1000.0)).collect();
    let mut hot = filled(3, 3, 1000.0);
    hot.data[[1, 1]] = 5000.0;
    frames.push(hot);

    let stacked = sigma_clip_stack(&frames, &SigmaClipParams::default()).unwrap();
    assert_relative_eq!(stacked.data[[1, 1]], 1000.0, epsilon = 1e-3);
    assert_relative_eq!(stacked.data[[0, 0]], 1000.0, epsilon = 1e-3);
}

#[test]
fn test_sigma_clip_single_channel_planes() {
    // Large enough to take the row-parallel path.
    let (h, w) = (300, 400);
    let plane = |offset: f32| {
        let data = ArrayD::from_shape_fn(IxDyn(&[h, w, 1]), |ix| (ix[0] * w + ix[1]) as f32 + offset);
        Frame::new(data)
    };
    let mut frames: Vec<Frame> = (0..8).map(|_| plane(0.0)).collect();
    let mut hot = plane(0.0);
    hot.data[[h - 1, w - 1, 0]] = 1.0e6;
    frames.push(hot);

    let stacked = sigma_clip_stack(&frames, &SigmaClipParams::default()).unwrap();
    assert_eq!(stacked.shape(), &[h, w, 1]);
    assert_relative_eq!(stacked.data[[0, 5, 0]], 5.0, epsilon = 1e-3);
    assert_relative_eq!(stacked.data[[2, 3, 0]], (2 * w + 3) as f32, epsilon = 1e-2);
    assert_relative_eq!(stacked.data[[h - 1, w - 1, 0]], (h * w - 1) as f32, epsilon = 1.0);
}

#[test]
fn test_sigma_clip_empty_and_mismatched() {
    assert!(matches!(
        sigma_clip_stack(&[], &SigmaClipParams::default()),
        Err(SkylogError::EmptySequence)
    ));
    let frames = [filled(2, 2, 1.0), filled(2, 3, 1.0)];
    assert!(matches!(
        sigma_clip_stack(&frames, &SigmaClipParams::default()),
        Err(SkylogError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_flat_stack_subtracts_bias() {
    let flats: Vec<Frame> = (0..5).map(|i| filled(4, 4, 20_000.0 + i as f32)).collect();
    let bias = filled(4, 4, 500.0);
    let master = flat_stack(&flats, &bias, &SigmaClipParams::default()).unwrap();
    for v in master.data.iter() {
        assert_relative_eq!(*v, 19_502.0, epsilon = 1e-2);
    }
    assert_eq!(master.exposure_time, None);
    assert!(matches!(
        flat_stack(&[], &bias, &SigmaClipParams::default()),
        Err(SkylogError::EmptySequence)
    ));
}

#[test]
fn test_calibrate_end_to_end() {
    // Signal 1000 with a 2x vignetting flat, bias 500, dark current 0.1/s.
    let flat = frame(arr2(&[[1.0, 2.0], [1.0, 2.0]]));
    let bias = filled(2, 2, 500.0);
    let dark = filled(2, 2, 500.0 + 0.1 * 60.0).with_exposure(60.0);
    let light = frame(arr2(&[[1000.0, 2000.0], [1000.0, 2000.0]]).mapv(|v| v + 500.0 + 0.1 * 300.0));

    let out = calibrate(&light, &bias, &dark, &flat, 300.0).unwrap();
    // Mean flat is 1.5, so the corrected level is 1000 * 1.5.
    for v in out.data.iter() {
        assert_relative_eq!(*v, 1500.0, epsilon = 1e-2);
    }
    assert_eq!(out.exposure_time, Some(300.0));
}

#[test]
fn test_calibrate_dark_without_exposure_uses_light_exposure() {
    let flat = filled(2, 2, 1.0);
    let bias = filled(2, 2, 100.0);
    let dark = filled(2, 2, 130.0);
    let light = filled(2, 2, 1130.0);
    let out = calibrate(&light, &bias, &dark, &flat, 120.0).unwrap();
    for v in out.data.iter() {
        assert_relative_eq!(*v, 1000.0, epsilon = 1e-3);
    }
}
