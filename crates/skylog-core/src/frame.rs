use ndarray::{ArrayD, ArrayView2, Ix2};

use crate::error::{Result, SkylogError};

/// Pixel data of one exposure.
///
/// Shape is `(height, width)` or `(height, width, channels)`. Values are
/// stored as read from the file, in ADU after BZERO/BSCALE (not rescaled
/// to [0, 1]).
#[derive(Clone, Debug)]
pub struct Frame {
    pub data: ArrayD<f32>,
    /// Seconds. Required on both sides of a dark subtraction.
    pub exposure_time: Option<f64>,
}

impl Frame {
    pub fn new(data: ArrayD<f32>) -> Self {
        Self {
            data,
            exposure_time: None,
        }
    }

    pub fn with_exposure(mut self, exposure_time: f64) -> Self {
        self.exposure_time = Some(exposure_time);
        self
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// 2-D view for star analysis. A single trailing channel is dropped.
    pub fn plane(&self) -> Result<ArrayView2<'_, f32>> {
        let shape = self.data.shape();
        let view = match shape {
            [_, _] => self.data.view(),
            [_, _, 1] => self.data.index_axis(ndarray::Axis(2), 0),
            _ => return Err(SkylogError::NotTwoDimensional(shape.to_vec())),
        };
        view.into_dimensionality::<Ix2>()
            .map_err(|_| SkylogError::NotTwoDimensional(shape.to_vec()))
    }
}
