use std::path::PathBuf;

use thiserror::Error;

use crate::record::{CalibrationKind, ImageId};

#[derive(Error, Debug)]
pub enum SkylogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Settings encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid header in {path}: {reason}")]
    InvalidHeader { path: PathBuf, reason: String },

    #[error("Missing header keyword {keyword} in {path}")]
    MissingKeyword { path: PathBuf, keyword: &'static str },

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Shape mismatch: frame {frame:?} vs calibration {calibration:?}")]
    ShapeMismatch {
        frame: Vec<usize>,
        calibration: Vec<usize>,
    },

    #[error("Expected a 2-D pixel array, got shape {0:?}")]
    NotTwoDimensional(Vec<usize>),

    #[error("Exposure time missing for {0} frame")]
    MissingExposureTime(&'static str),

    #[error("Flat frame has zero mean")]
    DegenerateFlat,

    #[error("No matching {kind} frame for image {image_id}")]
    NoCalibrationMatch { kind: CalibrationKind, image_id: ImageId },

    #[error("No stars detected in image {image_id}")]
    NoStarsDetected { image_id: ImageId },

    #[error("Image {0} not found")]
    ImageNotFound(ImageId),

    #[error("Invalid validity window: {0:?}")]
    InvalidValidityWindow(String),

    #[error("Empty frame sequence")]
    EmptySequence,

    #[error("Store worker has shut down")]
    StoreClosed,

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Invalid image filter: {0}")]
    InvalidFilter(String),

    #[error("Selection contains no light frames")]
    EmptySelection,

    #[error("Selection spans {} targets: {}", .0.len(), .0.join(", "))]
    MixedTargets(Vec<String>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Worker pool error: {0}")]
    Pool(String),
}

pub type Result<T> = std::result::Result<T, SkylogError>;
