use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::session::night::night_key;

/// Row id of an ingested image.
pub type ImageId = i64;

/// Acquisition class of an exposure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageType {
    Light,
    Dark,
    Bias,
    Flat,
    MasterDark,
    MasterBias,
    MasterFlat,
}

impl ImageType {
    /// Normalize an IMAGETYP header value.
    ///
    /// Capture software spells these many ways ("Light Frame", "LIGHT",
    /// "Flat Field", "Master Dark", "MASTERDARK", "Offset", ...).
    pub fn from_header(value: &str) -> Option<Self> {
        let normalized: String = value
            .trim()
            .to_ascii_uppercase()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();
        let normalized = normalized
            .trim_end_matches("FRAME")
            .trim_end_matches("FIELD");

        match normalized {
            "LIGHT" | "OBJECT" | "SCIENCE" => Some(Self::Light),
            "DARK" => Some(Self::Dark),
            "BIAS" | "OFFSET" | "ZERO" => Some(Self::Bias),
            "FLAT" => Some(Self::Flat),
            "MASTERDARK" => Some(Self::MasterDark),
            "MASTERBIAS" | "MASTEROFFSET" => Some(Self::MasterBias),
            "MASTERFLAT" => Some(Self::MasterFlat),
            _ => None,
        }
    }

    /// Canonical tag persisted in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "LIGHT",
            Self::Dark => "DARK",
            Self::Bias => "BIAS",
            Self::Flat => "FLAT",
            Self::MasterDark => "MASTER_DARK",
            Self::MasterBias => "MASTER_BIAS",
            Self::MasterFlat => "MASTER_FLAT",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "LIGHT" => Some(Self::Light),
            "DARK" => Some(Self::Dark),
            "BIAS" => Some(Self::Bias),
            "FLAT" => Some(Self::Flat),
            "MASTER_DARK" => Some(Self::MasterDark),
            "MASTER_BIAS" => Some(Self::MasterBias),
            "MASTER_FLAT" => Some(Self::MasterFlat),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calibration frame class requested from the resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CalibrationKind {
    MasterBias,
    MasterDark,
    Flat,
}

impl std::fmt::Display for CalibrationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MasterBias => write!(f, "master bias"),
            Self::MasterDark => write!(f, "master dark"),
            Self::Flat => write!(f, "flat"),
        }
    }
}

/// Where a record's timezone offset came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OffsetOrigin {
    /// Resolved from the record's own site coordinates at ingestion.
    Location,
    /// Copied from a temporally adjacent record.
    Backfill,
}

impl OffsetOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Backfill => "backfill",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "location" => Some(Self::Location),
            "backfill" => Some(Self::Backfill),
            _ => None,
        }
    }
}

/// Canonical acquisition metadata of one exposure, independent of the
/// header dialect it was read from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub filename: String,
    pub capture_time: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Hours east of UTC.
    pub timezone_offset: Option<f64>,
    pub offset_origin: Option<OffsetOrigin>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Microns.
    pub pixel_size: Option<f64>,
    /// Arcseconds per pixel.
    pub plate_scale: Option<f64>,
    pub target: Option<String>,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    pub instrument: Option<String>,
    pub telescope: Option<String>,
    pub filter: Option<String>,
    pub image_type: Option<ImageType>,
    /// Seconds.
    pub exposure_time: Option<f64>,
    /// Millimetres.
    pub focal_length: Option<f64>,
    pub ambient_temperature: Option<f64>,
    pub sensor_temperature: Option<f64>,
    pub gain: Option<f64>,
    /// Sensor offset (bias level) setting.
    pub offset: Option<f64>,
    /// Sky brightness in magnitudes per square arcsecond.
    pub sky_brightness: Option<f64>,
    pub airmass: Option<f64>,
}

impl ImageRecord {
    /// Minimal record; every optional field empty.
    pub fn new(filename: impl Into<String>, capture_time: DateTime<Utc>) -> Self {
        Self {
            filename: filename.into(),
            capture_time,
            latitude: None,
            longitude: None,
            timezone_offset: None,
            offset_origin: None,
            width: None,
            height: None,
            pixel_size: None,
            plate_scale: None,
            target: None,
            ra: None,
            dec: None,
            instrument: None,
            telescope: None,
            filter: None,
            image_type: None,
            exposure_time: None,
            focal_length: None,
            ambient_temperature: None,
            sensor_temperature: None,
            gain: None,
            offset: None,
            sky_brightness: None,
            airmass: None,
        }
    }

    /// Observing night this record belongs to, if its offset is known.
    pub fn night_session(&self) -> Option<NaiveDate> {
        self.timezone_offset
            .map(|offset| night_key(self.capture_time, offset))
    }
}

/// A record as persisted, with its row id.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredImage {
    pub id: ImageId,
    pub record: ImageRecord,
}

/// Per-image quality metrics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetrics {
    pub fwhm: f64,
    pub snr: f64,
    pub eccentricity: f64,
    pub median: f64,
    pub stars_detected: usize,
}

/// Persisted analysis row.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisResult {
    pub image_id: ImageId,
    pub metrics: AnalysisMetrics,
}
