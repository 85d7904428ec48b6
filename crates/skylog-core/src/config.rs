use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_BATCH_SIZE, DEFAULT_DETECTION_SIGMA, DEFAULT_EXTENSIONS, DEFAULT_FIT_BOX,
    DEFAULT_MAX_FWHM_STARS, DEFAULT_MIN_STAR_AREA, DEFAULT_POLL_INTERVAL_MS,
};
use crate::error::{Result, SkylogError};
use crate::stack::SigmaClipParams;
use crate::store::Store;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SkylogConfig {
    /// Database file. Defaults to the per-user data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub timezone: TimezoneConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl SkylogConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| SkylogError::InvalidConfig(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SkylogError::InvalidConfig(e.to_string()))
    }

    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(Store::default_path)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Supported file extensions, lowercase without the dot.
    pub extensions: Vec<String>,
    /// Parsed files per store transaction.
    pub batch_size: usize,
    /// Header reader threads; 0 uses the available parallelism.
    pub workers: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            batch_size: DEFAULT_BATCH_SIZE,
            workers: 0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// How a site's coordinates become a UTC offset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimezoneSource {
    /// Political time zone from the bundled zone map.
    #[default]
    Zone,
    /// One hour per 15 degrees of longitude.
    Nautical,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimezoneConfig {
    #[serde(default)]
    pub source: TimezoneSource,
    /// Use this offset for every geolocated record instead of deriving one
    /// from the site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_offset_hours: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Overrides the stored dark/bias validity setting, e.g. "6 months".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dark_validity: Option<String>,
    #[serde(default)]
    pub flat_sigma_clip: SigmaClipParams,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Stars handed to FWHM fitting, in detection order.
    pub max_fwhm_stars: usize,
    /// Detection threshold in background standard deviations.
    pub detection_sigma: f32,
    /// Side of the square fitting window, in pixels.
    pub fit_box: usize,
    pub min_star_area: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_fwhm_stars: DEFAULT_MAX_FWHM_STARS,
            detection_sigma: DEFAULT_DETECTION_SIGMA,
            fit_box: DEFAULT_FIT_BOX,
            min_star_area: DEFAULT_MIN_STAR_AREA,
        }
    }
}
