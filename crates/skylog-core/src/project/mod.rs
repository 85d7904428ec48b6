//! Project preparation for one target.
//!
//! A selection of lights is checked for calibration coverage, then laid out
//! as one `Night_<date>` folder per night holding `light`, `dark`, `bias`
//! and `flat` links to the catalogued files.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::calibration::CalibrationResolver;
use crate::error::{Result, SkylogError};
use crate::record::{ImageId, ImageType, StoredImage};
use crate::store::Store;

pub const LIGHT_DIR: &str = "light";
pub const DARK_DIR: &str = "dark";
pub const BIAS_DIR: &str = "bias";
pub const FLAT_DIR: &str = "flat";

/// Calibration frames found for one light.
#[derive(Clone, Debug)]
struct LightCoverage {
    light: StoredImage,
    bias: Option<StoredImage>,
    dark: Option<StoredImage>,
    flats: Vec<StoredImage>,
}

/// Which selected lights lack which calibration class.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoverageReport {
    pub lights: Vec<ImageId>,
    pub target: Option<String>,
    pub missing_bias: Vec<ImageId>,
    pub missing_dark: Vec<ImageId>,
    pub missing_flats: Vec<ImageId>,
    /// Nights with at least one light lacking flats.
    pub nights_missing_flats: Vec<NaiveDate>,
}

impl CoverageReport {
    pub fn is_complete(&self) -> bool {
        self.missing_bias.is_empty() && self.missing_dark.is_empty() && self.missing_flats.is_empty()
    }
}

/// Links laid out for one night.
#[derive(Clone, Debug, PartialEq)]
pub struct NightFolder {
    pub night: NaiveDate,
    pub path: PathBuf,
    pub lights: usize,
    pub darks: usize,
    pub biases: usize,
    pub flats: usize,
    /// Links created by this run; existing entries are left alone.
    pub created: usize,
}

#[derive(Clone, Debug)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub nights: Vec<NightFolder>,
    /// Lights without a night session, left out of the tree.
    pub unplaced: Vec<ImageId>,
    pub coverage: CoverageReport,
}

pub struct ProjectAssistant {
    store: Store,
    resolver: CalibrationResolver,
}

impl ProjectAssistant {
    pub fn new(store: Store, resolver: CalibrationResolver) -> Self {
        Self { store, resolver }
    }

    /// Lights among `ids`, in capture order. Other image types are ignored.
    fn selected_lights(&self, ids: &[ImageId]) -> Result<Vec<StoredImage>> {
        let mut lights = Vec::new();
        for &id in ids {
            let image = self.store.image(id)?;
            if image.record.image_type == Some(ImageType::Light) {
                lights.push(image);
            }
        }
        if lights.is_empty() {
            return Err(SkylogError::EmptySelection);
        }
        lights.sort_by_key(|l| (l.record.capture_time, l.id));
        Ok(lights)
    }

    fn coverage_of(&self, light: StoredImage) -> Result<LightCoverage> {
        Ok(LightCoverage {
            bias: optional(self.resolver.resolve_master_bias(&light))?,
            dark: optional(self.resolver.resolve_master_dark(&light))?,
            flats: optional(self.resolver.resolve_flats(&light))?.unwrap_or_default(),
            light,
        })
    }

    fn collect(&self, ids: &[ImageId]) -> Result<(CoverageReport, Vec<LightCoverage>)> {
        let lights = self.selected_lights(ids)?;

        let targets: BTreeSet<String> = lights
            .iter()
            .filter_map(|l| l.record.target.clone())
            .collect();
        if targets.len() > 1 {
            return Err(SkylogError::MixedTargets(targets.into_iter().collect()));
        }

        let coverage = lights
            .into_iter()
            .map(|light| self.coverage_of(light))
            .collect::<Result<Vec<_>>>()?;

        let mut report = CoverageReport {
            target: targets.into_iter().next(),
            ..CoverageReport::default()
        };
        let mut nights = BTreeSet::new();
        for c in &coverage {
            let id = c.light.id;
            report.lights.push(id);
            if c.bias.is_none() {
                report.missing_bias.push(id);
            }
            if c.dark.is_none() {
                report.missing_dark.push(id);
            }
            if c.flats.is_empty() {
                report.missing_flats.push(id);
                if let Some(night) = c.light.record.night_session() {
                    nights.insert(night);
                }
            }
        }
        report.nights_missing_flats = nights.into_iter().collect();
        Ok((report, coverage))
    }

    /// Check that the selection is one target and report calibration gaps.
    ///
    /// An empty selection or one spanning several targets is an error;
    /// missing calibration frames are only reported.
    pub fn validate(&self, ids: &[ImageId]) -> Result<CoverageReport> {
        let (report, _) = self.collect(ids)?;
        info!(
            lights = report.lights.len(),
            missing_bias = report.missing_bias.len(),
            missing_dark = report.missing_dark.len(),
            missing_flats = report.missing_flats.len(),
            "validated selection"
        );
        Ok(report)
    }

    /// Validate, then link each night's lights and their calibration frames
    /// under `root`. Re-running over an existing tree only adds what is
    /// missing.
    pub fn prepare(&self, ids: &[ImageId], root: &Path) -> Result<ProjectLayout> {
        let (report, coverage) = self.collect(ids)?;

        let mut by_night: BTreeMap<NaiveDate, Vec<LightCoverage>> = BTreeMap::new();
        let mut unplaced = Vec::new();
        for c in coverage {
            match c.light.record.night_session() {
                Some(night) => by_night.entry(night).or_default().push(c),
                None => unplaced.push(c.light.id),
            }
        }
        if !unplaced.is_empty() {
            warn!(count = unplaced.len(), "lights without a night session left out");
        }

        let nights = by_night
            .into_iter()
            .map(|(night, lights)| lay_out_night(root, night, &lights))
            .collect::<Result<Vec<_>>>()?;

        info!(root = %root.display(), nights = nights.len(), "prepared project");
        Ok(ProjectLayout {
            root: root.to_path_buf(),
            nights,
            unplaced,
            coverage: report,
        })
    }
}

/// A missing calibration match is `None`; other errors propagate.
fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(SkylogError::NoCalibrationMatch { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn night_folder_name(night: NaiveDate) -> String {
    format!("Night_{}", night.format("%Y-%m-%d"))
}

fn lay_out_night(root: &Path, night: NaiveDate, lights: &[LightCoverage]) -> Result<NightFolder> {
    let path = root.join(night_folder_name(night));
    for dir in [LIGHT_DIR, DARK_DIR, BIAS_DIR, FLAT_DIR] {
        fs::create_dir_all(path.join(dir))?;
    }

    let (mut lights_linked, mut darks, mut biases, mut flats) = (0, 0, 0, 0);
    let mut created = 0;
    let mut linked: HashSet<(&str, ImageId)> = HashSet::new();
    let mut link = |dir: &'static str, image: &StoredImage| -> Result<bool> {
        if !linked.insert((dir, image.id)) {
            return Ok(false);
        }
        if link_into(&path.join(dir), &image.record.filename)? {
            created += 1;
        }
        Ok(true)
    };

    for c in lights {
        if link(LIGHT_DIR, &c.light)? {
            lights_linked += 1;
        }
        if let Some(dark) = &c.dark {
            if link(DARK_DIR, dark)? {
                darks += 1;
            }
        }
        if let Some(bias) = &c.bias {
            if link(BIAS_DIR, bias)? {
                biases += 1;
            }
        }
        for flat in &c.flats {
            if link(FLAT_DIR, flat)? {
                flats += 1;
            }
        }
    }
    debug!(night = %night, lights = lights_linked, created, "laid out night");
    Ok(NightFolder {
        night,
        path,
        lights: lights_linked,
        darks,
        biases,
        flats,
        created,
    })
}

/// Link `source` into `dir` under its own file name. Returns false when an
/// entry of that name already exists.
fn link_into(dir: &Path, source: &str) -> Result<bool> {
    let source = Path::new(source);
    let name = source.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no file name in {}", source.display()),
        )
    })?;
    let link = dir.join(name);
    if fs::symlink_metadata(&link).is_ok() {
        return Ok(false);
    }
    symlink(source, &link)?;
    Ok(true)
}

#[cfg(unix)]
fn symlink(source: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, link)
}

#[cfg(windows)]
fn symlink(source: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(source, link)
}
