pub mod analyze;
pub mod calibration;
pub mod config;
pub mod folders;
pub mod images;
pub mod info;
pub mod project;
pub mod scan;
pub mod sessions;
pub mod sky;
pub mod validate;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use skylog_core::calibration::{Calibrator, ValidityWindow};
use skylog_core::config::SkylogConfig;
use skylog_core::store::Store;

/// Loaded config plus the open store.
pub struct AppContext {
    pub config: SkylogConfig,
    pub store: Store,
}

impl AppContext {
    pub fn load(config_path: Option<&Path>, database: Option<PathBuf>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => SkylogConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => SkylogConfig::default(),
        };
        if database.is_some() {
            config.database = database;
        }

        let db_path = config.database_path();
        let store = Store::open(&db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        Ok(Self { config, store })
    }

    /// Config override first, then the stored user setting.
    pub fn validity_window(&self, cli: Option<&str>) -> Result<Option<ValidityWindow>> {
        let text = match cli.or(self.config.calibration.dark_validity.as_deref()) {
            Some(text) => text.to_string(),
            None => self.store.dark_validity()?,
        };
        if text.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        Ok(Some(ValidityWindow::parse(&text)?))
    }

    pub fn calibrator(&self, validity: Option<ValidityWindow>) -> Calibrator {
        Calibrator::new(
            self.store.clone(),
            validity,
            self.config.calibration.flat_sigma_clip.clone(),
        )
    }
}
