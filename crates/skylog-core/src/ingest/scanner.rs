use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::Result;

/// Finds candidate image files under a folder.
#[derive(Clone, Debug)]
pub struct Scanner {
    extensions: Vec<String>,
}

impl Scanner {
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Lowercase extension of `path` if it is a supported image type.
    pub fn supported_extension(&self, path: &Path) -> Option<String> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.extensions.contains(&ext).then_some(ext)
    }

    /// Supported files under `root` (recursively) whose filename is not in
    /// `known`, in walk order. Paths are absolute and canonical, so one file
    /// has one filename however its folder was named. Unreadable entries
    /// are logged and skipped.
    pub fn candidates(&self, root: &Path, known: &HashSet<String>) -> Result<Vec<PathBuf>> {
        let root = root.canonicalize()?;
        let root = root.as_path();

        let mut found = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if self.supported_extension(&path).is_none() {
                continue;
            }
            if known.contains(path.to_string_lossy().as_ref()) {
                continue;
            }
            found.push(path);
        }
        debug!(root = %root.display(), candidates = found.len(), "scanned folder");
        Ok(found)
    }
}
