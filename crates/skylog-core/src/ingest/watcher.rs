use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::events::{EventBus, FileEvent};
use super::scanner::Scanner;

/// Polls folders and announces new image files on an [`EventBus`].
///
/// A file is announced once, after its size is unchanged across two
/// consecutive polls, so files still being written are not picked up early.
pub struct FolderWatcher {
    folders: Vec<PathBuf>,
    scanner: Scanner,
    bus: Arc<EventBus<FileEvent>>,
    seen: HashSet<String>,
    pending: HashMap<PathBuf, u64>,
}

impl FolderWatcher {
    /// `known` files are never announced.
    pub fn new(
        folders: Vec<PathBuf>,
        scanner: Scanner,
        bus: Arc<EventBus<FileEvent>>,
        known: HashSet<String>,
    ) -> Self {
        Self {
            folders,
            scanner,
            bus,
            seen: known,
            pending: HashMap::new(),
        }
    }

    /// One pass over every folder. Returns the events published.
    pub fn poll(&mut self) -> Vec<FileEvent> {
        let mut announced = Vec::new();
        let mut present = HashSet::new();

        for folder in &self.folders {
            let candidates = match self.scanner.candidates(folder, &self.seen) {
                Ok(c) => c,
                Err(e) => {
                    warn!(folder = %folder.display(), error = %e, "cannot poll folder");
                    continue;
                }
            };
            for path in candidates {
                let Ok(meta) = std::fs::metadata(&path) else {
                    continue;
                };
                let size = meta.len();
                present.insert(path.clone());

                match self.pending.get(&path) {
                    Some(&previous) if previous == size && size > 0 => {
                        self.pending.remove(&path);
                        self.seen.insert(path.to_string_lossy().into_owned());
                        let Some(extension) = self.scanner.supported_extension(&path) else {
                            continue;
                        };
                        let event = FileEvent { path, extension };
                        debug!(path = %event.path.display(), "new file settled");
                        self.bus.publish(event.clone());
                        announced.push(event);
                    }
                    _ => {
                        self.pending.insert(path, size);
                    }
                }
            }
        }

        // Files removed before settling.
        self.pending.retain(|path, _| present.contains(path));
        announced
    }

    /// Poll until `stop` is set.
    pub fn run(mut self, interval: Duration, stop: Arc<AtomicBool>) {
        info!(folders = self.folders.len(), ?interval, "watching folders");
        while !stop.load(Ordering::Relaxed) {
            self.poll();
            std::thread::sleep(interval);
        }
        debug!("folder watcher stopped");
    }
}
