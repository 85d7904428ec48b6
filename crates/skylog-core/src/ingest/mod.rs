pub mod events;
pub mod executor;
pub mod scanner;
pub mod watcher;
pub mod writer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::IngestConfig;
use crate::error::Result;
use crate::io::read_record;
use crate::progress::{ProgressReporter, Stage};
use crate::session::TimezoneLookup;
use crate::store::Store;

pub use events::{EventBus, FileEvent, Subscription};
pub use executor::{Completions, TaskQueue, Ticket};
pub use scanner::Scanner;
pub use watcher::FolderWatcher;
pub use writer::{IngestWriter, ParseOutcome, WriteStats};

/// Totals of one ingestion run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Files handed to the reader pool.
    pub submitted: usize,
    pub inserted: usize,
    pub unreadable: usize,
    pub dropped: usize,
}

impl ScanSummary {
    fn merge(&mut self, other: ScanSummary) {
        self.submitted += other.submitted;
        self.inserted += other.inserted;
        self.unreadable += other.unreadable;
        self.dropped += other.dropped;
    }
}

/// Owns the reader pool and drives files from disk into the store.
pub struct Ingestor {
    store: Store,
    queue: TaskQueue,
    scanner: Scanner,
    timezone: Arc<dyn TimezoneLookup>,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(
        store: Store,
        config: &IngestConfig,
        timezone: Arc<dyn TimezoneLookup>,
    ) -> Result<Self> {
        Ok(Self {
            store,
            queue: TaskQueue::new(config.workers)?,
            scanner: Scanner::new(&config.extensions),
            timezone,
            batch_size: config.batch_size,
        })
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Ingest every supported file under `root` not already in the ledger.
    pub fn scan_folder(&self, root: &Path, reporter: &dyn ProgressReporter) -> Result<ScanSummary> {
        let known = self.store.known_filenames()?;
        let candidates = self.scanner.candidates(root, &known)?;
        info!(root = %root.display(), candidates = candidates.len(), "scanning folder");
        Ok(self.ingest(candidates, reporter))
    }

    pub fn scan_folders(
        &self,
        roots: &[PathBuf],
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanSummary> {
        let mut total = ScanSummary::default();
        for root in roots {
            total.merge(self.scan_folder(root, reporter)?);
        }
        Ok(total)
    }

    /// Ingest specific files, e.g. from watch events. The ledger is not
    /// consulted; already-stored filenames fail at insert and are dropped.
    pub fn ingest_paths(
        &self,
        paths: Vec<PathBuf>,
        reporter: &dyn ProgressReporter,
    ) -> ScanSummary {
        let paths = paths
            .into_iter()
            .filter(|p| self.scanner.supported_extension(p).is_some())
            .collect();
        self.ingest(paths, reporter)
    }

    fn ingest(&self, paths: Vec<PathBuf>, reporter: &dyn ProgressReporter) -> ScanSummary {
        let timezone = Arc::clone(&self.timezone);
        let completions = self
            .queue
            .submit_all(paths, move |path| parse_file(path, timezone.as_ref()));

        let submitted = completions.total();
        reporter.begin_stage(Stage::Ingest, Some(submitted));

        let mut writer = IngestWriter::new(&self.store, self.batch_size);
        for (done, outcome) in completions.enumerate() {
            writer.push(outcome);
            reporter.advance(done + 1);
        }
        let stats = writer.finish();
        reporter.finish_stage();

        let summary = ScanSummary {
            submitted,
            inserted: stats.inserted,
            unreadable: stats.unreadable,
            dropped: stats.dropped,
        };
        info!(
            submitted,
            inserted = summary.inserted,
            unreadable = summary.unreadable,
            dropped = summary.dropped,
            "ingestion finished"
        );
        summary
    }

    /// Wait for outstanding reader tasks and stop the pool.
    pub fn shutdown(self) {
        self.queue.shutdown();
    }
}

/// Read one file's header. Failures become a `None` record.
pub fn parse_file(path: PathBuf, timezone: &dyn TimezoneLookup) -> ParseOutcome {
    match read_record(&path, timezone) {
        Ok(record) => ParseOutcome {
            path,
            record: Some(record),
        },
        Err(e) => {
            debug!(path = %path.display(), error = %e, "skipping unreadable file");
            ParseOutcome { path, record: None }
        }
    }
}
