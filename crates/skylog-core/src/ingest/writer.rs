use std::path::PathBuf;

use tracing::warn;

use crate::record::ImageRecord;
use crate::store::Store;

/// Result of parsing one candidate file. `record` is `None` when the header
/// could not be read (corrupt, truncated, still being written).
#[derive(Debug)]
pub struct ParseOutcome {
    pub path: PathBuf,
    pub record: Option<ImageRecord>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub inserted: usize,
    /// Files whose header could not be parsed.
    pub unreadable: usize,
    /// Records lost with a failed batch.
    pub dropped: usize,
}

/// Batches parse outcomes into store transactions.
///
/// After every flush the timezone backfill runs and every attempted file,
/// parsed or not, is added to the ledger.
pub struct IngestWriter<'a> {
    store: &'a Store,
    batch_size: usize,
    records: Vec<ImageRecord>,
    attempted: Vec<String>,
    stats: WriteStats,
}

impl<'a> IngestWriter<'a> {
    pub fn new(store: &'a Store, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            records: Vec::new(),
            attempted: Vec::new(),
            stats: WriteStats::default(),
        }
    }

    pub fn push(&mut self, outcome: ParseOutcome) {
        self.attempted
            .push(outcome.path.to_string_lossy().into_owned());
        match outcome.record {
            Some(record) => self.records.push(record),
            None => self.stats.unreadable += 1,
        }
        if self.attempted.len() >= self.batch_size {
            self.flush();
        }
    }

    pub fn flush(&mut self) {
        if self.attempted.is_empty() {
            return;
        }
        let records = std::mem::take(&mut self.records);
        let attempted = std::mem::take(&mut self.attempted);
        let size = records.len();

        if size > 0 {
            match self.store.insert_images(records) {
                Ok(n) => {
                    self.stats.inserted += n;
                    if let Err(e) = self.store.backfill_timezones() {
                        warn!(error = %e, "timezone backfill failed");
                    }
                }
                Err(e) => {
                    self.stats.dropped += size;
                    warn!(size, error = %e, "dropped ingestion batch");
                }
            }
        }

        if let Err(e) = self.store.mark_attempted(attempted) {
            warn!(error = %e, "failed to update attempted-files ledger");
        }
    }

    /// Flush whatever is left and return the totals.
    pub fn finish(mut self) -> WriteStats {
        self.flush();
        self.stats
    }
}
