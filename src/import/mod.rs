//! Streaming import of a health export
//!
//! An import clears the store, streams the export through the classifier
//! into three bounded batches, flushes each batch when it fills, and then
//! hands over to the aggregator. Status moves parsing -> computing ->
//! complete, or to error with the failure message before the error is
//! returned. A failed import leaves the store empty, not rolled back.
//!
//! The importer is not reentrant: callers make sure only one import runs
//! against a store at a time.

mod job;
mod source;
mod status;

pub use job::{find_export, ImportJob};
pub use source::EventSource;
pub use status::{StatusHandle, StatusObserver, COMPUTING_PROGRESS};

use serde::Serialize;
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, error, info};

use crate::aggregate::Aggregator;
use crate::classify::{classify, Classified, RawEvent};
use crate::config::ImportConfig;
use crate::error::Result;
use crate::model::{ImportStatus, QuantitySample, SleepSample, Workout};
use crate::store::HealthStore;

/// Progress never reported above this while parsing
pub const MAX_PARSING_PROGRESS: f64 = 95.0;

/// Batching and progress policy
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    /// Records per kind held in memory before a flush
    pub batch_size: usize,
    /// Events between status updates
    pub progress_interval: u64,
    /// Assumed size of an export, in events, for the progress estimate
    pub estimated_total_events: u64,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: 5000,
            progress_interval: 10_000,
            estimated_total_events: 2_000_000,
        }
    }
}

impl From<&ImportConfig> for ImportOptions {
    fn from(config: &ImportConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            progress_interval: config.progress_interval.max(1),
            estimated_total_events: config.estimated_total_events.max(1),
        }
    }
}

impl ImportOptions {
    /// Coarse progress estimate; the real total is only known at the end
    pub fn estimate_progress(&self, processed: u64) -> f64 {
        let percent = processed as f64 / self.estimated_total_events as f64 * 100.0;
        percent.min(MAX_PARSING_PROGRESS)
    }
}

/// Outcome of a successful import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    /// Every `Record`/`Workout` element seen, ignored ones included
    pub records_imported: u64,
    pub quantity_samples: u64,
    pub sleep_samples: u64,
    pub workouts: u64,
    pub ignored: u64,
    pub summary_days: u64,
}

/// In-memory accumulation buffers, one per record kind
struct Batches {
    threshold: usize,
    quantity: Vec<QuantitySample>,
    sleep: Vec<SleepSample>,
    workouts: Vec<Workout>,
}

impl Batches {
    fn new(threshold: usize) -> Self {
        Self {
            threshold,
            quantity: Vec::with_capacity(threshold),
            sleep: Vec::new(),
            workouts: Vec::new(),
        }
    }

    /// Flush every batch that reached the threshold
    fn flush_full(&mut self, store: &HealthStore, totals: &mut ImportResult) -> Result<()> {
        if self.quantity.len() >= self.threshold {
            self.flush_quantity(store, totals)?;
        }
        if self.sleep.len() >= self.threshold {
            self.flush_sleep(store, totals)?;
        }
        if self.workouts.len() >= self.threshold {
            self.flush_workouts(store, totals)?;
        }
        Ok(())
    }

    /// Flush whatever is left, full or not
    fn flush_all(&mut self, store: &HealthStore, totals: &mut ImportResult) -> Result<()> {
        if !self.quantity.is_empty() {
            self.flush_quantity(store, totals)?;
        }
        if !self.sleep.is_empty() {
            self.flush_sleep(store, totals)?;
        }
        if !self.workouts.is_empty() {
            self.flush_workouts(store, totals)?;
        }
        Ok(())
    }

    fn flush_quantity(&mut self, store: &HealthStore, totals: &mut ImportResult) -> Result<()> {
        let written = store.insert_quantity_samples(&self.quantity)?;
        totals.quantity_samples += written as u64;
        debug!(written, "flushed quantity samples");
        self.quantity.clear();
        Ok(())
    }

    fn flush_sleep(&mut self, store: &HealthStore, totals: &mut ImportResult) -> Result<()> {
        let written = store.insert_sleep_samples(&self.sleep)?;
        totals.sleep_samples += written as u64;
        debug!(written, "flushed sleep samples");
        self.sleep.clear();
        Ok(())
    }

    fn flush_workouts(&mut self, store: &HealthStore, totals: &mut ImportResult) -> Result<()> {
        let written = store.insert_workouts(&self.workouts)?;
        totals.workouts += written as u64;
        debug!(written, "flushed workouts");
        self.workouts.clear();
        Ok(())
    }
}

pub struct Importer<'a> {
    store: &'a HealthStore,
    options: ImportOptions,
    status: StatusHandle<'a>,
    processed: u64,
}

impl<'a> Importer<'a> {
    pub fn new(store: &'a HealthStore, options: ImportOptions) -> Self {
        Self {
            store,
            options,
            status: StatusHandle::new(store),
            processed: 0,
        }
    }

    /// Call `observer` with every status the import writes
    pub fn on_status(mut self, observer: impl FnMut(&ImportStatus) + 'a) -> Self {
        self.status.observe(observer);
        self
    }

    /// Import an export file from disk
    pub fn import_file(&mut self, path: &Path) -> Result<ImportResult> {
        info!(path = %path.display(), "starting import");
        let outcome = self
            .begin()
            .and_then(|()| EventSource::from_path(path))
            .and_then(|source| self.ingest(source));
        self.finish(outcome)
    }

    /// Import an export from any buffered reader
    pub fn import_reader<R: BufRead>(&mut self, reader: R) -> Result<ImportResult> {
        info!("starting import from reader");
        let outcome = self
            .begin()
            .and_then(|()| self.ingest(EventSource::new(reader)));
        self.finish(outcome)
    }

    fn begin(&mut self) -> Result<()> {
        self.processed = 0;
        self.store.clear_all()?;
        self.status.parsing(0.0, 0)
    }

    fn ingest<I>(&mut self, events: I) -> Result<ImportResult>
    where
        I: Iterator<Item = Result<RawEvent>>,
    {
        let mut totals = ImportResult::default();
        let mut batches = Batches::new(self.options.batch_size);

        for event in events {
            let event = event?;
            match classify(&event) {
                Classified::Quantity(sample) => batches.quantity.push(sample),
                Classified::Sleep(sample) => batches.sleep.push(sample),
                Classified::Workout(workout) => batches.workouts.push(workout),
                Classified::Ignored => totals.ignored += 1,
            }
            self.processed += 1;

            batches.flush_full(self.store, &mut totals)?;

            if self.processed % self.options.progress_interval == 0 {
                let progress = self.options.estimate_progress(self.processed);
                debug!(processed = self.processed, progress, "import progress");
                self.status.parsing(progress, self.processed)?;
            }
        }

        batches.flush_all(self.store, &mut totals)?;
        totals.records_imported = self.processed;

        let units = self.store.detect_units()?;
        debug!(units = units.len(), "detected units");

        self.status.computing(self.processed)?;
        totals.summary_days = Aggregator::new(self.store).recompute()? as u64;
        self.status.complete(self.processed)?;

        Ok(totals)
    }

    fn finish(&mut self, outcome: Result<ImportResult>) -> Result<ImportResult> {
        match outcome {
            Ok(totals) => {
                info!(
                    records = totals.records_imported,
                    quantity = totals.quantity_samples,
                    sleep = totals.sleep_samples,
                    workouts = totals.workouts,
                    days = totals.summary_days,
                    "import complete"
                );
                Ok(totals)
            }
            Err(e) => {
                let message = e.to_string();
                error!(error = %message, processed = self.processed, "import failed");
                if let Err(status_err) = self.status.failed(self.processed, &message) {
                    error!(error = %status_err, "could not record import failure");
                }
                Err(e)
            }
        }
    }
}
