//! Explicit handle on the singleton import status

use crate::error::Result;
use crate::model::{ImportState, ImportStatus};
use crate::store::HealthStore;

/// Progress reported once parsing finishes and aggregation starts
pub const COMPUTING_PROGRESS: f64 = 95.0;

pub type StatusObserver<'a> = Box<dyn FnMut(&ImportStatus) + 'a>;

/// Writes status transitions to the store and forwards each written status
/// to an optional observer.
pub struct StatusHandle<'a> {
    store: &'a HealthStore,
    observer: Option<StatusObserver<'a>>,
}

impl<'a> StatusHandle<'a> {
    pub fn new(store: &'a HealthStore) -> Self {
        Self {
            store,
            observer: None,
        }
    }

    pub fn observe(&mut self, observer: impl FnMut(&ImportStatus) + 'a) {
        self.observer = Some(Box::new(observer));
    }

    fn set(
        &mut self,
        state: ImportState,
        progress: f64,
        records: u64,
        error: Option<&str>,
    ) -> Result<()> {
        self.store
            .update_import_status(state, progress, records as i64, error)?;
        if let Some(observer) = self.observer.as_mut() {
            let status = self.store.get_import_status()?;
            observer(&status);
        }
        Ok(())
    }

    pub fn parsing(&mut self, progress: f64, records: u64) -> Result<()> {
        self.set(ImportState::Parsing, progress, records, None)
    }

    pub fn computing(&mut self, records: u64) -> Result<()> {
        self.set(ImportState::Computing, COMPUTING_PROGRESS, records, None)
    }

    pub fn complete(&mut self, records: u64) -> Result<()> {
        self.set(ImportState::Complete, 100.0, records, None)
    }

    pub fn failed(&mut self, records: u64, message: &str) -> Result<()> {
        self.set(ImportState::Error, 0.0, records, Some(message))
    }
}
