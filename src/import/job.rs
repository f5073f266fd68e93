//! Background import job
//!
//! The import runs on the blocking pool with its own store connection, so
//! the caller keeps serving status reads from another connection while it
//! runs.

use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::{ImportOptions, ImportResult, Importer};
use crate::error::{HealthError, Result};
use crate::model::ImportState;
use crate::store::HealthStore;

const EXPORT_FILE_NAME: &str = "export.xml";
const SEARCH_DEPTH: usize = 3;

#[derive(Debug)]
pub struct ImportJob {
    db_path: PathBuf,
    export: PathBuf,
    handle: JoinHandle<Result<ImportResult>>,
}

impl ImportJob {
    /// Start importing `export` into the database at `db_path`
    pub fn spawn(db_path: PathBuf, export: PathBuf, options: ImportOptions) -> Self {
        let path = export.clone();
        let job_db = db_path.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let store = match HealthStore::open(&job_db) {
                Ok(store) => store,
                Err(e) => {
                    error!(error = %e, db = %job_db.display(), "import job could not open store");
                    record_failure(&job_db, &e.to_string());
                    return Err(e);
                }
            };
            let outcome = Importer::new(&store, options).import_file(&path);
            outcome
        });
        info!(export = %export.display(), "import job started");
        Self {
            db_path,
            export,
            handle,
        }
    }

    pub fn export(&self) -> &Path {
        &self.export
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the job and return its outcome
    pub async fn wait(self) -> Result<ImportResult> {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "import job panicked or was cancelled");
                let err = HealthError::Task(e.to_string());
                record_failure(&self.db_path, &err.to_string());
                Err(err)
            }
        }
    }
}

/// Best-effort write of an error status when the import could not record
/// its own failure. Leaves the status alone if no import is active.
pub(crate) fn record_failure(db_path: &Path, message: &str) {
    let written = HealthStore::open(db_path).and_then(|store| {
        let status = store.get_import_status()?;
        if status.status.is_active() {
            store.update_import_status(
                ImportState::Error,
                0.0,
                status.records_imported,
                Some(message),
            )?;
        }
        Ok(())
    });
    if let Err(e) = written {
        error!(error = %e, db = %db_path.display(), "could not record import failure");
    }
}

/// Locate the export document under `dir`.
/// A direct `export.xml` wins over one found in a subdirectory, such as the
/// `apple_health_export/` folder an unpacked archive produces.
pub fn find_export(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(HealthError::NotFound(format!(
            "data directory {} does not exist",
            dir.display()
        )));
    }

    walkdir::WalkDir::new(dir)
        .max_depth(SEARCH_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .map_or(false, |name| name.eq_ignore_ascii_case(EXPORT_FILE_NAME))
        })
        .min_by_key(|entry| entry.depth())
        .map(|entry| entry.into_path())
        .ok_or_else(|| {
            HealthError::NotFound(format!(
                "no {} found under {}",
                EXPORT_FILE_NAME,
                dir.display()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const EXPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<HealthData locale="en_US">
  <Record type="HKQuantityTypeIdentifierStepCount" unit="count" value="1200" startDate="2024-03-02 08:00:00 +0000" endDate="2024-03-02 09:00:00 +0000"/>
  <Record type="HKQuantityTypeIdentifierStepCount" unit="count" value="800" startDate="2024-03-03 08:00:00 +0000" endDate="2024-03-03 09:00:00 +0000"/>
</HealthData>"#;

    #[test]
    fn test_find_export_prefers_shallowest() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("apple_health_export");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("export.xml"), EXPORT).unwrap();

        assert_eq!(find_export(dir.path()).unwrap(), nested.join("export.xml"));

        fs::write(dir.path().join("export.xml"), EXPORT).unwrap();
        assert_eq!(
            find_export(dir.path()).unwrap(),
            dir.path().join("export.xml")
        );
    }

    #[test]
    fn test_find_export_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("export_cda.xml"), "<x/>").unwrap();
        assert!(matches!(
            find_export(dir.path()),
            Err(HealthError::NotFound(_))
        ));
        assert!(matches!(
            find_export(&dir.path().join("absent")),
            Err(HealthError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_job_imports_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let export = dir.path().join("export.xml");
        fs::write(&export, EXPORT).unwrap();
        let db_path = dir.path().join("health.db");

        let job = ImportJob::spawn(db_path.clone(), export.clone(), ImportOptions::default());
        assert_eq!(job.export(), export.as_path());
        let result = job.wait().await.unwrap();
        assert_eq!(result.records_imported, 2);
        assert_eq!(result.summary_days, 2);

        let store = HealthStore::open(&db_path).unwrap();
        assert_eq!(store.get_import_status().unwrap().status, ImportState::Complete);
    }

    #[test]
    fn test_record_failure_releases_active_status() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let store = HealthStore::open(&db_path).unwrap();
        store
            .update_import_status(ImportState::Parsing, 40.0, 800, None)
            .unwrap();

        record_failure(&db_path, "Background task failed: panicked");

        let status = store.get_import_status().unwrap();
        assert_eq!(status.status, ImportState::Error);
        assert_eq!(status.progress, 0.0);
        assert_eq!(status.records_imported, 800);
        assert_eq!(
            status.error_message.as_deref(),
            Some("Background task failed: panicked")
        );
    }

    #[test]
    fn test_record_failure_keeps_finished_status() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let store = HealthStore::open(&db_path).unwrap();
        store
            .update_import_status(ImportState::Complete, 100.0, 12, None)
            .unwrap();

        record_failure(&db_path, "late failure");
        assert_eq!(store.get_import_status().unwrap().status, ImportState::Complete);
    }

    #[tokio::test]
    async fn test_job_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let export = dir.path().join("export.xml");
        fs::write(&export, "<HealthData><Record type=\"x\"/>").unwrap();
        let db_path = dir.path().join("health.db");

        let err = ImportJob::spawn(db_path.clone(), export, ImportOptions::default())
            .wait()
            .await
            .unwrap_err();
        assert!(matches!(err, HealthError::Malformed(_)));

        let store = HealthStore::open(&db_path).unwrap();
        let status = store.get_import_status().unwrap();
        assert_eq!(status.status, ImportState::Error);
        assert_eq!(status.records_imported, 1);
    }
}
