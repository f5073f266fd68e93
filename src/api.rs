//! Read and write surface of the health store
//!
//! `HealthApi` is what the CLI and any outer transport call. It validates
//! arguments before they reach storage and refuses to mutate data while an
//! import is running.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::Config;
use crate::error::{HealthError, Result};
use crate::import::{find_export, ImportJob, ImportOptions};
use crate::insights::{CorrelationReport, Insights, PersonalRecord, TrendReport, WeeklySummary};
use crate::model::{DailySummary, ImportState, ImportStatus, MetricKey, MetricPoint, WorkoutRow};
use crate::store::HealthStore;

pub const DEFAULT_HISTORY_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub status: ImportStatus,
    pub records_count: i64,
    pub date_range: DateRange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    #[serde(flatten)]
    pub status: ImportStatus,
    pub date_range: DateRange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricHistory {
    pub metric: MetricKey,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub data: Vec<MetricPoint>,
}

pub struct HealthApi {
    store: HealthStore,
    db_path: PathBuf,
    data_dir: PathBuf,
    options: ImportOptions,
}

impl HealthApi {
    pub fn open(config: &Config) -> Result<Self> {
        Self::new(
            config.database_path(),
            config.data_dir(),
            config.import_options(),
        )
    }

    pub fn new(db_path: PathBuf, data_dir: PathBuf, options: ImportOptions) -> Result<Self> {
        let store = HealthStore::open(&db_path)?;
        Ok(Self {
            store,
            db_path,
            data_dir,
            options,
        })
    }

    pub fn store(&self) -> &HealthStore {
        &self.store
    }

    // ============================================
    // STATUS
    // ============================================

    pub fn overview(&self) -> Result<Overview> {
        Ok(Overview {
            status: self.store.get_import_status()?,
            records_count: self.store.get_records_count()?,
            date_range: self.date_range()?,
        })
    }

    pub fn status(&self) -> Result<StatusReport> {
        Ok(StatusReport {
            status: self.store.get_import_status()?,
            date_range: self.date_range()?,
        })
    }

    pub fn date_range(&self) -> Result<DateRange> {
        let (min_date, max_date) = self.store.get_date_range()?;
        Ok(DateRange { min_date, max_date })
    }

    // ============================================
    // QUERIES
    // ============================================

    /// Summary for `date` (default `today`). A day without data yields an
    /// all-null summary.
    pub fn daily_summary(&self, date: Option<NaiveDate>, today: NaiveDate) -> Result<DailySummary> {
        let date = date.unwrap_or(today);
        Ok(self
            .store
            .get_daily_summary(date)?
            .unwrap_or_else(|| DailySummary::empty(date)))
    }

    pub fn range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailySummary>> {
        check_range(start, end)?;
        self.store.get_summaries_in_range(start, end)
    }

    /// History of one metric. `end` defaults to `today` and `start` to
    /// `days` before `end`.
    pub fn metric_history(
        &self,
        key: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        days: u32,
        today: NaiveDate,
    ) -> Result<MetricHistory> {
        let metric = MetricKey::parse(key).ok_or_else(|| {
            let known: Vec<&str> = MetricKey::ALL.iter().map(|k| k.as_str()).collect();
            HealthError::invalid(format!(
                "unknown metric '{}', expected one of: {}",
                key,
                known.join(", ")
            ))
        })?;
        let (start, end) = default_window(start, end, days, today);
        check_range(start, end)?;

        Ok(MetricHistory {
            metric,
            start,
            end,
            data: self.store.metric_history(metric, start, end)?,
        })
    }

    pub fn workouts(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        days: u32,
        today: NaiveDate,
    ) -> Result<Vec<WorkoutRow>> {
        let (start, end) = default_window(start, end, days, today);
        check_range(start, end)?;
        self.store.get_workouts(start, end)
    }

    // ============================================
    // UNITS
    // ============================================

    pub fn units(&self) -> Result<BTreeMap<String, String>> {
        self.store.get_all_units()
    }

    pub fn unit(&self, metric: &str) -> Result<Option<String>> {
        self.store.get_unit(metric)
    }

    pub fn set_unit(&self, metric: &str, unit: &str) -> Result<()> {
        if metric.trim().is_empty() || unit.trim().is_empty() {
            return Err(HealthError::invalid("metric and unit must not be empty"));
        }
        self.store.set_unit(metric, unit)
    }

    pub fn detect_units(&self) -> Result<BTreeMap<String, String>> {
        self.store.detect_units()
    }

    // ============================================
    // INSIGHTS
    // ============================================

    pub fn trends(&self, days: u32, today: NaiveDate) -> Result<TrendReport> {
        Insights::new(&self.store).trends(days, today)
    }

    pub fn correlations(&self, days: u32, today: NaiveDate) -> Result<CorrelationReport> {
        Insights::new(&self.store).correlations(days, today)
    }

    pub fn personal_records(&self) -> Result<Vec<PersonalRecord>> {
        Insights::new(&self.store).personal_records()
    }

    pub fn weekly_summary(&self, today: NaiveDate) -> Result<Option<WeeklySummary>> {
        Insights::new(&self.store).weekly_summary(today)
    }

    // ============================================
    // MUTATIONS
    // ============================================

    /// Start a background import of `export`.
    /// Must be called from within a tokio runtime.
    pub fn trigger_import(&self, export: &Path) -> Result<ImportJob> {
        self.ensure_idle()?;
        if !export.is_file() {
            return Err(HealthError::NotFound(format!(
                "export file {} does not exist",
                export.display()
            )));
        }

        // Claim the status slot before the job starts so a second request
        // sees the conflict.
        self.store
            .update_import_status(ImportState::Parsing, 0.0, 0, None)?;
        Ok(ImportJob::spawn(
            self.db_path.clone(),
            export.to_path_buf(),
            self.options.clone(),
        ))
    }

    /// Import the `export.xml` found under the configured data directory
    pub fn import_local(&self) -> Result<ImportJob> {
        self.ensure_idle()?;
        let export = find_export(&self.data_dir)?;
        self.trigger_import(&export)
    }

    /// Drop all health data and reset the status to idle
    pub fn clear_all(&self) -> Result<()> {
        self.ensure_idle()?;
        self.store.clear_all()?;
        info!("cleared all health data");
        Ok(())
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.store.get_import_status()?.status.is_active() {
            return Err(HealthError::Conflict);
        }
        Ok(())
    }
}

fn default_window(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    days: u32,
    today: NaiveDate,
) -> (NaiveDate, NaiveDate) {
    let end = end.unwrap_or(today);
    let start = start.unwrap_or_else(|| end - Duration::days(i64::from(days)));
    (start, end)
}

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        return Err(HealthError::invalid(format!(
            "start date {} is after end date {}",
            start, end
        )));
    }
    Ok(())
}
