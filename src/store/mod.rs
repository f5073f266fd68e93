//! Health data storage with SQLite
//!
//! One store wraps one connection. The importer, the aggregator and the read
//! side each open their own; WAL mode lets readers poll the import status
//! while a batch is being written.

mod schema;

use chrono::{Local, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::classify::canonical_metric_name;
use crate::error::Result;
use crate::model::{
    DailySummary, ImportState, ImportStatus, MetricKey, MetricPoint, QuantitySample, SleepSample,
    Workout, WorkoutRow,
};

pub use schema::{DATA_SCHEMA, DROP_DATA, STATUS_SCHEMA};

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Row counts of the raw tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawCounts {
    pub quantity_samples: i64,
    pub sleep_samples: i64,
    pub workouts: i64,
}

pub struct HealthStore {
    conn: Connection,
}

impl HealthStore {
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create missing tables and the status record. Safe on an existing store.
    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(DATA_SCHEMA)?;
        self.conn.execute_batch(STATUS_SCHEMA)?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    // ============================================
    // RAW SAMPLES
    // ============================================

    /// Insert a batch of quantity samples in one transaction
    pub fn insert_quantity_samples(&self, samples: &[QuantitySample]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO quantity_samples
                 (type, value, unit, start_date, end_date, day, source_name, device)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for sample in samples {
                stmt.execute(params![
                    sample.metric,
                    sample.value,
                    sample.unit,
                    sample.start.to_storage(),
                    sample.end.to_storage(),
                    sample.start.day(),
                    sample.source,
                    sample.device,
                ])?;
            }
        }
        tx.commit()?;
        Ok(samples.len())
    }

    /// Insert a batch of sleep samples in one transaction
    pub fn insert_sleep_samples(&self, samples: &[SleepSample]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO sleep_samples (sleep_type, start_date, end_date, day, source_name)
                 VALUES (?, ?, ?, ?, ?)",
            )?;
            for sample in samples {
                stmt.execute(params![
                    sample.stage,
                    sample.start.to_storage(),
                    sample.end.to_storage(),
                    sample.start.day(),
                    sample.source,
                ])?;
            }
        }
        tx.commit()?;
        Ok(samples.len())
    }

    /// Insert a batch of workouts in one transaction
    pub fn insert_workouts(&self, workouts: &[Workout]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO workouts
                 (workout_type, duration_minutes, total_distance, total_energy_burned,
                  start_date, end_date, day, source_name)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for workout in workouts {
                stmt.execute(params![
                    workout.activity_type,
                    workout.duration_minutes,
                    workout.distance,
                    workout.energy_kcal,
                    workout.start.to_storage(),
                    workout.end.to_storage(),
                    workout.start.day(),
                    workout.source,
                ])?;
            }
        }
        tx.commit()?;
        Ok(workouts.len())
    }

    /// Drop every data table, recreate them empty and reset the status to
    /// idle. Dropping avoids a row-by-row delete on multi-million-row tables.
    pub fn clear_all(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(DROP_DATA)?;
        tx.execute_batch(DATA_SCHEMA)?;
        tx.execute(
            "UPDATE import_status
             SET status = 'idle', progress = 0, records_imported = 0, error_message = NULL
             WHERE id = 1",
            [],
        )?;
        tx.commit()?;
        // The status row may have been lost to an external edit
        self.conn.execute_batch(STATUS_SCHEMA)?;
        Ok(())
    }

    /// Number of stored quantity samples
    pub fn get_records_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM quantity_samples", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn raw_counts(&self) -> Result<RawCounts> {
        let counts = self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM quantity_samples),
                    (SELECT COUNT(*) FROM sleep_samples),
                    (SELECT COUNT(*) FROM workouts)",
            [],
            |row| {
                Ok(RawCounts {
                    quantity_samples: row.get(0)?,
                    sleep_samples: row.get(1)?,
                    workouts: row.get(2)?,
                })
            },
        )?;
        Ok(counts)
    }

    // ============================================
    // IMPORT STATUS
    // ============================================

    pub fn get_import_status(&self) -> Result<ImportStatus> {
        let status = self
            .conn
            .query_row(
                "SELECT status, progress, records_imported, last_import, error_message
                 FROM import_status WHERE id = 1",
                [],
                |row| {
                    let state: String = row.get(0)?;
                    Ok(ImportStatus {
                        status: ImportState::parse(&state),
                        progress: row.get(1)?,
                        records_imported: row.get(2)?,
                        last_import: row.get(3)?,
                        error_message: row.get(4)?,
                    })
                },
            )
            .optional()?;

        match status {
            Some(status) => Ok(status),
            None => {
                self.conn.execute_batch(STATUS_SCHEMA)?;
                Ok(ImportStatus::default())
            }
        }
    }

    /// Update the status record in place. Entering `complete` stamps
    /// `last_import`; other states keep the previous value.
    pub fn update_import_status(
        &self,
        state: ImportState,
        progress: f64,
        records_imported: i64,
        error_message: Option<&str>,
    ) -> Result<()> {
        let last_import: Option<NaiveDateTime> =
            (state == ImportState::Complete).then(|| Local::now().naive_local());

        self.conn.execute(
            "INSERT INTO import_status
             (id, status, progress, records_imported, last_import, error_message)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 progress = excluded.progress,
                 records_imported = excluded.records_imported,
                 last_import = COALESCE(excluded.last_import, import_status.last_import),
                 error_message = excluded.error_message",
            params![
                state.as_str(),
                progress,
                records_imported,
                last_import,
                error_message
            ],
        )?;
        Ok(())
    }

    // ============================================
    // DAILY SUMMARY
    // ============================================

    pub fn get_daily_summary(&self, date: NaiveDate) -> Result<Option<DailySummary>> {
        let summary = self
            .conn
            .query_row(
                "SELECT date, steps, active_calories, resting_heart_rate, weight,
                        sleep_hours, workout_minutes, distance_km, flights_climbed
                 FROM daily_summary WHERE date = ?",
                params![date],
                summary_from_row,
            )
            .optional()?;
        Ok(summary)
    }

    /// Summaries with `start <= date <= end`, oldest first
    pub fn get_summaries_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, steps, active_calories, resting_heart_rate, weight,
                    sleep_hours, workout_minutes, distance_km, flights_climbed
             FROM daily_summary
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date",
        )?;
        let rows = stmt.query_map(params![start, end], summary_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// History of one metric by public key. Unknown keys yield no rows.
    pub fn get_metric_history(
        &self,
        key: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MetricPoint>> {
        match MetricKey::parse(key) {
            Some(metric) => self.metric_history(metric, start, end),
            None => Ok(Vec::new()),
        }
    }

    /// Non-null values of one metric with `start <= date <= end`, oldest first
    pub fn metric_history(
        &self,
        metric: MetricKey,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MetricPoint>> {
        // Column names come from a closed enum, never from the caller
        let column = metric.column();
        let sql = format!(
            "SELECT date, {column} FROM daily_summary
             WHERE date >= ?1 AND date <= ?2 AND {column} IS NOT NULL
             ORDER BY date"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![start, end], |row| {
            Ok(MetricPoint {
                date: row.get(0)?,
                value: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Earliest and latest summarized dates
    pub fn get_date_range(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>)> {
        let range = self.conn.query_row(
            "SELECT MIN(date), MAX(date) FROM daily_summary",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(range)
    }

    /// Workouts whose start day falls in the range, newest first
    pub fn get_workouts(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<WorkoutRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, workout_type, duration_minutes, total_distance, total_energy_burned,
                    start_date, end_date, source_name
             FROM workouts
             WHERE day >= ?1 AND day <= ?2
             ORDER BY start_date DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![start, end], |row| {
            Ok(WorkoutRow {
                id: row.get(0)?,
                workout_type: row.get(1)?,
                duration_minutes: row.get(2)?,
                total_distance: row.get(3)?,
                total_energy_burned: row.get(4)?,
                start_date: row.get(5)?,
                end_date: row.get(6)?,
                source_name: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ============================================
    // UNITS
    // ============================================

    pub fn get_unit(&self, metric: &str) -> Result<Option<String>> {
        let unit = self
            .conn
            .query_row(
                "SELECT unit FROM units WHERE metric = ?",
                params![metric],
                |row| row.get(0),
            )
            .optional()?;
        Ok(unit)
    }

    pub fn set_unit(&self, metric: &str, unit: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO units (metric, unit) VALUES (?1, ?2)
             ON CONFLICT(metric) DO UPDATE SET unit = excluded.unit",
            params![metric, unit],
        )?;
        Ok(())
    }

    pub fn get_all_units(&self) -> Result<BTreeMap<String, String>> {
        let mut stmt = self.conn.prepare("SELECT metric, unit FROM units ORDER BY metric")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<BTreeMap<_, _>>>()?)
    }

    /// Record the first non-null unit stored for each quantity identifier
    pub fn detect_units(&self) -> Result<BTreeMap<String, String>> {
        let mut stmt = self.conn.prepare(
            "SELECT q.type, q.unit
             FROM quantity_samples q
             JOIN (SELECT MIN(id) AS first_id
                   FROM quantity_samples
                   WHERE unit IS NOT NULL
                   GROUP BY type) f ON q.id = f.first_id",
        )?;
        let detected = stmt
            .query_map([], |row| {
                let identifier: String = row.get(0)?;
                let unit: String = row.get(1)?;
                Ok((canonical_metric_name(&identifier), unit))
            })?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;

        for (metric, unit) in &detected {
            self.set_unit(metric, unit)?;
        }
        Ok(detected)
    }

    #[cfg(test)]
    pub(crate) fn insert_summary(&self, summary: &DailySummary) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO daily_summary
             (date, steps, active_calories, resting_heart_rate, weight,
              sleep_hours, workout_minutes, distance_km, flights_climbed)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                summary.date,
                summary.steps,
                summary.active_calories,
                summary.resting_heart_rate,
                summary.weight,
                summary.sleep_hours,
                summary.workout_minutes,
                summary.distance_km,
                summary.flights_climbed,
            ],
        )?;
        Ok(())
    }
}

fn summary_from_row(row: &Row) -> rusqlite::Result<DailySummary> {
    Ok(DailySummary {
        date: row.get(0)?,
        steps: row.get(1)?,
        active_calories: row.get(2)?,
        resting_heart_rate: row.get(3)?,
        weight: row.get(4)?,
        sleep_hours: row.get(5)?,
        workout_minutes: row.get(6)?,
        distance_km: row.get(7)?,
        flights_climbed: row.get(8)?,
    })
}
