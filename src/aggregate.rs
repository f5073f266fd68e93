//! Daily summary aggregation
//!
//! Rebuilds `daily_summary` from the raw tables in a single transaction,
//! one SQL pass per metric. Dates come from the union of all three raw
//! tables, so a day with only a workout or only sleep still gets a row.
//! SQL `SUM`/`AVG` skip NULL values and return NULL over no rows, which
//! gives the "no samples means NULL, not 0" rule for free.

use rusqlite::params;
use tracing::{debug, info};

use crate::classify::{
    ACTIVE_ENERGY_BURNED, ASLEEP_STAGES, BODY_MASS, DISTANCE_WALKING_RUNNING, FLIGHTS_CLIMBED,
    RESTING_HEART_RATE, STEP_COUNT,
};
use crate::error::Result;
use crate::store::HealthStore;

/// Raw distance sums above this are taken to be meters
pub const METERS_THRESHOLD: f64 = 1000.0;

const COLLECT_DATES: &str = "
    INSERT INTO daily_summary (date)
    SELECT day FROM quantity_samples
    UNION
    SELECT day FROM workouts
    UNION
    SELECT day FROM sleep_samples";

const SUM_AS_INTEGER: &str = "
    UPDATE daily_summary SET {column} = (
        SELECT CAST(ROUND(SUM(q.value)) AS INTEGER) FROM quantity_samples q
        WHERE q.type = ?1 AND q.day = daily_summary.date)";

const SUM: &str = "
    UPDATE daily_summary SET {column} = (
        SELECT SUM(q.value) FROM quantity_samples q
        WHERE q.type = ?1 AND q.day = daily_summary.date)";

const MEAN: &str = "
    UPDATE daily_summary SET {column} = (
        SELECT AVG(q.value) FROM quantity_samples q
        WHERE q.type = ?1 AND q.day = daily_summary.date)";

// Threshold applies to the day's total, not to individual samples
const DISTANCE: &str = "
    UPDATE daily_summary SET distance_km = (
        SELECT CASE WHEN SUM(q.value) > ?2 THEN SUM(q.value) / 1000.0 ELSE SUM(q.value) END
        FROM quantity_samples q
        WHERE q.type = ?1 AND q.day = daily_summary.date)";

// Latest start instant wins; equal starts go to the most recently stored row.
// julianday() applies the stored offset, so samples from different zones compare
// by instant rather than by text.
const LATEST_WEIGHT: &str = "
    UPDATE daily_summary SET weight = (
        SELECT q.value FROM quantity_samples q
        WHERE q.type = ?1 AND q.day = daily_summary.date AND q.value IS NOT NULL
        ORDER BY julianday(q.start_date) DESC, q.id DESC
        LIMIT 1)";

const WORKOUT_MINUTES: &str = "
    UPDATE daily_summary SET workout_minutes = (
        SELECT SUM(w.duration_minutes) FROM workouts w
        WHERE w.day = daily_summary.date)";

const SLEEP_HOURS: &str = "
    UPDATE daily_summary SET sleep_hours = (
        SELECT SUM((julianday(s.end_date) - julianday(s.start_date)) * 24.0)
        FROM sleep_samples s
        WHERE s.sleep_type IN (?1, ?2, ?3, ?4) AND s.day = daily_summary.date)";

pub struct Aggregator<'a> {
    store: &'a HealthStore,
}

impl<'a> Aggregator<'a> {
    pub fn new(store: &'a HealthStore) -> Self {
        Self { store }
    }

    /// Replace the daily summary table with a fresh aggregation of the raw
    /// tables. Returns the number of summarized days.
    pub fn recompute(&self) -> Result<usize> {
        let tx = self.store.conn().unchecked_transaction()?;

        tx.execute("DELETE FROM daily_summary", [])?;
        let days = tx.execute(COLLECT_DATES, [])?;
        debug!(days, "collected summary dates");

        for (template, column, metric) in [
            (SUM_AS_INTEGER, "steps", STEP_COUNT),
            (SUM, "active_calories", ACTIVE_ENERGY_BURNED),
            (MEAN, "resting_heart_rate", RESTING_HEART_RATE),
            (SUM_AS_INTEGER, "flights_climbed", FLIGHTS_CLIMBED),
        ] {
            tx.execute(&template.replace("{column}", column), params![metric])?;
        }

        tx.execute(DISTANCE, params![DISTANCE_WALKING_RUNNING, METERS_THRESHOLD])?;
        tx.execute(LATEST_WEIGHT, params![BODY_MASS])?;
        tx.execute(WORKOUT_MINUTES, [])?;
        tx.execute(
            SLEEP_HOURS,
            params![
                ASLEEP_STAGES[0],
                ASLEEP_STAGES[1],
                ASLEEP_STAGES[2],
                ASLEEP_STAGES[3]
            ],
        )?;

        tx.commit()?;
        info!(days, "daily summaries recomputed");
        Ok(days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::parse_timestamp;
    use crate::model::{DailySummary, QuantitySample, SleepSample, Workout};
    use chrono::NaiveDate;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample(metric: &str, value: Option<f64>, start: &str) -> QuantitySample {
        QuantitySample {
            metric: metric.to_string(),
            value,
            unit: None,
            start: parse_timestamp(start),
            end: parse_timestamp(start),
            source: None,
            device: None,
        }
    }

    fn sleep(stage: &str, start: &str, end: &str) -> SleepSample {
        SleepSample {
            stage: stage.to_string(),
            start: parse_timestamp(start),
            end: parse_timestamp(end),
            source: None,
        }
    }

    fn workout(minutes: Option<f64>, start: &str) -> Workout {
        Workout {
            activity_type: "HKWorkoutActivityTypeRunning".to_string(),
            duration_minutes: minutes,
            distance: None,
            energy_kcal: None,
            start: parse_timestamp(start),
            end: parse_timestamp(start),
            source: None,
        }
    }

    fn summary(store: &HealthStore, date: &str) -> DailySummary {
        store.get_daily_summary(day(date)).unwrap().unwrap()
    }

    #[test]
    fn test_sums_steps_and_calories() {
        let store = HealthStore::open_in_memory().unwrap();
        store
            .insert_quantity_samples(&[
                sample(STEP_COUNT, Some(5000.0), "2024-01-14 08:00:00"),
                sample(STEP_COUNT, Some(3000.0), "2024-01-14 12:00:00"),
                sample(ACTIVE_ENERGY_BURNED, Some(450.0), "2024-01-14 08:00:00"),
            ])
            .unwrap();

        assert_eq!(Aggregator::new(&store).recompute().unwrap(), 1);

        let s = summary(&store, "2024-01-14");
        assert_eq!(s.steps, Some(8000));
        assert_eq!(s.active_calories, Some(450.0));
    }

    #[test]
    fn test_missing_metrics_are_null() {
        let store = HealthStore::open_in_memory().unwrap();
        store
            .insert_quantity_samples(&[
                sample(STEP_COUNT, Some(5000.0), "2024-01-14 08:00:00"),
                sample(RESTING_HEART_RATE, None, "2024-01-14 08:00:00"),
            ])
            .unwrap();
        Aggregator::new(&store).recompute().unwrap();

        let s = summary(&store, "2024-01-14");
        assert_eq!(s.active_calories, None);
        assert_eq!(s.resting_heart_rate, None);
        assert_eq!(s.weight, None);
        assert_eq!(s.sleep_hours, None);
        assert_eq!(s.workout_minutes, None);
        assert_eq!(s.distance_km, None);
        assert_eq!(s.flights_climbed, None);
    }

    #[test]
    fn test_mean_excludes_null_values() {
        let store = HealthStore::open_in_memory().unwrap();
        store
            .insert_quantity_samples(&[
                sample(RESTING_HEART_RATE, Some(60.0), "2024-01-14 06:00:00"),
                sample(RESTING_HEART_RATE, None, "2024-01-14 07:00:00"),
                sample(RESTING_HEART_RATE, Some(70.0), "2024-01-14 08:00:00"),
            ])
            .unwrap();
        Aggregator::new(&store).recompute().unwrap();

        assert_eq!(summary(&store, "2024-01-14").resting_heart_rate, Some(65.0));
    }

    #[test]
    fn test_distance_heuristic_applies_to_daily_sum() {
        let store = HealthStore::open_in_memory().unwrap();
        store
            .insert_quantity_samples(&[
                sample(DISTANCE_WALKING_RUNNING, Some(900.0), "2024-01-14 08:00:00"),
                sample(DISTANCE_WALKING_RUNNING, Some(600.0), "2024-01-14 12:00:00"),
                sample(DISTANCE_WALKING_RUNNING, Some(500.0), "2024-01-15 08:00:00"),
                sample(DISTANCE_WALKING_RUNNING, Some(4.5), "2024-01-16 08:00:00"),
            ])
            .unwrap();
        Aggregator::new(&store).recompute().unwrap();

        assert_eq!(summary(&store, "2024-01-14").distance_km, Some(1.5));
        assert_eq!(summary(&store, "2024-01-15").distance_km, Some(500.0));
        assert_eq!(summary(&store, "2024-01-16").distance_km, Some(4.5));
    }

    #[test]
    fn test_weight_takes_latest_sample_of_day() {
        let store = HealthStore::open_in_memory().unwrap();
        store
            .insert_quantity_samples(&[
                sample(BODY_MASS, Some(76.0), "2024-01-14 19:00:00 -0500"),
                sample(BODY_MASS, Some(75.5), "2024-01-14 07:00:00 -0500"),
                sample(BODY_MASS, None, "2024-01-14 21:00:00 -0500"),
            ])
            .unwrap();
        Aggregator::new(&store).recompute().unwrap();

        assert_eq!(summary(&store, "2024-01-14").weight, Some(76.0));
    }

    #[test]
    fn test_weight_orders_by_instant_across_offsets() {
        let store = HealthStore::open_in_memory().unwrap();
        store
            .insert_quantity_samples(&[
                // 2024-01-15 00:00 UTC
                sample(BODY_MASS, Some(76.0), "2024-01-14 19:00:00 -0500"),
                // 2024-01-14 11:00 UTC, later wall clock but earlier instant
                sample(BODY_MASS, Some(80.0), "2024-01-14 20:00:00 +0900"),
            ])
            .unwrap();
        Aggregator::new(&store).recompute().unwrap();

        assert_eq!(summary(&store, "2024-01-14").weight, Some(76.0));
    }

    #[test]
    fn test_weight_tie_goes_to_last_stored_row() {
        let store = HealthStore::open_in_memory().unwrap();
        store
            .insert_quantity_samples(&[
                sample(BODY_MASS, Some(75.0), "2024-01-14 07:00:00"),
                sample(BODY_MASS, Some(74.0), "2024-01-14 07:00:00"),
            ])
            .unwrap();
        Aggregator::new(&store).recompute().unwrap();

        assert_eq!(summary(&store, "2024-01-14").weight, Some(74.0));
    }

    #[test]
    fn test_sleep_counts_only_asleep_stages() {
        let store = HealthStore::open_in_memory().unwrap();
        store
            .insert_sleep_samples(&[
                sleep(
                    "HKCategoryValueSleepAnalysisInBed",
                    "2024-01-14 22:00:00 -0500",
                    "2024-01-15 06:00:00 -0500",
                ),
                sleep(
                    "HKCategoryValueSleepAnalysisAwake",
                    "2024-01-14 22:30:00 -0500",
                    "2024-01-14 23:00:00 -0500",
                ),
                sleep(
                    "HKCategoryValueSleepAnalysisAsleepCore",
                    "2024-01-14 23:00:00 -0500",
                    "2024-01-15 02:00:00 -0500",
                ),
            ])
            .unwrap();
        Aggregator::new(&store).recompute().unwrap();

        let hours = summary(&store, "2024-01-14").sleep_hours.unwrap();
        assert!((hours - 3.0).abs() < 1e-6, "got {}", hours);
    }

    #[test]
    fn test_in_bed_only_day_has_null_sleep() {
        let store = HealthStore::open_in_memory().unwrap();
        store
            .insert_sleep_samples(&[sleep(
                "HKCategoryValueSleepAnalysisInBed",
                "2024-01-14 22:00:00",
                "2024-01-15 06:00:00",
            )])
            .unwrap();
        Aggregator::new(&store).recompute().unwrap();

        assert_eq!(summary(&store, "2024-01-14").sleep_hours, None);
    }

    #[test]
    fn test_dates_are_union_of_all_sources() {
        let store = HealthStore::open_in_memory().unwrap();
        store
            .insert_quantity_samples(&[sample(STEP_COUNT, Some(100.0), "2024-01-14 08:00:00")])
            .unwrap();
        store
            .insert_workouts(&[
                workout(Some(30.0), "2024-01-15 18:00:00"),
                workout(None, "2024-01-15 19:00:00"),
                workout(Some(15.0), "2024-01-15 20:00:00"),
            ])
            .unwrap();
        store
            .insert_sleep_samples(&[sleep(
                "HKCategoryValueSleepAnalysisAsleep",
                "2024-01-16 23:00:00",
                "2024-01-17 01:30:00",
            )])
            .unwrap();

        assert_eq!(Aggregator::new(&store).recompute().unwrap(), 3);

        let workout_day = summary(&store, "2024-01-15");
        assert_eq!(workout_day.workout_minutes, Some(45.0));
        assert_eq!(workout_day.steps, None);

        let sleep_day = summary(&store, "2024-01-16");
        assert!((sleep_day.sleep_hours.unwrap() - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_recompute_is_idempotent_and_replaces() {
        let store = HealthStore::open_in_memory().unwrap();
        store
            .insert_quantity_samples(&[
                sample(STEP_COUNT, Some(5000.0), "2024-01-14 08:00:00"),
                sample(STEP_COUNT, Some(6000.0), "2024-01-15 08:00:00"),
                sample(BODY_MASS, Some(75.5), "2024-01-15 07:00:00"),
            ])
            .unwrap();
        let aggregator = Aggregator::new(&store);

        aggregator.recompute().unwrap();
        let first = store
            .get_summaries_in_range(day("2024-01-01"), day("2024-12-31"))
            .unwrap();
        aggregator.recompute().unwrap();
        let second = store
            .get_summaries_in_range(day("2024-01-01"), day("2024-12-31"))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);

        // A stale row with no raw data behind it disappears
        store
            .insert_summary(&DailySummary::empty(day("2023-06-01")))
            .unwrap();
        aggregator.recompute().unwrap();
        assert_eq!(store.get_daily_summary(day("2023-06-01")).unwrap(), None);
    }

    #[test]
    fn test_empty_store_yields_no_rows() {
        let store = HealthStore::open_in_memory().unwrap();
        assert_eq!(Aggregator::new(&store).recompute().unwrap(), 0);
        assert_eq!(store.get_date_range().unwrap(), (None, None));
    }
}
