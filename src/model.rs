//! Data model shared by the importer, the aggregator and the store

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A sample timestamp as written in the export.
///
/// Exports normally carry an explicit numeric offset; older or hand-made
/// files may not. Both keep their local wall-clock time, which is what the
/// calendar date of a sample is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Zoned(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl Timestamp {
    /// Wall-clock time in the timestamp's own offset
    pub fn local(&self) -> NaiveDateTime {
        match self {
            Timestamp::Zoned(dt) => dt.naive_local(),
            Timestamp::Naive(dt) => *dt,
        }
    }

    /// Calendar date used as the daily aggregation key
    pub fn day(&self) -> NaiveDate {
        self.local().date()
    }

    /// Text form stored in the raw tables: local wall-clock time followed by
    /// the offset when known. Text order is not instant order once offsets
    /// differ, so queries compare through `julianday()`.
    pub fn to_storage(&self) -> String {
        match self {
            Timestamp::Zoned(dt) => dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            Timestamp::Naive(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_storage())
    }
}

/// A numeric health sample (steps, heart rate, body mass, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct QuantitySample {
    /// One of the recognized quantity identifiers
    pub metric: String,
    /// `None` when the export value was missing or not a number
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub start: Timestamp,
    pub end: Timestamp,
    pub source: Option<String>,
    pub device: Option<String>,
}

/// A sleep-analysis interval
#[derive(Debug, Clone, PartialEq)]
pub struct SleepSample {
    /// Raw stage label; [`crate::classify::ASLEEP_STAGES`] lists the ones counted
    pub stage: String,
    pub start: Timestamp,
    pub end: Timestamp,
    pub source: Option<String>,
}

/// A recorded workout
#[derive(Debug, Clone, PartialEq)]
pub struct Workout {
    pub activity_type: String,
    pub duration_minutes: Option<f64>,
    pub distance: Option<f64>,
    pub energy_kcal: Option<f64>,
    pub start: Timestamp,
    pub end: Timestamp,
    pub source: Option<String>,
}

/// One pre-aggregated row per calendar date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub steps: Option<i64>,
    pub active_calories: Option<f64>,
    pub resting_heart_rate: Option<f64>,
    pub weight: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub workout_minutes: Option<f64>,
    pub distance_km: Option<f64>,
    pub flights_climbed: Option<i64>,
}

impl DailySummary {
    /// Summary for a date with no data at all
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            steps: None,
            active_calories: None,
            resting_heart_rate: None,
            weight: None,
            sleep_hours: None,
            workout_minutes: None,
            distance_km: None,
            flights_climbed: None,
        }
    }

    /// Value of a single metric as a float
    pub fn metric(&self, key: MetricKey) -> Option<f64> {
        match key {
            MetricKey::Steps => self.steps.map(|v| v as f64),
            MetricKey::Calories => self.active_calories,
            MetricKey::HeartRate => self.resting_heart_rate,
            MetricKey::Weight => self.weight,
            MetricKey::Sleep => self.sleep_hours,
            MetricKey::Workouts => self.workout_minutes,
            MetricKey::Distance => self.distance_km,
            MetricKey::Flights => self.flights_climbed.map(|v| v as f64),
        }
    }
}

/// A workout as stored, for read queries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutRow {
    pub id: i64,
    pub workout_type: String,
    pub duration_minutes: Option<f64>,
    pub total_distance: Option<f64>,
    pub total_energy_burned: Option<f64>,
    pub start_date: String,
    pub end_date: String,
    pub source_name: Option<String>,
}

/// One point of a metric history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Public metric keys accepted by history queries.
///
/// Each key maps to a fixed daily-summary column; caller text never reaches
/// the SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    Steps,
    Calories,
    HeartRate,
    Weight,
    Sleep,
    Workouts,
    Distance,
    Flights,
}

impl MetricKey {
    pub const ALL: [MetricKey; 8] = [
        MetricKey::Steps,
        MetricKey::Calories,
        MetricKey::HeartRate,
        MetricKey::Weight,
        MetricKey::Sleep,
        MetricKey::Workouts,
        MetricKey::Distance,
        MetricKey::Flights,
    ];

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::Steps => "steps",
            MetricKey::Calories => "calories",
            MetricKey::HeartRate => "heart_rate",
            MetricKey::Weight => "weight",
            MetricKey::Sleep => "sleep",
            MetricKey::Workouts => "workouts",
            MetricKey::Distance => "distance",
            MetricKey::Flights => "flights",
        }
    }

    /// Daily-summary column holding this metric
    pub fn column(&self) -> &'static str {
        match self {
            MetricKey::Steps => "steps",
            MetricKey::Calories => "active_calories",
            MetricKey::HeartRate => "resting_heart_rate",
            MetricKey::Weight => "weight",
            MetricKey::Sleep => "sleep_hours",
            MetricKey::Workouts => "workout_minutes",
            MetricKey::Distance => "distance_km",
            MetricKey::Flights => "flights_climbed",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Import lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportState {
    #[default]
    Idle,
    Parsing,
    Computing,
    Complete,
    Error,
}

impl ImportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportState::Idle => "idle",
            ImportState::Parsing => "parsing",
            ImportState::Computing => "computing",
            ImportState::Complete => "complete",
            ImportState::Error => "error",
        }
    }

    /// Unknown text maps to `Idle`, matching a freshly created record
    pub fn parse(s: &str) -> Self {
        match s {
            "parsing" => ImportState::Parsing,
            "computing" => ImportState::Computing,
            "complete" => ImportState::Complete,
            "error" => ImportState::Error,
            _ => ImportState::Idle,
        }
    }

    /// An import is running and owns the raw tables
    pub fn is_active(&self) -> bool {
        matches!(self, ImportState::Parsing | ImportState::Computing)
    }
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The singleton import status record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImportStatus {
    pub status: ImportState,
    /// 0-100
    pub progress: f64,
    pub records_imported: i64,
    pub last_import: Option<NaiveDateTime>,
    pub error_message: Option<String>,
}
