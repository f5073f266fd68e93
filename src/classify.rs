//! Event classification
//!
//! Maps raw export elements onto quantity samples, sleep samples and
//! workouts. Identifiers outside the fixed vocabulary are dropped. Numeric
//! and timestamp fields never fail the import: bad numbers become `None`
//! and bad timestamps fall back to the current time.

use chrono::{DateTime, Local, NaiveDateTime};
use tracing::warn;

use crate::model::{QuantitySample, SleepSample, Timestamp, Workout};

pub const STEP_COUNT: &str = "HKQuantityTypeIdentifierStepCount";
pub const DISTANCE_WALKING_RUNNING: &str = "HKQuantityTypeIdentifierDistanceWalkingRunning";
pub const ACTIVE_ENERGY_BURNED: &str = "HKQuantityTypeIdentifierActiveEnergyBurned";
pub const FLIGHTS_CLIMBED: &str = "HKQuantityTypeIdentifierFlightsClimbed";
pub const RESTING_HEART_RATE: &str = "HKQuantityTypeIdentifierRestingHeartRate";
pub const BODY_MASS: &str = "HKQuantityTypeIdentifierBodyMass";

pub const SLEEP_ANALYSIS: &str = "HKCategoryTypeIdentifierSleepAnalysis";

/// Quantity identifiers that are kept
pub const QUANTITY_TYPES: [&str; 18] = [
    STEP_COUNT,
    DISTANCE_WALKING_RUNNING,
    ACTIVE_ENERGY_BURNED,
    "HKQuantityTypeIdentifierBasalEnergyBurned",
    FLIGHTS_CLIMBED,
    "HKQuantityTypeIdentifierHeartRate",
    RESTING_HEART_RATE,
    "HKQuantityTypeIdentifierWalkingHeartRateAverage",
    BODY_MASS,
    "HKQuantityTypeIdentifierBodyMassIndex",
    "HKQuantityTypeIdentifierBodyFatPercentage",
    "HKQuantityTypeIdentifierHeight",
    "HKQuantityTypeIdentifierBloodPressureSystolic",
    "HKQuantityTypeIdentifierBloodPressureDiastolic",
    "HKQuantityTypeIdentifierOxygenSaturation",
    "HKQuantityTypeIdentifierRespiratoryRate",
    "HKQuantityTypeIdentifierAppleStandTime",
    "HKQuantityTypeIdentifierAppleExerciseTime",
];

const TIMESTAMP_WITH_OFFSET: &str = "%Y-%m-%d %H:%M:%S %z";
const TIMESTAMP_NAIVE: &str = "%Y-%m-%d %H:%M:%S";

/// Export element kinds the importer cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Record,
    Workout,
}

impl ElementKind {
    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"Record" => Some(ElementKind::Record),
            b"Workout" => Some(ElementKind::Workout),
            _ => None,
        }
    }
}

/// One element pulled from the export, reduced to its attributes
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub kind: ElementKind,
    attributes: Vec<(String, String)>,
}

impl RawEvent {
    pub fn new(kind: ElementKind, attributes: Vec<(String, String)>) -> Self {
        Self { kind, attributes }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn owned(&self, name: &str) -> Option<String> {
        self.attr(name).map(String::from)
    }

    fn timestamp(&self, name: &str) -> Timestamp {
        parse_timestamp(self.attr(name).unwrap_or_default())
    }
}

/// Result of classifying one raw event
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Quantity(QuantitySample),
    Sleep(SleepSample),
    Workout(Workout),
    Ignored,
}

/// Labels counted toward sleep hours
pub const ASLEEP_STAGES: [&str; 4] = [
    "HKCategoryValueSleepAnalysisAsleepCore",
    "HKCategoryValueSleepAnalysisAsleepDeep",
    "HKCategoryValueSleepAnalysisAsleepREM",
    "HKCategoryValueSleepAnalysisAsleep",
];

pub fn is_quantity_type(identifier: &str) -> bool {
    QUANTITY_TYPES.contains(&identifier)
}

/// Classify a raw event. Never fails.
pub fn classify(event: &RawEvent) -> Classified {
    match event.kind {
        ElementKind::Record => {
            let record_type = event.attr("type").unwrap_or_default();

            if is_quantity_type(record_type) {
                Classified::Quantity(QuantitySample {
                    metric: record_type.to_string(),
                    value: parse_number(event.attr("value")),
                    unit: event.owned("unit"),
                    start: event.timestamp("startDate"),
                    end: event.timestamp("endDate"),
                    source: event.owned("sourceName"),
                    device: event.owned("device"),
                })
            } else if record_type == SLEEP_ANALYSIS {
                Classified::Sleep(SleepSample {
                    stage: event.owned("value").unwrap_or_default(),
                    start: event.timestamp("startDate"),
                    end: event.timestamp("endDate"),
                    source: event.owned("sourceName"),
                })
            } else {
                Classified::Ignored
            }
        }
        ElementKind::Workout => Classified::Workout(Workout {
            activity_type: event.owned("workoutActivityType").unwrap_or_default(),
            duration_minutes: parse_number(event.attr("duration")),
            distance: parse_number(event.attr("totalDistance")),
            energy_kcal: parse_number(event.attr("totalEnergyBurned")),
            start: event.timestamp("startDate"),
            end: event.timestamp("endDate"),
            source: event.owned("sourceName"),
        }),
    }
}

/// Parse a numeric attribute; missing or unparseable values yield `None`
pub fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Parse an export timestamp.
///
/// Accepts `2024-01-14 08:00:00 -0500` and `2024-01-14 08:00:00`. Anything
/// else is replaced by the current local time.
pub fn parse_timestamp(raw: &str) -> Timestamp {
    if let Ok(dt) = DateTime::parse_from_str(raw, TIMESTAMP_WITH_OFFSET) {
        return Timestamp::Zoned(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, TIMESTAMP_NAIVE) {
        return Timestamp::Naive(dt);
    }
    warn!(raw, "unparseable timestamp, using current time");
    Timestamp::Naive(Local::now().naive_local())
}

/// Registry name for a raw identifier:
/// `HKQuantityTypeIdentifierStepCount` becomes `step_count`
pub fn canonical_metric_name(identifier: &str) -> String {
    let base = identifier
        .strip_prefix("HKQuantityTypeIdentifier")
        .or_else(|| identifier.strip_prefix("HKCategoryTypeIdentifier"))
        .unwrap_or(identifier);

    let mut name = String::with_capacity(base.len() + 4);
    let mut prev_lower = false;
    for c in base.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                name.push('_');
            }
            name.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            name.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    name
}
