//! Derived insights over daily summaries
//!
//! Everything here reads `daily_summary` only. Each insight takes `today`
//! explicitly so that results do not depend on the wall clock.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::error::Result;
use crate::model::{DailySummary, MetricKey};
use crate::store::HealthStore;

const TREND_THRESHOLD_PERCENT: f64 = 5.0;
const MIN_CORRELATION_ROWS: usize = 7;
const MIN_CORRELATION_PAIRS: usize = 7;
const MIN_CORRELATION: f64 = 0.2;
const WEEK_DAYS: i64 = 7;

pub const DEFAULT_TREND_DAYS: u32 = 30;
pub const DEFAULT_CORRELATION_DAYS: u32 = 90;

const TREND_METRICS: [MetricKey; 5] = [
    MetricKey::Steps,
    MetricKey::Calories,
    MetricKey::Sleep,
    MetricKey::HeartRate,
    MetricKey::Workouts,
];

const CORRELATION_PAIRS: [(MetricKey, MetricKey, &str); 6] = [
    (
        MetricKey::Steps,
        MetricKey::Sleep,
        "More steps may improve sleep quality",
    ),
    (
        MetricKey::Steps,
        MetricKey::Calories,
        "Steps and calorie burn are related",
    ),
    (
        MetricKey::Sleep,
        MetricKey::HeartRate,
        "Better sleep may lower resting heart rate",
    ),
    (MetricKey::Workouts, MetricKey::Sleep, "Exercise may improve sleep"),
    (
        MetricKey::Workouts,
        MetricKey::Calories,
        "Workouts burn more calories",
    ),
    (
        MetricKey::Steps,
        MetricKey::Weight,
        "Activity level and weight correlation",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

impl TrendDirection {
    fn from_change(change_percent: f64) -> Self {
        if change_percent > TREND_THRESHOLD_PERCENT {
            TrendDirection::Up
        } else if change_percent < -TREND_THRESHOLD_PERCENT {
            TrendDirection::Down
        } else {
            TrendDirection::Stable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub metric: MetricKey,
    pub current_avg: f64,
    pub previous_avg: f64,
    pub change_percent: f64,
    pub trend: TrendDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub trends: Vec<Trend>,
    pub period_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Strong,
    Moderate,
    Weak,
}

impl Strength {
    fn from_coefficient(r: f64) -> Self {
        let r = r.abs();
        if r > 0.6 {
            Strength::Strong
        } else if r > 0.4 {
            Strength::Moderate
        } else {
            Strength::Weak
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlation {
    pub metric1: MetricKey,
    pub metric2: MetricKey,
    pub correlation: f64,
    pub description: String,
    pub strength: Strength,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationReport {
    pub correlations: Vec<Correlation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalRecord {
    pub metric: String,
    pub value: f64,
    pub date: NaiveDate,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyAverages {
    pub steps: Option<f64>,
    pub active_calories: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub resting_heart_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyTotals {
    pub steps: Option<f64>,
    pub active_calories: Option<f64>,
    pub workout_minutes: Option<f64>,
    pub flights_climbed: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub averages: WeeklyAverages,
    pub totals: WeeklyTotals,
    pub days_with_data: usize,
}

pub struct Insights<'a> {
    store: &'a HealthStore,
}

impl<'a> Insights<'a> {
    pub fn new(store: &'a HealthStore) -> Self {
        Self { store }
    }

    /// Compare the mean of the last `days` against the `days` before that
    pub fn trends(&self, days: u32, today: NaiveDate) -> Result<TrendReport> {
        let mid = today - Duration::days(i64::from(days));
        let start = mid - Duration::days(i64::from(days));

        let mut trends = Vec::new();
        for metric in TREND_METRICS {
            let current = self.store.metric_history(metric, mid, today)?;
            let previous = self.store.metric_history(metric, start, mid)?;

            let (Some(current_avg), Some(previous_avg)) = (
                mean(current.iter().map(|p| p.value)),
                mean(previous.iter().map(|p| p.value)),
            ) else {
                continue;
            };

            let change_percent = if previous_avg > 0.0 {
                (current_avg - previous_avg) / previous_avg * 100.0
            } else {
                0.0
            };

            trends.push(Trend {
                metric,
                current_avg: round_to(current_avg, 2),
                previous_avg: round_to(previous_avg, 2),
                change_percent: round_to(change_percent, 1),
                trend: TrendDirection::from_change(change_percent),
            });
        }

        Ok(TrendReport {
            trends,
            period_days: days,
        })
    }

    /// Pearson correlations between fixed metric pairs over the last `days`
    pub fn correlations(&self, days: u32, today: NaiveDate) -> Result<CorrelationReport> {
        let start = today - Duration::days(i64::from(days));
        let summaries = self.store.get_summaries_in_range(start, today)?;

        if summaries.len() < MIN_CORRELATION_ROWS {
            return Ok(CorrelationReport {
                correlations: Vec::new(),
                message: Some("Not enough data for correlation analysis".to_string()),
            });
        }

        let mut correlations = Vec::new();
        for (first, second, description) in CORRELATION_PAIRS {
            let (x, y): (Vec<f64>, Vec<f64>) = summaries
                .iter()
                .filter_map(|s| Some((s.metric(first)?, s.metric(second)?)))
                .unzip();
            if x.len() < MIN_CORRELATION_PAIRS {
                continue;
            }

            let r = pearson(&x, &y);
            if r.abs() > MIN_CORRELATION {
                correlations.push(Correlation {
                    metric1: first,
                    metric2: second,
                    correlation: round_to(r, 3),
                    description: description.to_string(),
                    strength: Strength::from_coefficient(r),
                });
            }
        }

        correlations.sort_by(|a, b| b.correlation.abs().total_cmp(&a.correlation.abs()));

        Ok(CorrelationReport {
            correlations,
            message: None,
        })
    }

    /// Best day ever for each headline metric
    pub fn personal_records(&self) -> Result<Vec<PersonalRecord>> {
        let (Some(first), Some(last)) = self.store.get_date_range()? else {
            return Ok(Vec::new());
        };
        let summaries = self.store.get_summaries_in_range(first, last)?;

        let candidates: [(&str, MetricKey, &str, Option<i32>); 6] = [
            ("steps", MetricKey::Steps, "steps", None),
            ("active_calories", MetricKey::Calories, "kcal", Some(1)),
            ("sleep", MetricKey::Sleep, "hours", Some(1)),
            ("workout_minutes", MetricKey::Workouts, "minutes", Some(1)),
            ("distance", MetricKey::Distance, "km", Some(2)),
            ("flights_climbed", MetricKey::Flights, "flights", None),
        ];

        let records = candidates
            .into_iter()
            .filter_map(|(name, metric, unit, decimals)| {
                best_day(&summaries, metric).map(|(date, value)| PersonalRecord {
                    metric: name.to_string(),
                    value: decimals.map_or(value, |dp| round_to(value, dp)),
                    date,
                    unit: unit.to_string(),
                })
            })
            .collect();
        Ok(records)
    }

    /// Averages and totals over the past week. `None` when no day has data.
    pub fn weekly_summary(&self, today: NaiveDate) -> Result<Option<WeeklySummary>> {
        let start = today - Duration::days(WEEK_DAYS);
        let summaries = self.store.get_summaries_in_range(start, today)?;
        if summaries.is_empty() {
            return Ok(None);
        }

        let values = |metric: MetricKey| summaries.iter().filter_map(move |s| s.metric(metric));
        let average = |metric: MetricKey| mean(values(metric)).map(|v| round_to(v, 1));
        let total = |metric: MetricKey| sum(values(metric)).map(|v| round_to(v, 1));

        Ok(Some(WeeklySummary {
            start,
            end: today,
            averages: WeeklyAverages {
                steps: average(MetricKey::Steps),
                active_calories: average(MetricKey::Calories),
                sleep_hours: average(MetricKey::Sleep),
                resting_heart_rate: average(MetricKey::HeartRate),
            },
            totals: WeeklyTotals {
                steps: total(MetricKey::Steps),
                active_calories: total(MetricKey::Calories),
                workout_minutes: total(MetricKey::Workouts),
                flights_climbed: total(MetricKey::Flights),
            },
            days_with_data: summaries.len(),
        }))
    }
}

/// Pearson correlation coefficient. 0 for fewer than three pairs,
/// mismatched lengths, or a series with no variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 3 {
        return 0.0;
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }
    covariance / (var_x.sqrt() * var_y.sqrt())
}

/// First day holding the largest non-zero value
fn best_day(summaries: &[DailySummary], metric: MetricKey) -> Option<(NaiveDate, f64)> {
    let mut best: Option<(NaiveDate, f64)> = None;
    for summary in summaries {
        let Some(value) = summary.metric(metric) else {
            continue;
        };
        if value == 0.0 || (metric == MetricKey::Sleep && value < 0.0) {
            continue;
        }
        if best.map_or(true, |(_, current)| value > current) {
            best = Some((summary.date, value));
        }
    }
    best
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (total, count) = values.fold((0.0, 0usize), |(t, c), v| (t + v, c + 1));
    (count > 0).then(|| total / count as f64)
}

fn sum(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn store_with(summaries: &[DailySummary]) -> HealthStore {
        let store = HealthStore::open_in_memory().unwrap();
        for summary in summaries {
            store.insert_summary(summary).unwrap();
        }
        store
    }

    #[test]
    fn test_pearson() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((pearson(&x, &[2.0, 4.0, 6.0, 8.0, 10.0]) - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &[5.0, 4.0, 3.0, 2.0, 1.0]) + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
        assert_eq!(pearson(&x, &[3.0; 5]), 0.0);
        assert_eq!(pearson(&x, &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_trends() {
        let today = day("2024-03-31");
        let mut rows = Vec::new();

        let mut current = DailySummary::empty(day("2024-03-10"));
        current.steps = Some(10_000);
        current.sleep_hours = Some(7.0);
        current.resting_heart_rate = Some(54.0);
        current.active_calories = Some(500.0);
        rows.push(current);

        let mut current = DailySummary::empty(day("2024-03-20"));
        current.steps = Some(10_000);
        current.sleep_hours = Some(7.2);
        rows.push(current);

        let mut previous = DailySummary::empty(day("2024-02-10"));
        previous.steps = Some(8_000);
        previous.sleep_hours = Some(7.0);
        previous.resting_heart_rate = Some(60.0);
        rows.push(previous);

        // Outside both windows
        let mut old = DailySummary::empty(day("2024-01-01"));
        old.active_calories = Some(100.0);
        rows.push(old);

        let store = store_with(&rows);
        let report = Insights::new(&store).trends(30, today).unwrap();
        assert_eq!(report.period_days, 30);

        let metrics: Vec<MetricKey> = report.trends.iter().map(|t| t.metric).collect();
        assert_eq!(
            metrics,
            vec![MetricKey::Steps, MetricKey::Sleep, MetricKey::HeartRate]
        );

        let steps = &report.trends[0];
        assert_eq!(steps.current_avg, 10_000.0);
        assert_eq!(steps.previous_avg, 8_000.0);
        assert_eq!(steps.change_percent, 25.0);
        assert_eq!(steps.trend, TrendDirection::Up);

        let sleep = &report.trends[1];
        assert_eq!(sleep.current_avg, 7.1);
        assert_eq!(sleep.change_percent, 1.4);
        assert_eq!(sleep.trend, TrendDirection::Stable);

        assert_eq!(report.trends[2].change_percent, -10.0);
        assert_eq!(report.trends[2].trend, TrendDirection::Down);
    }

    #[test]
    fn test_trend_with_zero_previous_is_flat() {
        let mut previous = DailySummary::empty(day("2024-02-10"));
        previous.workout_minutes = Some(0.0);
        let mut current = DailySummary::empty(day("2024-03-10"));
        current.workout_minutes = Some(45.0);

        let store = store_with(&[previous, current]);
        let report = Insights::new(&store).trends(30, day("2024-03-31")).unwrap();
        assert_eq!(report.trends.len(), 1);
        assert_eq!(report.trends[0].change_percent, 0.0);
        assert_eq!(report.trends[0].trend, TrendDirection::Stable);
    }

    #[test]
    fn test_correlations() {
        let today = day("2024-03-31");
        let rows: Vec<DailySummary> = (0..10)
            .map(|i| {
                let mut s = DailySummary::empty(today - Duration::days(i));
                s.steps = Some(1000 * (i + 1));
                s.active_calories = Some(100.0 * (i + 1) as f64);
                s.resting_heart_rate = Some(60.0);
                s.sleep_hours = Some(if i % 2 == 0 { 7.0 } else { 8.0 });
                s
            })
            .collect();

        let store = store_with(&rows);
        let report = Insights::new(&store).correlations(90, today).unwrap();
        assert!(report.message.is_none());

        let top = &report.correlations[0];
        assert_eq!((top.metric1, top.metric2), (MetricKey::Steps, MetricKey::Calories));
        assert_eq!(top.correlation, 1.0);
        assert_eq!(top.strength, Strength::Strong);

        // Constant heart rate has no variance, so sleep/heart_rate drops out
        assert!(report
            .correlations
            .iter()
            .all(|c| c.metric2 != MetricKey::HeartRate));
        assert!(report
            .correlations
            .windows(2)
            .all(|w| w[0].correlation.abs() >= w[1].correlation.abs()));
    }

    #[test]
    fn test_correlations_need_enough_rows() {
        let today = day("2024-03-31");
        let rows: Vec<DailySummary> = (0..6)
            .map(|i| DailySummary::empty(today - Duration::days(i)))
            .collect();
        let store = store_with(&rows);
        let report = Insights::new(&store).correlations(90, today).unwrap();
        assert!(report.correlations.is_empty());
        assert!(report.message.is_some());
    }

    #[test]
    fn test_strength_labels() {
        assert_eq!(Strength::from_coefficient(-0.7), Strength::Strong);
        assert_eq!(Strength::from_coefficient(0.5), Strength::Moderate);
        assert_eq!(Strength::from_coefficient(0.3), Strength::Weak);
    }

    #[test]
    fn test_personal_records() {
        let mut a = DailySummary::empty(day("2024-01-01"));
        a.steps = Some(12_000);
        a.distance_km = Some(8.456);
        a.sleep_hours = Some(0.0);
        let mut b = DailySummary::empty(day("2024-01-02"));
        b.steps = Some(12_000);
        b.sleep_hours = Some(8.25);
        b.active_calories = Some(640.04);
        let mut c = DailySummary::empty(day("2024-01-03"));
        c.steps = Some(9_000);
        c.flights_climbed = Some(0);

        let store = store_with(&[a, b, c]);
        let records = Insights::new(&store).personal_records().unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.metric.as_str()).collect();
        assert_eq!(names, vec!["steps", "active_calories", "sleep", "distance"]);

        assert_eq!(records[0].date, day("2024-01-01"));
        assert_eq!(records[0].value, 12_000.0);
        assert_eq!(records[1].value, 640.0);
        assert_eq!(records[2].date, day("2024-01-02"));
        assert_eq!(records[3].value, 8.46);
        assert_eq!(records[3].unit, "km");
    }

    #[test]
    fn test_personal_records_empty_store() {
        let store = HealthStore::open_in_memory().unwrap();
        assert!(Insights::new(&store).personal_records().unwrap().is_empty());
    }

    #[test]
    fn test_weekly_summary() {
        let today = day("2024-03-31");
        let mut a = DailySummary::empty(day("2024-03-30"));
        a.steps = Some(8_000);
        a.sleep_hours = Some(7.25);
        a.workout_minutes = Some(30.0);
        let mut b = DailySummary::empty(day("2024-03-24"));
        b.steps = Some(5_001);
        let outside = DailySummary::empty(day("2024-03-23"));

        let store = store_with(&[a, b, outside]);
        let summary = Insights::new(&store)
            .weekly_summary(today)
            .unwrap()
            .unwrap();

        assert_eq!(summary.start, day("2024-03-24"));
        assert_eq!(summary.days_with_data, 2);
        assert_eq!(summary.averages.steps, Some(6500.5));
        assert_eq!(summary.averages.sleep_hours, Some(7.3));
        assert_eq!(summary.averages.active_calories, None);
        assert_eq!(summary.totals.steps, Some(13_001.0));
        assert_eq!(summary.totals.workout_minutes, Some(30.0));
        assert_eq!(summary.totals.flights_climbed, None);
    }

    #[test]
    fn test_weekly_summary_without_data() {
        let store = HealthStore::open_in_memory().unwrap();
        assert!(Insights::new(&store)
            .weekly_summary(day("2024-03-31"))
            .unwrap()
            .is_none());
    }
}
