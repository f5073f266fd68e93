//! Daily summary, range, metric history and workout queries

use anyhow::Result;
use chrono::NaiveDate;
use serde_json::json;

use super::{fmt_opt, print_json};
use crate::api::HealthApi;
use crate::model::DailySummary;

pub fn summary(api: &HealthApi, date: Option<NaiveDate>, today: NaiveDate, json: bool) -> Result<()> {
    let summary = api.daily_summary(date, today)?;
    if json {
        return print_json(&summary);
    }

    println!("Summary for {}", summary.date);
    println!("{}", "-".repeat(32));
    println!("Steps:              {}", fmt_opt(summary.steps.map(|v| v as f64), 0));
    println!("Active calories:    {}", fmt_opt(summary.active_calories, 1));
    println!("Resting heart rate: {}", fmt_opt(summary.resting_heart_rate, 1));
    println!("Weight:             {}", fmt_opt(summary.weight, 1));
    println!("Sleep hours:        {}", fmt_opt(summary.sleep_hours, 2));
    println!("Workout minutes:    {}", fmt_opt(summary.workout_minutes, 1));
    println!("Distance (km):      {}", fmt_opt(summary.distance_km, 2));
    println!(
        "Flights climbed:    {}",
        fmt_opt(summary.flights_climbed.map(|v| v as f64), 0)
    );
    Ok(())
}

pub fn range(api: &HealthApi, start: NaiveDate, end: NaiveDate, json: bool) -> Result<()> {
    let summaries = api.range(start, end)?;
    if json {
        return print_json(&json!({ "summaries": summaries, "count": summaries.len() }));
    }

    if summaries.is_empty() {
        println!("No summaries between {} and {}.", start, end);
        return Ok(());
    }

    println!(
        "{:<12} {:>8} {:>8} {:>6} {:>7} {:>6} {:>7} {:>7} {:>7}",
        "Date", "Steps", "kcal", "RHR", "Weight", "Sleep", "Workout", "km", "Flights"
    );
    println!("{}", "-".repeat(82));
    for summary in &summaries {
        print_row(summary);
    }
    println!("\n{} days", summaries.len());
    Ok(())
}

fn print_row(s: &DailySummary) {
    println!(
        "{:<12} {:>8} {:>8} {:>6} {:>7} {:>6} {:>7} {:>7} {:>7}",
        s.date.to_string(),
        fmt_opt(s.steps.map(|v| v as f64), 0),
        fmt_opt(s.active_calories, 0),
        fmt_opt(s.resting_heart_rate, 0),
        fmt_opt(s.weight, 1),
        fmt_opt(s.sleep_hours, 1),
        fmt_opt(s.workout_minutes, 0),
        fmt_opt(s.distance_km, 2),
        fmt_opt(s.flights_climbed.map(|v| v as f64), 0),
    );
}

pub fn metric(
    api: &HealthApi,
    key: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    days: u32,
    today: NaiveDate,
    json: bool,
) -> Result<()> {
    let history = api.metric_history(key, start, end, days, today)?;
    if json {
        return print_json(&history);
    }

    println!(
        "{} from {} to {} ({} points)",
        history.metric.as_str(),
        history.start,
        history.end,
        history.data.len()
    );
    for point in &history.data {
        println!("{:<12} {:>10.2}", point.date.to_string(), point.value);
    }
    Ok(())
}

pub fn workouts(
    api: &HealthApi,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    days: u32,
    today: NaiveDate,
    json: bool,
) -> Result<()> {
    let workouts = api.workouts(start, end, days, today)?;
    if json {
        return print_json(&json!({ "workouts": workouts, "count": workouts.len() }));
    }

    if workouts.is_empty() {
        println!("No workouts found.");
        return Ok(());
    }

    println!(
        "{:<20} {:<24} {:>8} {:>9} {:>8}",
        "Start", "Type", "Minutes", "Distance", "kcal"
    );
    println!("{}", "-".repeat(73));
    for workout in &workouts {
        // Drop the offset and the "HKWorkoutActivityType" prefix for display
        let start = workout
            .start_date
            .get(..19)
            .unwrap_or(workout.start_date.as_str());
        let kind = workout
            .workout_type
            .trim_start_matches("HKWorkoutActivityType");
        println!(
            "{:<20} {:<24} {:>8} {:>9} {:>8}",
            start.replace('T', " "),
            kind,
            fmt_opt(workout.duration_minutes, 0),
            fmt_opt(workout.total_distance, 2),
            fmt_opt(workout.total_energy_burned, 0),
        );
    }
    Ok(())
}
