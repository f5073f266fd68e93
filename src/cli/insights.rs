//! Insight commands

use anyhow::Result;
use chrono::NaiveDate;
use serde_json::json;

use super::{fmt_opt, print_json};
use crate::api::HealthApi;
use crate::insights::TrendDirection;

pub fn trends(api: &HealthApi, days: u32, today: NaiveDate, json: bool) -> Result<()> {
    let report = api.trends(days, today)?;
    if json {
        return print_json(&report);
    }

    if report.trends.is_empty() {
        println!("Not enough data for the last {} days.", days);
        return Ok(());
    }

    println!(
        "{:<12} {:>12} {:>12} {:>8}  Trend",
        "Metric", "Current", "Previous", "Change"
    );
    println!("{}", "-".repeat(56));
    for trend in &report.trends {
        let arrow = match trend.trend {
            TrendDirection::Up => "↑ up",
            TrendDirection::Down => "↓ down",
            TrendDirection::Stable => "→ stable",
        };
        println!(
            "{:<12} {:>12.2} {:>12.2} {:>7.1}%  {}",
            trend.metric.as_str(),
            trend.current_avg,
            trend.previous_avg,
            trend.change_percent,
            arrow
        );
    }
    Ok(())
}

pub fn correlations(api: &HealthApi, days: u32, today: NaiveDate, json: bool) -> Result<()> {
    let report = api.correlations(days, today)?;
    if json {
        return print_json(&report);
    }

    if let Some(message) = &report.message {
        println!("{}", message);
        return Ok(());
    }
    if report.correlations.is_empty() {
        println!("No meaningful correlations in the last {} days.", days);
        return Ok(());
    }

    for c in &report.correlations {
        println!(
            "{:>7.3}  {:<9} {} / {}: {}",
            c.correlation,
            format!("{:?}", c.strength).to_lowercase(),
            c.metric1.as_str(),
            c.metric2.as_str(),
            c.description
        );
    }
    Ok(())
}

pub fn records(api: &HealthApi, json: bool) -> Result<()> {
    let records = api.personal_records()?;
    if json {
        return print_json(&json!({ "records": records }));
    }

    if records.is_empty() {
        println!("No records yet.");
        return Ok(());
    }
    for record in &records {
        println!(
            "{:<16} {:>10} {:<8} on {}",
            record.metric, record.value, record.unit, record.date
        );
    }
    Ok(())
}

pub fn weekly(api: &HealthApi, today: NaiveDate, json: bool) -> Result<()> {
    let Some(summary) = api.weekly_summary(today)? else {
        if json {
            return print_json(&json!({ "message": "No data available" }));
        }
        println!("No data available for the past week.");
        return Ok(());
    };
    if json {
        return print_json(&summary);
    }

    println!(
        "Week {} to {} ({} days with data)",
        summary.start, summary.end, summary.days_with_data
    );
    println!("\nAverages");
    println!("   Steps:              {}", fmt_opt(summary.averages.steps, 1));
    println!("   Active calories:    {}", fmt_opt(summary.averages.active_calories, 1));
    println!("   Sleep hours:        {}", fmt_opt(summary.averages.sleep_hours, 1));
    println!(
        "   Resting heart rate: {}",
        fmt_opt(summary.averages.resting_heart_rate, 1)
    );
    println!("\nTotals");
    println!("   Steps:              {}", fmt_opt(summary.totals.steps, 0));
    println!("   Active calories:    {}", fmt_opt(summary.totals.active_calories, 1));
    println!("   Workout minutes:    {}", fmt_opt(summary.totals.workout_minutes, 1));
    println!("   Flights climbed:    {}", fmt_opt(summary.totals.flights_climbed, 0));
    Ok(())
}
