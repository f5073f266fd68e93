//! Status and overview commands

use anyhow::Result;

use super::print_json;
use crate::api::{DateRange, HealthApi};

pub fn status(api: &HealthApi, json: bool) -> Result<()> {
    let report = api.status()?;
    if json {
        return print_json(&report);
    }

    let status = &report.status;
    println!("Status:    {}", status.status.as_str());
    println!("Progress:  {:.1}%", status.progress);
    println!("Records:   {}", status.records_imported);
    if let Some(message) = &status.error_message {
        println!("Error:     {}", message);
    }
    print_range(&report.date_range);
    Ok(())
}

pub fn overview(api: &HealthApi, json: bool) -> Result<()> {
    let overview = api.overview()?;
    if json {
        return print_json(&overview);
    }

    println!("Status:       {}", overview.status.status.as_str());
    match overview.status.last_import {
        Some(at) => println!("Last import:  {}", at.format("%Y-%m-%d %H:%M:%S")),
        None => println!("Last import:  never"),
    }
    println!("Samples:      {}", overview.records_count);
    print_range(&overview.date_range);
    Ok(())
}

fn print_range(range: &DateRange) {
    match (range.min_date, range.max_date) {
        (Some(min), Some(max)) => println!("Data range:   {} to {}", min, max),
        _ => println!("No data imported yet. Run 'healthdash import' first."),
    }
}
