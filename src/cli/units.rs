//! Unit registry commands

use anyhow::Result;
use serde_json::json;

use super::print_json;
use crate::api::HealthApi;

pub fn list(api: &HealthApi, json: bool) -> Result<()> {
    let units = api.units()?;
    if json {
        return print_json(&units);
    }

    if units.is_empty() {
        println!("No units recorded. Run 'healthdash units detect' after an import.");
        return Ok(());
    }
    for (metric, unit) in &units {
        println!("{:<40} {}", metric, unit);
    }
    Ok(())
}

pub fn get(api: &HealthApi, metric: &str, json: bool) -> Result<()> {
    let unit = api.unit(metric)?;
    if json {
        return print_json(&json!({ "metric": metric, "unit": unit }));
    }
    println!("{}: {}", metric, unit.as_deref().unwrap_or("-"));
    Ok(())
}

pub fn set(api: &HealthApi, metric: &str, unit: &str) -> Result<()> {
    api.set_unit(metric, unit)?;
    println!("✓ {} set to {}", metric, unit);
    Ok(())
}

pub fn detect(api: &HealthApi, json: bool) -> Result<()> {
    let units = api.detect_units()?;
    if json {
        return print_json(&json!({ "message": "Units detected", "units": units }));
    }
    println!("✓ Detected {} units", units.len());
    for (metric, unit) in &units {
        println!("   {:<40} {}", metric, unit);
    }
    Ok(())
}
