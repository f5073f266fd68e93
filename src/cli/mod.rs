//! Command implementations. Presentation only: every command calls
//! `HealthApi` and prints the result as a table or as JSON.

pub mod clear;
pub mod import;
pub mod insights;
pub mod query;
pub mod status;
pub mod units;

use anyhow::Result;
use serde::Serialize;

/// Pretty-print any serializable value as JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render an optional number, `-` for missing values
pub(crate) fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format!("{:.*}", decimals, v))
        .unwrap_or_else(|| "-".to_string())
}
