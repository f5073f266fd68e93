//! Clear command implementation

use anyhow::Result;

use crate::api::HealthApi;

pub fn run(api: &HealthApi) -> Result<()> {
    api.clear_all()?;
    println!("✓ All health data cleared");
    Ok(())
}
