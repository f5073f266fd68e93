//! Import command implementation

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use super::print_json;
use crate::api::HealthApi;
use crate::config::UploadPolicy;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub async fn run(
    api: &HealthApi,
    policy: &UploadPolicy,
    path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let job = match path {
        Some(path) => {
            let size = std::fs::metadata(&path)
                .with_context(|| format!("cannot read {}", path.display()))?
                .len();
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            policy.check(file_name, None, size)?;
            api.trigger_import(&path)?
        }
        None => api.import_local()?,
    };

    if !json {
        println!("Importing {}...", job.export().display());
    }

    let mut last_progress = -1.0;
    while !job.is_finished() {
        tokio::time::sleep(POLL_INTERVAL).await;
        if json {
            continue;
        }
        let status = api.status()?.status;
        if status.progress != last_progress {
            println!(
                "   {:<10} {:>5.1}%  {} records",
                status.status.as_str(),
                status.progress,
                status.records_imported
            );
            last_progress = status.progress;
        }
    }

    let result = job.wait().await?;

    if json {
        return print_json(&result);
    }

    println!("\n✓ Import complete");
    println!("   Records:          {}", result.records_imported);
    println!("   Quantity samples: {}", result.quantity_samples);
    println!("   Sleep samples:    {}", result.sleep_samples);
    println!("   Workouts:         {}", result.workouts);
    println!("   Ignored:          {}", result.ignored);
    println!("   Days summarized:  {}", result.summary_days);

    Ok(())
}
