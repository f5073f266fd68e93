use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use healthdash::api::DEFAULT_HISTORY_DAYS;
use healthdash::cli::{clear, import, insights, query, status, units};
use healthdash::config::Config;
use healthdash::insights::{DEFAULT_CORRELATION_DAYS, DEFAULT_TREND_DAYS};
use healthdash::{HealthApi, HealthError};

#[derive(Parser)]
#[command(name = "healthdash")]
#[command(about = "Import an Apple Health export and explore daily metrics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = "healthdash.yaml")]
    config: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an export.xml (defaults to the one under the data directory)
    Import {
        /// Path to export.xml
        path: Option<PathBuf>,
    },

    /// Show import status
    Status,

    /// Show status, record count and data range
    Overview,

    /// Show the summary for one day
    Summary {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// List daily summaries in a date range
    Range {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },

    /// Show the history of one metric
    Metric {
        /// steps, calories, heart_rate, weight, sleep, workouts, distance or flights
        key: String,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Days back from the end date when no start is given
        #[arg(long, default_value_t = DEFAULT_HISTORY_DAYS)]
        days: u32,
    },

    /// List workouts, newest first
    Workouts {
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long, default_value_t = DEFAULT_HISTORY_DAYS)]
        days: u32,
    },

    /// Unit registry
    Units {
        #[command(subcommand)]
        command: UnitCommands,
    },

    /// Trends, correlations and records
    Insights {
        #[command(subcommand)]
        command: InsightCommands,
    },

    /// Delete all imported data
    Clear,
}

#[derive(Subcommand)]
enum UnitCommands {
    /// List all recorded units
    List,
    /// Show the unit of one metric
    Get {
        /// Canonical metric name, e.g. body_mass
        metric: String,
    },
    /// Override the unit of one metric
    Set { metric: String, unit: String },
    /// Detect units from imported samples
    Detect,
}

#[derive(Subcommand)]
enum InsightCommands {
    /// Compare recent averages against the previous period
    Trends {
        #[arg(long, default_value_t = DEFAULT_TREND_DAYS)]
        days: u32,
    },
    /// Correlations between metric pairs
    Correlations {
        #[arg(long, default_value_t = DEFAULT_CORRELATION_DAYS)]
        days: u32,
    },
    /// Personal best days
    Records,
    /// Averages and totals for the past week
    Weekly,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            // Bad arguments and conflicts are the caller's to fix
            let client_error = e
                .downcast_ref::<HealthError>()
                .map_or(false, HealthError::is_client_error);
            if client_error {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load config
    let config = Config::load(&cli.config)?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let api = HealthApi::open(&config)?;
    let today = Local::now().date_naive();
    let json = cli.json;

    match cli.command {
        Commands::Import { path } => {
            import::run(&api, &config.upload, path, json).await?;
        }
        Commands::Status => {
            status::status(&api, json)?;
        }
        Commands::Overview => {
            status::overview(&api, json)?;
        }
        Commands::Summary { date } => {
            query::summary(&api, date, today, json)?;
        }
        Commands::Range { start, end } => {
            query::range(&api, start, end, json)?;
        }
        Commands::Metric {
            key,
            start,
            end,
            days,
        } => {
            query::metric(&api, &key, start, end, days, today, json)?;
        }
        Commands::Workouts { start, end, days } => {
            query::workouts(&api, start, end, days, today, json)?;
        }
        Commands::Units { command } => match command {
            UnitCommands::List => units::list(&api, json)?,
            UnitCommands::Get { metric } => units::get(&api, &metric, json)?,
            UnitCommands::Set { metric, unit } => units::set(&api, &metric, &unit)?,
            UnitCommands::Detect => units::detect(&api, json)?,
        },
        Commands::Insights { command } => match command {
            InsightCommands::Trends { days } => insights::trends(&api, days, today, json)?,
            InsightCommands::Correlations { days } => {
                insights::correlations(&api, days, today, json)?
            }
            InsightCommands::Records => insights::records(&api, json)?,
            InsightCommands::Weekly => insights::weekly(&api, today, json)?,
        },
        Commands::Clear => {
            clear::run(&api)?;
        }
    }

    Ok(())
}
