pub mod aggregate;
pub mod api;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod import;
pub mod insights;
pub mod model;
pub mod store;

pub use api::HealthApi;
pub use config::Config;
pub use error::{HealthError, Result};
pub use import::{ImportOptions, ImportResult, Importer};
pub use store::HealthStore;
