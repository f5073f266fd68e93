//! Configuration management with YAML support

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::HealthError;
use crate::import::ImportOptions;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub upload: UploadPolicy,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Import pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Directory searched for `export.xml` by a local import
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    #[serde(default = "default_estimated_total_events")]
    pub estimated_total_events: u64,
}

/// Acceptance rules for an uploaded export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPolicy {
    #[serde(default = "default_max_upload_bytes")]
    pub max_bytes: u64,

    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    #[serde(default = "default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_database_path() -> String {
    "~/.local/share/healthdash/health.db".to_string()
}

fn default_data_dir() -> String {
    "~/.local/share/healthdash".to_string()
}

fn default_batch_size() -> usize {
    5000
}

fn default_progress_interval() -> u64 {
    10_000
}

fn default_estimated_total_events() -> u64 {
    2_000_000
}

fn default_max_upload_bytes() -> u64 {
    3 * 1024 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["xml".to_string()]
}

fn default_allowed_content_types() -> Vec<String> {
    vec![
        "text/xml".to_string(),
        "application/xml".to_string(),
        "application/octet-stream".to_string(),
    ]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            batch_size: default_batch_size(),
            progress_interval: default_progress_interval(),
            estimated_total_events: default_estimated_total_events(),
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: default_max_upload_bytes(),
            allowed_extensions: default_allowed_extensions(),
            allowed_content_types: default_allowed_content_types(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./healthdash.yaml (current directory)
    /// 3. ~/.config/healthdash/healthdash.yaml
    pub fn load(path: &str) -> Result<Self> {
        let search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "healthdash.yaml".to_string(),
            shellexpand::tilde("~/.config/healthdash/healthdash.yaml").to_string(),
        ];

        for search_path in &search_paths {
            if Path::new(search_path).exists() {
                let content = std::fs::read_to_string(search_path)?;
                let config: Config = serde_yaml::from_str(&content)
                    .map_err(|e| HealthError::Config(format!("{}: {}", search_path, e)))?;
                return Ok(config);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database.path).to_string())
    }

    /// Directory searched by a local import
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.import.data_dir).to_string())
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions::from(&self.import)
    }
}

impl UploadPolicy {
    /// Reject an upload by name, declared content type and size.
    /// Checks run in that order and the first failure wins.
    pub fn check(
        &self,
        file_name: &str,
        content_type: Option<&str>,
        size: u64,
    ) -> crate::error::Result<()> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let extension_ok = extension
            .as_deref()
            .map_or(false, |ext| self.allowed_extensions.iter().any(|a| a == ext));
        if !extension_ok {
            return Err(HealthError::invalid(format!(
                "{} is not an XML file",
                file_name
            )));
        }

        if let Some(content_type) = content_type {
            // Ignore parameters such as "; charset=utf-8"
            let essence = content_type
                .split(';')
                .next()
                .unwrap_or(content_type)
                .trim()
                .to_ascii_lowercase();
            if !self.allowed_content_types.iter().any(|a| *a == essence) {
                return Err(HealthError::invalid(format!(
                    "unsupported content type {}",
                    content_type
                )));
            }
        }

        if size > self.max_bytes {
            return Err(HealthError::invalid(format!(
                "file is {} bytes, limit is {} bytes",
                size, self.max_bytes
            )));
        }

        Ok(())
    }
}
