//! Configuration infrastructure
//!
//! Settings are layered with the `config` crate, later sources overriding
//! earlier ones:
//! 1. Built-in defaults (`AppConfig::default()`)
//! 2. `config/default.toml` next to the working directory (optional)
//! 3. The file named by `COVID_CENSUS_CONFIG` (optional)
//! 4. Environment variables, e.g. `COVID_CENSUS_INGEST__BATCH_SIZE=25`

#![allow(clippy::uninlined_format_args)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::{BatchPlanner, Dataset, SubjectCatalog};

pub const ENV_PREFIX: &str = "COVID_CENSUS";
pub const CONFIG_PATH_ENV: &str = "COVID_CENSUS_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "config/default";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
    pub sources: SourceConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `sqlite:` URL; defaults to a file in the user's local data directory
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Raw rows written per invocation
    pub batch_size: usize,
    /// Datasets advanced by one step on every run, in this order
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// COVID Tracking Project v1 API root
    pub covid_api_base: String,
    /// Page holding the state population table
    pub population_url: String,
    pub request_timeout_seconds: u64,
    /// 0 disables rate limiting
    pub max_requests_per_second: u32,
    pub user_agent: String,
    pub follow_redirects: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub directory: PathBuf,
    pub cases_file: String,
    pub population_file: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    pub console_output: bool,

    pub file_output: bool,

    /// Log directory; defaults to `logs/` under the application data directory
    pub directory: Option<PathBuf>,

    pub file_name: String,

    /// Module-specific log level filters (e.g., "sqlx": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: defaults::DB_MAX_CONNECTIONS,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::BATCH_SIZE,
            datasets: Dataset::ALL.to_vec(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            covid_api_base: defaults::COVID_API_BASE.to_string(),
            population_url: defaults::POPULATION_URL.to_string(),
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            user_agent: defaults::USER_AGENT.to_string(),
            follow_redirects: true,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            cases_file: defaults::CASES_EXPORT_FILE.to_string(),
            population_file: defaults::POPULATION_EXPORT_FILE.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            directory: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

impl ExportConfig {
    pub fn path_for(&self, dataset: Dataset) -> PathBuf {
        match dataset {
            Dataset::Cases => self.directory.join(&self.cases_file),
            Dataset::Population => self.directory.join(&self.population_file),
        }
    }
}

impl DatabaseConfig {
    /// Configured URL, or a SQLite file under the local data directory.
    pub fn resolved_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!("sqlite:{}", AppConfig::app_data_dir().join(defaults::DB_FILE).display()),
        }
    }
}

impl AppConfig {
    /// Application data directory (`<data_local_dir>/covid-census`, or `.`).
    pub fn app_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("covid-census"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Loads the full layered configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::load_from(explicit.as_deref(), None)
    }

    /// Layered load with an optional explicit file and an optional
    /// environment map (`None` reads the real process environment).
    pub fn load_from(
        path: Option<&Path>,
        environment: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false));

        if let Some(path) = path {
            info!("Loading configuration from {:?}", path);
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let env = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("ingest.datasets")
            .source(environment);
        let settings = builder.add_source(env).build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for dataset in &self.ingest.datasets {
            BatchPlanner::new(SubjectCatalog::LEN, dataset.periods().len(), self.ingest.batch_size)
                .map_err(|e| ConfigError::Validation {
                    message: format!("ingest.batch_size: {}", e),
                })?;
        }

        if self.ingest.datasets.is_empty() {
            return Err(ConfigError::Validation {
                message: "ingest.datasets must name at least one dataset".to_string(),
            });
        }

        if self.sources.request_timeout_seconds == 0 {
            return Err(ConfigError::Validation {
                message: "sources.request_timeout_seconds must be greater than 0".to_string(),
            });
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation {
                message: "database.max_connections must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Default configuration values
pub mod defaults {
    /// Two batches per period: the subject list is split in halves
    pub const BATCH_SIZE: usize = 25;

    pub const DB_MAX_CONNECTIONS: u32 = 1;

    pub const DB_FILE: &str = "covid_census.db";

    pub const COVID_API_BASE: &str = "https://api.covidtracking.com/v1";

    pub const POPULATION_URL: &str =
        "https://en.wikipedia.org/wiki/List_of_states_and_territories_of_the_United_States_by_population";

    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    pub const MAX_REQUESTS_PER_SECOND: u32 = 5;

    pub const USER_AGENT: &str = "covid-census/0.1 (batch ingestion tool)";

    pub const CASES_EXPORT_FILE: &str = "covid_calculations.csv";

    pub const POPULATION_EXPORT_FILE: &str = "population_calculations.csv";

    pub const LOG_LEVEL: &str = "info";

    pub const LOG_FILE_NAME: &str = "covid-census.log";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::load_from(None, env(&[])).unwrap();
        assert_eq!(config.ingest.batch_size, 25);
        assert_eq!(config.ingest.datasets, Dataset::ALL.to_vec());
        assert_eq!(config.export.path_for(Dataset::Cases), PathBuf::from("./covid_calculations.csv"));
    }

    #[test]
    fn file_then_environment_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[ingest]\nbatch_size = 10\ndatasets = [\"population\"]\n\n[database]\nurl = \"sqlite:/tmp/x.db\""
        )
        .unwrap();

        let config = AppConfig::load_from(
            Some(file.path()),
            env(&[("COVID_CENSUS_INGEST__BATCH_SIZE", "50")]),
        )
        .unwrap();
        assert_eq!(config.ingest.batch_size, 50);
        assert_eq!(config.ingest.datasets, vec![Dataset::Population]);
        assert_eq!(config.database.resolved_url(), "sqlite:/tmp/x.db");
    }

    #[test]
    fn datasets_from_comma_separated_environment() {
        let config = AppConfig::load_from(None, env(&[("COVID_CENSUS_INGEST__DATASETS", "population,cases")])).unwrap();
        assert_eq!(config.ingest.datasets, vec![Dataset::Population, Dataset::Cases]);
    }

    #[test]
    fn rejects_batch_size_that_does_not_split_subjects() {
        for size in ["0", "20"] {
            let err = AppConfig::load_from(None, env(&[("COVID_CENSUS_INGEST__BATCH_SIZE", size)])).unwrap_err();
            assert!(matches!(err, ConfigError::Validation { .. }), "size {size}: {err}");
        }
    }
}
