use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// Looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "churn_elt.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub database: DatabaseConfig,
    pub transform: TransformConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where the hourly drop of the customer file lands
    pub input_file: PathBuf,
    /// Successfully loaded files are renamed into this directory
    pub archive_dir: PathBuf,
    pub log_dir: PathBuf,
    pub delimiter: char,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_file: PathBuf::from("data/ToProcess/telecom_custom_data.csv"),
            archive_dir: PathBuf::from("data/Processed"),
            log_dir: PathBuf::from("logs"),
            delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Main warehouse file; schema databases are attached next to it
    pub path: PathBuf,
    pub staging_schema: String,
    pub reporting_schema: String,
    pub staging_table: String,
    pub audit_table: String,
    pub mart_table: String,
    pub churn_flag_column: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/warehouse.db"),
            staging_schema: "staging_schema".to_string(),
            reporting_schema: "reporting_schema".to_string(),
            staging_table: "raw_telecom_data".to_string(),
            audit_table: "load_batches".to_string(),
            mart_table: "fact_customer_telcome".to_string(),
            churn_flag_column: "churned_flag".to_string(),
        }
    }
}

impl DatabaseConfig {
    /// File backing an attached schema, e.g. `data/staging_schema.db`.
    pub fn schema_file(&self, schema: &str) -> PathBuf {
        let dir = self.path.parent().unwrap_or_else(|| Path::new(""));
        dir.join(format!("{schema}.db"))
    }

    pub fn staging_relation(&self) -> String {
        format!("{}.{}", self.staging_schema, self.staging_table)
    }

    pub fn audit_relation(&self) -> String {
        format!("{}.{}", self.staging_schema, self.audit_table)
    }

    pub fn mart_relation(&self) -> String {
        format!("{}.{}", self.reporting_schema, self.mart_table)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub program: String,
    pub project_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub profile: String,
    /// dbt subcommands run in order; the first failure stops the sequence
    pub commands: Vec<String>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            program: "dbt".to_string(),
            project_dir: PathBuf::from("dbt"),
            profiles_dir: PathBuf::from("dbt"),
            profile: "elt_pipeline".to_string(),
            commands: vec!["test".to_string(), "run".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Prometheus scrape listener, e.g. `127.0.0.1:9898`. Disabled when unset.
    pub metrics_addr: Option<String>,
    /// Pushgateway base URL for the run result. Disabled when unset.
    pub pushgateway_url: Option<String>,
    pub job_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_addr: None,
            pushgateway_url: None,
            job_name: "telecom_churn_elt_hourly".to_string(),
        }
    }
}

impl Config {
    /// Build the run configuration: file (explicit or default location),
    /// then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()));
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `CHURN_ELT_*` overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CHURN_ELT_INPUT_FILE") {
            self.paths.input_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("CHURN_ELT_ARCHIVE_DIR") {
            self.paths.archive_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CHURN_ELT_LOG_DIR") {
            self.paths.log_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CHURN_ELT_DATABASE_PATH") {
            self.database.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("CHURN_ELT_DBT_PROJECT_DIR") {
            self.transform.project_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CHURN_ELT_DBT_PROFILE") {
            self.transform.profile = v;
        }
        if let Some(v) = lookup("CHURN_ELT_METRICS_ADDR") {
            self.observability.metrics_addr = Some(v);
        }
        if let Some(v) = lookup("CHURN_ELT_PUSHGATEWAY_URL") {
            self.observability.pushgateway_url = Some(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let db = &self.database;
        for (field, value) in [
            ("database.staging_schema", &db.staging_schema),
            ("database.reporting_schema", &db.reporting_schema),
            ("database.staging_table", &db.staging_table),
            ("database.audit_table", &db.audit_table),
            ("database.mart_table", &db.mart_table),
            ("database.churn_flag_column", &db.churn_flag_column),
        ] {
            validate_identifier(field, value)?;
        }
        if db.staging_schema == db.reporting_schema {
            return Err(PipelineError::Config(
                "staging and reporting schemas must be distinct".to_string(),
            ));
        }
        if !self.paths.delimiter.is_ascii() {
            return Err(PipelineError::Config(format!(
                "paths.delimiter must be a single ASCII character, got '{}'",
                self.paths.delimiter
            )));
        }
        if self.transform.commands.is_empty() {
            return Err(PipelineError::Config(
                "transform.commands must name at least one command".to_string(),
            ));
        }
        Ok(())
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.paths.delimiter as u8
    }
}

/// Names are spliced into SQL, so only plain identifiers are accepted.
fn validate_identifier(field: &str, value: &str) -> Result<()> {
    let mut chars = value.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(PipelineError::Config(format!(
            "{field} must be a plain SQL identifier, got '{value}'"
        )))
    }
}
