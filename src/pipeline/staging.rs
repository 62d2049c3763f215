//! Staging loader: input artifact → normalized batch → staging table → archive.

use chrono::{DateTime, Local, SecondsFormat, Utc};
use rusqlite::params;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::constants::{
    AGE, ARCHIVE_TIMESTAMP_FORMAT, CHURN, CONTRACT_TYPE, GENDER, INTERNET_SERVICE, IS_FEMALE,
    IS_SENIOR, LOAD_TIME, MONTHLY_CHARGES, TENURE, TOTAL_CHARGES,
};
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::normalize::normalize;
use crate::pipeline::source::read_artifact;
use crate::pipeline::warehouse::Warehouse;
use crate::types::Batch;

/// What a load attempt did
#[derive(Debug, Clone, Serialize)]
pub enum LoadOutcome {
    /// No artifact this hour; nothing downstream should run.
    Skipped { path: PathBuf },
    Loaded(LoadReport),
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub batch_id: Uuid,
    pub rows: usize,
    pub load_timestamp: DateTime<Utc>,
    pub sha256: String,
    pub archived_to: PathBuf,
}

/// Provenance written next to each batch in the audit table
#[derive(Debug, Clone)]
pub struct BatchAudit {
    pub batch_id: Uuid,
    pub source_file: String,
    pub sha256: String,
}

pub struct StagingLoader {
    input_file: PathBuf,
    archive_dir: PathBuf,
    delimiter: u8,
}

impl StagingLoader {
    pub fn new(input_file: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>, delimiter: u8) -> Self {
        Self {
            input_file: input_file.into(),
            archive_dir: archive_dir.into(),
            delimiter,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.paths.input_file.clone(),
            config.paths.archive_dir.clone(),
            config.delimiter_byte(),
        )
    }

    /// Load the artifact if present.
    ///
    /// The artifact is archived only after the batch commits, so any failure
    /// leaves it in place for the next run.
    #[instrument(skip(self, warehouse), fields(input = %self.input_file.display()))]
    pub fn load(&self, warehouse: &mut Warehouse) -> Result<LoadOutcome> {
        info!("Reading CSV file from: {}", self.input_file.display());
        if !self.input_file.exists() {
            warn!("Input file not found, skipping this run");
            metrics::load::skipped();
            return Ok(LoadOutcome::Skipped {
                path: self.input_file.clone(),
            });
        }

        let started = Instant::now();
        let artifact = read_artifact(&self.input_file, self.delimiter)?;
        metrics::load::artifact_read(artifact.bytes);

        let load_timestamp = Utc::now();
        let batch = normalize(&artifact.table, load_timestamp)?;

        let audit = BatchAudit {
            batch_id: Uuid::new_v4(),
            source_file: self
                .input_file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            sha256: artifact.sha256.clone(),
        };

        info!(
            "Loading {} rows into {}...",
            batch.len(),
            warehouse.config().staging_relation()
        );
        append_batch(warehouse, &batch, &audit)?;
        info!("Data load complete.");
        metrics::load::rows_appended(batch.len());

        let archived_to = archive_artifact(&self.input_file, &self.archive_dir, Local::now())?;
        info!("Archived input to {}", archived_to.display());
        metrics::load::duration(started.elapsed().as_secs_f64());

        Ok(LoadOutcome::Loaded(LoadReport {
            batch_id: audit.batch_id,
            rows: batch.len(),
            load_timestamp,
            sha256: artifact.sha256,
            archived_to,
        }))
    }
}

fn staging_ddl(relation: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {relation} (
            \"{GENDER}\" TEXT NOT NULL,
            \"{AGE}\" INTEGER NOT NULL,
            \"{TENURE}\" INTEGER NOT NULL,
            \"{MONTHLY_CHARGES}\" REAL NOT NULL,
            \"{TOTAL_CHARGES}\" REAL NOT NULL,
            \"{CONTRACT_TYPE}\" TEXT NOT NULL,
            \"{INTERNET_SERVICE}\" TEXT NOT NULL,
            \"{CHURN}\" TEXT NOT NULL,
            \"{IS_FEMALE}\" INTEGER NOT NULL,
            \"{IS_SENIOR}\" INTEGER NOT NULL,
            \"{LOAD_TIME}\" TEXT NOT NULL
        )"
    )
}

fn audit_ddl(relation: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {relation} (
            batch_id    TEXT PRIMARY KEY,
            source_file TEXT NOT NULL,
            sha256      TEXT NOT NULL,
            row_count   INTEGER NOT NULL,
            loaded_at   TEXT NOT NULL
        )"
    )
}

fn staging_insert(relation: &str) -> String {
    format!(
        "INSERT INTO {relation} (
            \"{GENDER}\", \"{AGE}\", \"{TENURE}\", \"{MONTHLY_CHARGES}\", \"{TOTAL_CHARGES}\",
            \"{CONTRACT_TYPE}\", \"{INTERNET_SERVICE}\", \"{CHURN}\",
            \"{IS_FEMALE}\", \"{IS_SENIOR}\", \"{LOAD_TIME}\"
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
    )
}

/// Append a batch and its audit row in one transaction.
///
/// Creates the staging tables on first use. Nothing is visible to readers
/// unless every row was written.
pub fn append_batch(warehouse: &mut Warehouse, batch: &Batch, audit: &BatchAudit) -> Result<()> {
    let staging = warehouse.config().staging_relation();
    let audit_table = warehouse.config().audit_relation();
    let loaded_at = batch
        .load_timestamp
        .to_rfc3339_opts(SecondsFormat::Micros, true);

    let tx = warehouse.conn_mut().transaction()?;
    tx.execute_batch(&format!("{};\n{};", staging_ddl(&staging), audit_ddl(&audit_table)))?;
    {
        let mut stmt = tx.prepare(&staging_insert(&staging))?;
        for r in &batch.records {
            stmt.execute(params![
                r.gender,
                r.age,
                r.tenure,
                r.monthly_charges,
                r.total_charges,
                r.contract_type,
                r.internet_service,
                r.churn,
                r.is_female,
                r.is_senior,
                loaded_at,
            ])?;
        }
    }
    tx.execute(
        &format!(
            "INSERT INTO {audit_table} (batch_id, source_file, sha256, row_count, loaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)"
        ),
        params![
            audit.batch_id.to_string(),
            audit.source_file,
            audit.sha256,
            batch.len() as i64,
            loaded_at,
        ],
    )?;
    tx.commit()?;
    Ok(())
}

/// `<archive_dir>/<stem>_<YYYY_MM_DD-HH_MM_SS>.<ext>`
pub fn archive_path(input: &Path, archive_dir: &Path, at: DateTime<Local>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let stamp = at.format(ARCHIVE_TIMESTAMP_FORMAT);
    let name = match input.extension() {
        Some(ext) => format!("{}_{}.{}", stem, stamp, ext.to_string_lossy()),
        None => format!("{}_{}", stem, stamp),
    };
    archive_dir.join(name)
}

/// Move a fully loaded artifact out of the drop location.
pub fn archive_artifact(input: &Path, archive_dir: &Path, at: DateTime<Local>) -> Result<PathBuf> {
    fs::create_dir_all(archive_dir)?;
    let target = archive_path(input, archive_dir, at);
    fs::rename(input, &target)?;
    metrics::load::archived();
    Ok(target)
}
