#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use churn_elt::config::{Config, DatabaseConfig};
use churn_elt::error::{PipelineError, Result};
use churn_elt::pipeline::{TransformEngine, Warehouse};

pub const HEADER: &str =
    "Customer ID,Gender,Age,Tenure,Monthly Charges,Total Charges,Contract Type,Internet Service,Churn";

/// Config rooted in a temp dir
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.paths.input_file = root.join("ToProcess").join("telecom_custom_data.csv");
    config.paths.archive_dir = root.join("Processed");
    config.paths.log_dir = root.join("logs");
    config.database.path = root.join("db").join("warehouse.db");
    config
}

pub fn write_input(config: &Config, rows: &[&str]) {
    let path = &config.paths.input_file;
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut body = String::from(HEADER);
    body.push('\n');
    for row in rows {
        body.push_str(row);
        body.push('\n');
    }
    std::fs::write(path, body).unwrap();
}

pub fn staging_count(config: &Config) -> i64 {
    let wh = Warehouse::open(&config.database).unwrap();
    let exists: i64 = wh
        .conn()
        .query_row(
            "SELECT count(*) FROM staging_schema.sqlite_master WHERE name = ?1",
            [&config.database.staging_table],
            |row| row.get(0),
        )
        .unwrap();
    if exists == 0 {
        return 0;
    }
    wh.count_rows(&config.database.staging_relation()).unwrap()
}

/// Stands in for dbt: rebuilds the mart from staging with plain SQL.
pub struct SqlMartEngine {
    pub database: DatabaseConfig,
    /// Staging rows with `Age` below this are dropped from the mart
    pub min_age: i64,
    pub calls: Arc<AtomicUsize>,
}

impl SqlMartEngine {
    pub fn new(database: &DatabaseConfig) -> Self {
        Self {
            database: database.clone(),
            min_age: 0,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl TransformEngine for SqlMartEngine {
    async fn run(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let wh = Warehouse::open(&self.database)?;
        wh.conn().execute_batch(&format!(
            "DROP TABLE IF EXISTS {mart};
             CREATE TABLE {mart} AS
               SELECT Gender AS gender, Age AS age,
                      CASE WHEN Churn = 'Yes' THEN 1 ELSE 0 END AS {flag}
               FROM {staging}
               WHERE Age >= {min_age};",
            mart = self.database.mart_relation(),
            flag = self.database.churn_flag_column,
            staging = self.database.staging_relation(),
            min_age = self.min_age,
        ))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "sql-mart"
    }
}

/// Always fails, like a dbt run with a broken model.
pub struct FailingEngine {
    pub calls: Arc<AtomicUsize>,
}

impl FailingEngine {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl TransformEngine for FailingEngine {
    async fn run(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PipelineError::Transform {
            message: "dbt run exited with status 1".to_string(),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Succeeds without building anything.
pub struct NoopEngine;

#[async_trait]
impl TransformEngine for NoopEngine {
    async fn run(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "noop"
    }
}
