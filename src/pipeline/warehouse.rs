use rusqlite::{params, Connection};
use std::fs;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::Result;

/// Connection to the warehouse with the staging and reporting schemas
/// attached as separate namespaces.
pub struct Warehouse {
    conn: Connection,
    config: DatabaseConfig,
}

impl Warehouse {
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        info!("Opening warehouse at {}", config.path.display());
        let conn = Connection::open(&config.path)?;

        for schema in [&config.staging_schema, &config.reporting_schema] {
            let file = config.schema_file(schema);
            // Aliases are validated identifiers; only the file path is bindable.
            conn.execute(
                &format!("ATTACH DATABASE ?1 AS {schema}"),
                params![file.to_string_lossy().into_owned()],
            )?;
        }

        Ok(Self {
            conn,
            config: config.clone(),
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Row count of a schema-qualified relation
    pub fn count_rows(&self, relation: &str) -> Result<i64> {
        let count = self
            .conn
            .query_row(&format!("SELECT count(*) FROM {relation}"), [], |row| row.get(0))?;
        Ok(count)
    }
}
