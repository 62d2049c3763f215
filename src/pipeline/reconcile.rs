use serde::{Serialize, Serializer};
use std::fmt;
use tracing::{info, instrument};

use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::pipeline::warehouse::Warehouse;

/// Share of staged rows missing from the mart.
///
/// With nothing staged the loss is reported as the bare number `0` rather
/// than a percentage string; downstream dashboards key on that shape.
#[derive(Debug, Clone, PartialEq)]
pub enum DataLossPercentage {
    NoRawRecords,
    Percent(String),
}

impl Serialize for DataLossPercentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            DataLossPercentage::NoRawRecords => serializer.serialize_u8(0),
            DataLossPercentage::Percent(p) => serializer.serialize_str(p),
        }
    }
}

impl fmt::Display for DataLossPercentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataLossPercentage::NoRawRecords => write!(f, "0"),
            DataLossPercentage::Percent(p) => write!(f, "{p}"),
        }
    }
}

/// Raw vs. mart reconciliation for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowStats {
    pub raw_record_count: i64,
    pub transformed_record_count: i64,
    pub data_loss_percentage: DataLossPercentage,
    pub calculated_churn_rate: String,
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value)
}

impl FlowStats {
    pub fn compute(raw_count: i64, mart_count: i64, avg_churn_flag: f64) -> Self {
        let data_loss_percentage = if raw_count > 0 {
            let loss = (raw_count - mart_count) as f64 / raw_count as f64 * 100.0;
            DataLossPercentage::Percent(percent(loss))
        } else {
            DataLossPercentage::NoRawRecords
        };

        Self {
            raw_record_count: raw_count,
            transformed_record_count: mart_count,
            data_loss_percentage,
            calculated_churn_rate: percent(avg_churn_flag * 100.0),
        }
    }

    /// `(key, value)` pairs in report order
    pub fn entries(&self) -> [(&'static str, String); 4] {
        [
            ("raw_record_count", self.raw_record_count.to_string()),
            ("transformed_record_count", self.transformed_record_count.to_string()),
            ("data_loss_percentage", self.data_loss_percentage.to_string()),
            ("calculated_churn_rate", self.calculated_churn_rate.clone()),
        ]
    }
}

/// Reads the staging and mart aggregates and derives the run statistics.
pub struct ReconciliationReporter;

impl ReconciliationReporter {
    #[instrument(skip_all)]
    pub fn report(warehouse: &Warehouse) -> Result<FlowStats> {
        let db = warehouse.config();
        let mart = db.mart_relation();

        let raw_count = warehouse.count_rows(&db.staging_relation())?;
        let mart_count = warehouse.count_rows(&mart)?;
        let avg_flag: Option<f64> = warehouse.conn().query_row(
            &format!("SELECT avg({}) FROM {}", db.churn_flag_column, mart),
            [],
            |row| row.get(0),
        )?;
        let avg_flag = avg_flag.ok_or_else(|| PipelineError::Reconciliation {
            message: format!("avg({}) over {} is NULL; the mart is empty", db.churn_flag_column, mart),
        })?;

        let stats = FlowStats::compute(raw_count, mart_count, avg_flag);

        info!("--- ELT Flow Statistics ---");
        for (key, value) in stats.entries() {
            info!("| {:<30}: {}", key, value);
        }
        info!("---------------------------");

        metrics::report::recorded(raw_count, mart_count);
        Ok(stats)
    }
}
