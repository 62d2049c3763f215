use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single untrusted cell from the input artifact
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Absent,
    Text(String),
    Number(f64),
}

impl RawValue {
    pub fn text(s: impl Into<String>) -> Self {
        RawValue::Text(s.into())
    }
}

/// One input row, positionally aligned with [`RawTable::headers`].
pub type RawRecord = Vec<RawValue>;

/// The input artifact as read: header row plus data rows, nothing validated
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, records: Vec<RawRecord>) -> Self {
        Self { headers, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A fully populated customer row, ready for the staging table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub gender: String,
    pub age: i64,
    pub tenure: i64,
    pub monthly_charges: f64,
    pub total_charges: f64,
    pub contract_type: String,
    pub internet_service: String,
    pub churn: String,
    pub is_female: u8,
    pub is_senior: u8,
    pub load_timestamp: DateTime<Utc>,
}

/// Every normalized row derived from one input artifact. Appended as a unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    pub load_timestamp: DateTime<Utc>,
    pub records: Vec<NormalizedRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
