//! Raw customer rows to staging-ready records.
//!
//! Normalization never fails on cell contents: anything malformed degrades to
//! the field's default. The only errors are structural (a required column is
//! missing from the header, or two headers collapse onto the same name).

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::constants::{
    AGE, CHURN, CONTRACT_TYPE, DEFAULT_CHURN, GENDER, INTERNET_SERVICE, MONTHLY_CHARGES,
    REQUIRED_COLUMNS, SENIOR_AGE_THRESHOLD, TENURE, TOTAL_CHARGES, UNKNOWN,
};
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::types::{Batch, NormalizedRecord, RawRecord, RawTable, RawValue};

static NON_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^A-Za-z0-9]+").expect("static regex is valid")
});

/// Strip everything that is not an ASCII letter or digit from a header.
pub fn canonicalize_column_name(name: &str) -> String {
    NON_ALPHANUMERIC.replace_all(name, "").trim().to_string()
}

/// Positions of the required columns within a raw header row
#[derive(Debug, Clone)]
struct ColumnMap {
    gender: usize,
    age: usize,
    tenure: usize,
    monthly_charges: usize,
    total_charges: usize,
    contract_type: usize,
    internet_service: usize,
    churn: usize,
}

impl ColumnMap {
    fn resolve(headers: &[String]) -> Result<Self> {
        let mut positions: HashMap<String, usize> = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            let canonical = canonicalize_column_name(header);
            if positions.contains_key(&canonical) {
                if REQUIRED_COLUMNS.contains(&canonical.as_str()) {
                    return Err(PipelineError::DuplicateColumn { column: canonical });
                }
                continue;
            }
            positions.insert(canonical, idx);
        }

        let find = |name: &str| {
            positions
                .get(name)
                .copied()
                .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
        };

        let map = ColumnMap {
            gender: find(GENDER)?,
            age: find(AGE)?,
            tenure: find(TENURE)?,
            monthly_charges: find(MONTHLY_CHARGES)?,
            total_charges: find(TOTAL_CHARGES)?,
            contract_type: find(CONTRACT_TYPE)?,
            internet_service: find(INTERNET_SERVICE)?,
            churn: find(CHURN)?,
        };

        let ignored = positions.len() - REQUIRED_COLUMNS.len();
        if ignored > 0 {
            debug!("Ignoring {} column(s) not present in the staging schema", ignored);
        }
        Ok(map)
    }
}

/// Out-of-range positions and empty text both read as missing.
fn cell(record: &RawRecord, idx: usize) -> &RawValue {
    match record.get(idx) {
        None => &RawValue::Absent,
        Some(RawValue::Text(s)) if s.is_empty() => &RawValue::Absent,
        Some(value) => value,
    }
}

fn number_to_text(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn text_or(value: &RawValue, default: &str) -> String {
    match value {
        RawValue::Absent => default.to_string(),
        RawValue::Text(s) => s.clone(),
        RawValue::Number(n) => number_to_text(*n),
    }
}

/// Lenient numeric parse. `None` for anything that is not a number; NaN
/// counts as missing. Infinities are kept.
fn parse_number(value: &RawValue) -> Option<f64> {
    let n = match value {
        RawValue::Absent => return None,
        RawValue::Number(n) => *n,
        RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
    };
    (!n.is_nan()).then_some(n)
}

/// Missing, unparseable or infinite integers become 0; fractional values truncate.
fn int_or_zero(value: &RawValue) -> i64 {
    parse_number(value)
        .filter(|n| n.is_finite())
        .map(|n| n.trunc() as i64)
        .unwrap_or(0)
}

fn float_or_zero(value: &RawValue) -> f64 {
    parse_number(value).unwrap_or(0.0)
}

/// An empty charge cell means "not billed yet", not a literal zero string.
fn blank_as_absent(value: &RawValue) -> &RawValue {
    match value {
        RawValue::Text(s) if s.trim().is_empty() => &RawValue::Absent,
        other => other,
    }
}

fn flag(condition: bool) -> u8 {
    u8::from(condition)
}

pub fn is_female(gender: &str) -> u8 {
    flag(gender.trim().to_lowercase() == "female")
}

pub fn is_senior(age: i64) -> u8 {
    flag(age > SENIOR_AGE_THRESHOLD)
}

fn normalize_record(
    columns: &ColumnMap,
    record: &RawRecord,
    load_timestamp: DateTime<Utc>,
) -> NormalizedRecord {
    let gender = text_or(cell(record, columns.gender), UNKNOWN);
    let age = int_or_zero(cell(record, columns.age));
    let tenure = int_or_zero(cell(record, columns.tenure));
    let monthly_charges = float_or_zero(cell(record, columns.monthly_charges));
    let total_charges = float_or_zero(blank_as_absent(cell(record, columns.total_charges)));
    let contract_type = text_or(cell(record, columns.contract_type), UNKNOWN);
    let internet_service = text_or(cell(record, columns.internet_service), UNKNOWN);
    let churn = text_or(cell(record, columns.churn), DEFAULT_CHURN);

    NormalizedRecord {
        is_female: is_female(&gender),
        is_senior: is_senior(age),
        gender,
        age,
        tenure,
        monthly_charges,
        total_charges,
        contract_type,
        internet_service,
        churn,
        load_timestamp,
    }
}

/// Normalize a whole input table into one batch stamped with `load_timestamp`.
///
/// Output has exactly one record per input row, in input order.
#[instrument(skip(table), fields(rows = table.len()))]
pub fn normalize(table: &RawTable, load_timestamp: DateTime<Utc>) -> Result<Batch> {
    let columns = ColumnMap::resolve(&table.headers)?;

    let records: Vec<NormalizedRecord> = table
        .records
        .iter()
        .map(|record| normalize_record(&columns, record, load_timestamp))
        .collect();

    metrics::normalize::batch_normalized(records.len());
    debug!("Normalized {} rows", records.len());

    Ok(Batch {
        load_timestamp,
        records,
    })
}
