use csv::ReaderBuilder;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::{debug, instrument};

use crate::constants::NULL_MARKERS;
use crate::error::Result;
use crate::types::{RawRecord, RawTable, RawValue};

/// The input artifact's rows plus a digest of its exact bytes
#[derive(Debug, Clone)]
pub struct Artifact {
    pub table: RawTable,
    pub sha256: String,
    pub bytes: usize,
}

/// Invalid UTF-8 is replaced rather than failing the whole artifact.
fn to_raw_value(field: &[u8]) -> RawValue {
    let field = String::from_utf8_lossy(field);
    if field.is_empty() || NULL_MARKERS.contains(&&*field) {
        RawValue::Absent
    } else {
        RawValue::Text(field.into_owned())
    }
}

/// A column whose every present cell parses as a number is numeric.
fn type_numeric_columns(records: &mut [RawRecord]) {
    let width = records.iter().map(Vec::len).max().unwrap_or(0);
    for col in 0..width {
        let mut present = 0;
        let all_numeric = records.iter().filter_map(|r| r.get(col)).all(|v| match v {
            RawValue::Text(s) => {
                present += 1;
                s.parse::<f64>().is_ok()
            }
            _ => true,
        });
        if !all_numeric || present == 0 {
            continue;
        }
        for cell in records.iter_mut().filter_map(|r| r.get_mut(col)) {
            if let RawValue::Text(s) = cell {
                if let Ok(n) = s.parse::<f64>() {
                    *cell = RawValue::Number(n);
                }
            }
        }
    }
}

/// Parse delimited text with a header row into a [`RawTable`].
///
/// Rows may be shorter or longer than the header; the normalizer pads and
/// ignores respectively, so no row is rejected here.
pub fn parse_delimited(bytes: &[u8], delimiter: u8) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = rdr
        .byte_headers()?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();

    let mut records = Vec::new();
    for record in rdr.byte_records() {
        let record = record?;
        let row: RawRecord = record.iter().map(to_raw_value).collect();
        records.push(row);
    }
    type_numeric_columns(&mut records);

    Ok(RawTable::new(headers, records))
}

/// Read the whole artifact from disk.
#[instrument]
pub fn read_artifact(path: &Path, delimiter: u8) -> Result<Artifact> {
    let bytes = fs::read(path)?;
    let sha256 = hex::encode(Sha256::digest(&bytes));
    let table = parse_delimited(&bytes, delimiter)?;
    debug!("Read {} bytes, {} rows, sha256={}", bytes.len(), table.len(), sha256);
    Ok(Artifact {
        table,
        sha256,
        bytes: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cells_and_null_markers_are_absent() {
        let csv = "Gender,Age,TotalCharges\nFemale,NA,\n,42, \n";
        let table = parse_delimited(csv.as_bytes(), b',').unwrap();
        assert_eq!(table.headers, vec!["Gender", "Age", "TotalCharges"]);
        assert_eq!(
            table.records[0],
            vec![RawValue::text("Female"), RawValue::Absent, RawValue::Absent]
        );
        assert_eq!(
            table.records[1],
            vec![RawValue::Absent, RawValue::Number(42.0), RawValue::text(" ")]
        );
    }

    #[test]
    fn only_fully_numeric_columns_become_numbers() {
        let csv = "Churn,MonthlyCharges\n1.0,50.5\n,abc\n0,20\n";
        let table = parse_delimited(csv.as_bytes(), b',').unwrap();
        assert_eq!(
            table.records[0],
            vec![RawValue::Number(1.0), RawValue::text("50.5")]
        );
        assert_eq!(table.records[1], vec![RawValue::Absent, RawValue::text("abc")]);
        assert_eq!(table.records[2][0], RawValue::Number(0.0));
    }

    #[test]
    fn invalid_utf8_degrades_instead_of_failing() {
        let table = parse_delimited(b"Gender,Age\nF\xe9male,30\nMale,40\n", b',').unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0][0], RawValue::text("F\u{FFFD}male"));
        assert_eq!(table.records[1][0], RawValue::text("Male"));
    }

    #[test]
    fn ragged_rows_are_kept() {
        let csv = "A,B,C\n1\n1,2,3,4\n";
        let table = parse_delimited(csv.as_bytes(), b',').unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].len(), 1);
        assert_eq!(table.records[1].len(), 4);
    }

    #[test]
    fn header_only_file_yields_no_rows() {
        let table = parse_delimited(b"Gender;Age\n", b';').unwrap();
        assert_eq!(table.headers, vec!["Gender", "Age"]);
        assert!(table.is_empty());
    }

    #[test]
    fn digest_covers_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        std::fs::write(&path, "A\n1\n").unwrap();
        let artifact = read_artifact(&path, b',').unwrap();
        assert_eq!(artifact.bytes, 4);
        assert_eq!(artifact.sha256.len(), 64);
    }
}
