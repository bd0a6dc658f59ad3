//! Flow table loading.
//!
//! A flow table is a delimited text file with a header row naming at least
//! the `source`, `target` and `value` columns. Column order is free and extra
//! columns are ignored.
//!
//! # Row filtering
//!
//! Rows are never rejected for bad data. A row is silently dropped (and
//! counted in [`LoadReport::dropped`]) when:
//!
//! - its `value` cell does not parse as a number, or parses to a non-finite
//!   or negative number,
//! - its `source` or `target` cell is empty,
//! - it is too short to contain all three required columns.
//!
//! Structural problems with the file itself (unreadable file, broken
//! quoting, invalid UTF-8, rows wider than the header) abort the load with
//! [`SankeyError::Load`].

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::SankeyError;

/// Columns every flow table must provide, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 3] = ["source", "target", "value"];

/// One validated `source → target` flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowRecord {
    pub source: String,
    pub target: String,
    pub value: f64,
}

impl FlowRecord {
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>, value: f64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            value,
        }
    }
}

/// Knobs for parsing the table text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Field delimiter byte. Defaults to `,`.
    pub delimiter: u8,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// Records loaded from a table plus the number of rows that were filtered out.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadReport {
    pub records: Vec<FlowRecord>,
    pub dropped: usize,
}

/// Parses delimited flow tables into [`FlowRecord`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableLoader {
    options: LoaderOptions,
}

impl TableLoader {
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Load the table at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SankeyError::Load`] if the file cannot be opened or parsed,
    /// and [`SankeyError::Schema`] if a required column is missing.
    pub fn load(&self, path: &Path) -> Result<Vec<FlowRecord>, SankeyError> {
        self.load_with_report(path).map(|report| report.records)
    }

    /// Load the table at `path`, keeping the dropped-row count.
    ///
    /// # Errors
    ///
    /// Same as [`TableLoader::load`].
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn load_with_report(&self, path: &Path) -> Result<LoadReport, SankeyError> {
        let origin = path.display().to_string();
        let file = File::open(path).map_err(|e| SankeyError::load(origin.clone(), e))?;
        let report = self.read_from(file, &origin)?;

        info!(
            dropped = report.dropped,
            "loaded {} records from {origin}",
            report.records.len()
        );
        Ok(report)
    }

    /// Load a table from any reader (stdin, in-memory buffers, ...).
    ///
    /// # Errors
    ///
    /// Same as [`TableLoader::load`].
    pub fn read<R: Read>(&self, reader: R) -> Result<LoadReport, SankeyError> {
        self.read_from(reader, "<input>")
    }

    fn read_from<R: Read>(&self, reader: R, origin: &str) -> Result<LoadReport, SankeyError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| SankeyError::load(origin, e))?
            .clone();
        let columns = ColumnMap::resolve(&headers)?;
        let width = headers.len();

        let mut report = LoadReport::default();
        for row in csv_reader.records() {
            let row = row.map_err(|e| SankeyError::load(origin, e))?;
            let line = row.position().map_or(0, csv::Position::line);

            if row.len() > width {
                return Err(SankeyError::load(
                    origin,
                    format!(
                        "line {line} has {} fields but the header has {width}",
                        row.len()
                    ),
                ));
            }

            match columns.extract(&row) {
                Some(record) => report.records.push(record),
                None => {
                    debug!(line, "dropping row with missing or non-numeric cells");
                    report.dropped += 1;
                }
            }
        }

        Ok(report)
    }
}

/// Positions of the required columns within the header row.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    source: usize,
    target: usize,
    value: usize,
}

impl ColumnMap {
    fn resolve(headers: &StringRecord) -> Result<Self, SankeyError> {
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        };

        match (position("source"), position("target"), position("value")) {
            (Some(source), Some(target), Some(value)) => Ok(Self {
                source,
                target,
                value,
            }),
            found => {
                let found = [found.0, found.1, found.2];
                let missing = REQUIRED_COLUMNS
                    .iter()
                    .zip(found)
                    .filter(|(_, pos)| pos.is_none())
                    .map(|(name, _)| (*name).to_string())
                    .collect();
                Err(SankeyError::Schema { missing })
            }
        }
    }

    fn extract(&self, row: &StringRecord) -> Option<FlowRecord> {
        let source = row.get(self.source).filter(|s| !s.is_empty())?;
        let target = row.get(self.target).filter(|s| !s.is_empty())?;
        let value = row.get(self.value).and_then(coerce_value)?;
        Some(FlowRecord::new(source, target, value))
    }
}

/// Coerce a `value` cell to a usable flow amount.
///
/// `None` marks the cell as missing: unparseable, NaN, infinite or negative.
#[must_use]
pub fn coerce_value(cell: &str) -> Option<f64> {
    let value = cell.trim().parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(text: &str) -> Result<LoadReport, SankeyError> {
        TableLoader::default().read(text.as_bytes())
    }

    #[test]
    fn loads_basic_table_in_order() {
        let report = read("source,target,value\nA,B,10\nB,C,5\n").expect("load");
        assert_eq!(
            report.records,
            vec![FlowRecord::new("A", "B", 10.0), FlowRecord::new("B", "C", 5.0)]
        );
        assert_eq!(report.dropped, 0);
    }

    #[test]
    fn non_numeric_value_row_is_dropped() {
        let report = read("source,target,value\nA,B,10\nX,Y,notanumber\nB,C,5\n").expect("load");
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.dropped, 1);
        assert!(report.records.iter().all(|r| r.source != "X"));
    }

    #[test]
    fn negative_and_non_finite_values_are_dropped() {
        let report =
            read("source,target,value\nA,B,-1\nA,C,inf\nA,D,NaN\nA,E,2.5\n").expect("load");
        assert_eq!(report.records, vec![FlowRecord::new("A", "E", 2.5)]);
        assert_eq!(report.dropped, 3);
    }

    #[test]
    fn empty_endpoints_and_short_rows_are_dropped() {
        let report = read("source,target,value\n,B,1\nA,,2\nA,B\nA,B,3\n").expect("load");
        assert_eq!(report.records, vec![FlowRecord::new("A", "B", 3.0)]);
        assert_eq!(report.dropped, 3);
    }

    #[test]
    fn column_order_is_free_and_extra_columns_ignored() {
        let report = read("note,value,target,source\nhi,4,Y,X\n").expect("load");
        assert_eq!(report.records, vec![FlowRecord::new("X", "Y", 4.0)]);
    }

    #[test]
    fn missing_target_column_is_schema_error() {
        let err = read("source,value\nA,1\n").expect_err("schema error");
        match err {
            SankeyError::Schema { missing } => assert_eq!(missing, vec!["target"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn column_names_are_case_sensitive() {
        let err = read("Source,Target,Value\nA,B,1\n").expect_err("schema error");
        assert!(matches!(err, SankeyError::Schema { ref missing } if missing.len() == 3));
    }

    #[test]
    fn zero_byte_input_is_schema_error() {
        assert!(matches!(read(""), Err(SankeyError::Schema { .. })));
    }

    #[test]
    fn header_only_table_loads_no_records() {
        let report = read("source,target,value\n").expect("load");
        assert!(report.records.is_empty());
        assert_eq!(report.dropped, 0);
    }

    #[test]
    fn row_wider_than_header_is_load_error() {
        let err = read("source,target,value\nA,B,1,extra\n").expect_err("load error");
        assert!(matches!(err, SankeyError::Load { .. }));
        assert!(err.to_string().contains("4 fields"));
    }

    #[test]
    fn invalid_utf8_is_load_error() {
        let bytes: &[u8] = b"source,target,value\n\xff\xfe,B,1\n";
        let err = TableLoader::default().read(bytes).expect_err("load error");
        assert!(matches!(err, SankeyError::Load { .. }));
    }

    #[test]
    fn custom_delimiter_is_honored() {
        let loader = TableLoader::new(LoaderOptions { delimiter: b';' });
        let report = loader.read("source;target;value\nA;B;1,5\n".as_bytes());
        // "1,5" is not a number with a `;` delimiter either
        assert_eq!(report.expect("load").dropped, 1);

        let report = loader
            .read("source;target;value\nA;B;1.5\n".as_bytes())
            .expect("load");
        assert_eq!(report.records, vec![FlowRecord::new("A", "B", 1.5)]);
    }

    #[test]
    fn missing_file_is_load_error() {
        let err = TableLoader::default()
            .load(Path::new("/definitely/not/here.csv"))
            .expect_err("load error");
        assert!(matches!(err, SankeyError::Load { .. }));
    }

    #[test]
    fn coerce_value_trims_whitespace() {
        assert_eq!(coerce_value(" 12 "), Some(12.0));
        assert_eq!(coerce_value("1e3"), Some(1000.0));
        assert_eq!(coerce_value(""), None);
        assert_eq!(coerce_value("ten"), None);
    }
}
