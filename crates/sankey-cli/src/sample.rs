//! The built-in demo table written by `--sample`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

/// File name the demo table is written to, relative to the working directory.
pub const SAMPLE_FILE: &str = "sample_sankey_data.csv";

#[derive(Debug, Clone, Copy, Serialize)]
struct SampleRow {
    source: &'static str,
    target: &'static str,
    value: u32,
}

const fn row(source: &'static str, target: &'static str, value: u32) -> SampleRow {
    SampleRow {
        source,
        target,
        value,
    }
}

const SAMPLE_ROWS: [SampleRow; 7] = [
    row("A", "B", 10),
    row("A", "C", 15),
    row("B", "D", 8),
    row("B", "E", 12),
    row("C", "D", 5),
    row("C", "E", 7),
    row("D", "F", 20),
];

/// Write the demo table to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_sample(path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for sample in &SAMPLE_ROWS {
        writer
            .serialize(sample)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sankey_core::loader::TableLoader;

    #[test]
    fn sample_has_header_and_seven_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SAMPLE_FILE);
        write_sample(&path).expect("write sample");

        let text = std::fs::read_to_string(&path).expect("read back");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "source,target,value");
        assert_eq!(lines[1], "A,B,10");
        assert_eq!(lines[7], "D,F,20");
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn sample_loads_cleanly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SAMPLE_FILE);
        write_sample(&path).expect("write sample");

        let report = TableLoader::default()
            .load_with_report(&path)
            .expect("load sample");
        assert_eq!(report.records.len(), 7);
        assert_eq!(report.dropped, 0);
        let total: f64 = report.records.iter().map(|r| r.value).sum();
        assert!((total - 77.0).abs() < f64::EPSILON);
    }
}
