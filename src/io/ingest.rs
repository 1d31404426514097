//! Measurement-grid CSV ingest.
//!
//! Expected columns (header names are case-insensitive, a UTF-8 BOM is
//! ignored):
//!
//! - `bin_lo`, `bin_hi`: bin edges, one bin per row
//! - `notice` (optional): `1/0`, `true/false` or `yes/no`; missing means noticed
//!
//! Unlike a data table, a grid with a bad row cannot be fitted around, so any
//! row error aborts the load with its line number.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::debug;

use crate::domain::{GridUnits, MeasurementGrid};
use crate::error::AppError;

/// Loaded grid plus bookkeeping for the report.
#[derive(Debug, Clone)]
pub struct IngestedGrid {
    pub grid: MeasurementGrid,
    pub rows_read: usize,
    pub has_notice_column: bool,
}

pub fn load_grid_csv(path: &Path, units: GridUnits) -> Result<IngestedGrid, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open grid CSV '{}': {e}", path.display())))?;
    read_grid_csv(file, units)
}

pub fn read_grid_csv(input: impl Read, units: GridUnits) -> Result<IngestedGrid, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::io(format!("Failed to read grid CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let column = |name: &str| {
        header_map
            .get(name)
            .copied()
            .ok_or_else(|| AppError::grid(format!("Grid CSV is missing the '{name}' column.")))
    };
    let lo_col = column("bin_lo")?;
    let hi_col = column("bin_hi")?;
    let notice_col = header_map.get("notice").copied();

    let mut lo = Vec::new();
    let mut hi = Vec::new();
    let mut notice = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| AppError::io(format!("line {line}: CSV parse error: {e}")))?;

        lo.push(parse_f64(&record, lo_col, "bin_lo", line)?);
        hi.push(parse_f64(&record, hi_col, "bin_hi", line)?);
        notice.push(match notice_col {
            Some(col) => parse_flag(record.get(col).unwrap_or(""), line)?,
            None => true,
        });
    }

    if lo.is_empty() {
        return Err(AppError::grid("Grid CSV has no bins."));
    }

    let rows_read = lo.len();
    debug!(rows_read, noticed = notice.iter().filter(|&&n| n).count(), "grid CSV loaded");
    let grid = MeasurementGrid::from_mask(lo, hi, &notice, units)?;
    Ok(IngestedGrid {
        grid,
        rows_read,
        has_notice_column: notice_col.is_some(),
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase(), idx))
        .collect()
}

fn parse_f64(record: &StringRecord, col: usize, name: &str, line: usize) -> Result<f64, AppError> {
    let raw = record.get(col).unwrap_or("");
    let value: f64 = raw
        .parse()
        .map_err(|_| AppError::grid(format!("line {line}: invalid {name} '{raw}'")))?;
    if !value.is_finite() {
        return Err(AppError::grid(format!("line {line}: {name} must be finite")));
    }
    Ok(value)
}

fn parse_flag(raw: &str, line: usize) -> Result<bool, AppError> {
    match raw.to_ascii_lowercase().as_str() {
        "" | "1" | "true" | "yes" | "y" => Ok(true),
        "0" | "false" | "no" | "n" => Ok(false),
        _ => Err(AppError::grid(format!("line {line}: invalid notice flag '{raw}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    #[test]
    fn reads_edges_and_notice_flags() {
        let csv = "\u{feff}BIN_LO,bin_hi,notice\n1,2,1\n2,3,no\n3,4,\n";
        let g = read_grid_csv(csv.as_bytes(), GridUnits::Angstrom).unwrap();
        assert_eq!(g.rows_read, 3);
        assert!(g.has_notice_column);
        assert_eq!(g.grid.notice_list(), &[0, 2]);
        assert_eq!(g.grid.bin_hi(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn notice_column_is_optional() {
        let g = read_grid_csv("bin_lo,bin_hi\n0.5,1.0\n1.0,2.0\n".as_bytes(), GridUnits::Kev).unwrap();
        assert!(!g.has_notice_column);
        assert_eq!(g.grid.n_notice(), 2);
        assert_eq!(g.grid.units(), GridUnits::Kev);
    }

    #[test]
    fn bad_rows_report_their_line() {
        let err = read_grid_csv("bin_lo,bin_hi\n1,2\n2,abc\n".as_bytes(), GridUnits::Kev).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Grid);
        assert!(err.to_string().starts_with("line 3:"), "{err}");

        let err = read_grid_csv("lo,hi\n1,2\n".as_bytes(), GridUnits::Kev).unwrap_err();
        assert!(err.to_string().contains("bin_lo"));

        assert!(read_grid_csv("bin_lo,bin_hi\n".as_bytes(), GridUnits::Kev).is_err());
    }

    #[test]
    fn rows_must_ascend() {
        let err = read_grid_csv("bin_lo,bin_hi\n3,4\n2,3\n1,2\n".as_bytes(), GridUnits::Kev).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Grid);
        assert!(err.to_string().contains("out of order"), "{err}");

        let err = read_grid_csv("bin_lo,bin_hi\n2,1\n".as_bytes(), GridUnits::Kev).unwrap_err();
        assert!(err.to_string().contains("above upper edge"), "{err}");
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bin_lo,bin_hi").unwrap();
        writeln!(file, "10,11").unwrap();
        let g = load_grid_csv(file.path(), GridUnits::Angstrom).unwrap();
        assert_eq!(g.grid.nbins(), 1);

        let err = load_grid_csv(Path::new("/no/such/grid.csv"), GridUnits::Angstrom).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
