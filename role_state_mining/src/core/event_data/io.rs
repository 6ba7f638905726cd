//! CSV import/export for [`StateSnapshotLog`]s and synthetic trace frequency tables

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::state_snapshot_log::{
    RoleSet, SnapshotRangeRow, SnapshotRow, StateSnapshotLog, StateSnapshotLogError,
    StateSnapshotLogOptions,
};
use crate::core::process_models::trace_frequency::TraceFrequency;

/// Column header of synthetic case ids in [`export_trace_frequency_csv`]
pub const CASE_ID_COLUMN: &str = "caseid";
/// Column header of dates in [`export_trace_frequency_csv`]
pub const DATE_COLUMN: &str = "date";
/// Column header of roles in [`export_trace_frequency_csv`]
pub const ROLE_COLUMN: &str = "role";

/// Error type for state snapshot log IO operations
#[derive(Debug)]
pub enum SnapshotLogIOError {
    /// IO Error
    Io(std::io::Error),
    /// CSV Error
    Csv(csv::Error),
    /// A configured column is not present in the header
    MissingColumn(String),
    /// A time cell could not be parsed as a number
    InvalidTime {
        /// Data row (1-based, excluding the header)
        row: usize,
        /// The cell content
        value: String,
    },
    /// Building the log from the parsed rows failed
    Log(StateSnapshotLogError),
    /// Unsupported Format
    UnsupportedFormat(String),
}

impl std::fmt::Display for SnapshotLogIOError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotLogIOError::Io(e) => write!(f, "IO Error: {}", e),
            SnapshotLogIOError::Csv(e) => write!(f, "CSV Error: {}", e),
            SnapshotLogIOError::MissingColumn(c) => write!(f, "Missing column: {}", c),
            SnapshotLogIOError::InvalidTime { row, value } => {
                write!(f, "Invalid time at row {}: '{}'", row, value)
            }
            SnapshotLogIOError::Log(e) => write!(f, "Log Error: {}", e),
            SnapshotLogIOError::UnsupportedFormat(s) => write!(f, "Unsupported Format: {}", s),
        }
    }
}

impl std::error::Error for SnapshotLogIOError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotLogIOError::Io(e) => Some(e),
            SnapshotLogIOError::Csv(e) => Some(e),
            SnapshotLogIOError::Log(e) => Some(e),
            SnapshotLogIOError::MissingColumn(_)
            | SnapshotLogIOError::InvalidTime { .. }
            | SnapshotLogIOError::UnsupportedFormat(_) => None,
        }
    }
}

impl From<std::io::Error> for SnapshotLogIOError {
    fn from(e: std::io::Error) -> Self {
        SnapshotLogIOError::Io(e)
    }
}

impl From<csv::Error> for SnapshotLogIOError {
    fn from(e: csv::Error) -> Self {
        SnapshotLogIOError::Csv(e)
    }
}

impl From<StateSnapshotLogError> for SnapshotLogIOError {
    fn from(e: StateSnapshotLogError) -> Self {
        SnapshotLogIOError::Log(e)
    }
}

/// Which CSV columns hold the case id, the role and the time (point or range)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SnapshotColumns {
    /// One time column per row
    Point {
        /// Case id column
        case_id: String,
        /// Role column
        activity: String,
        /// Time column
        time: String,
    },
    /// A start/end time range per row, expanded into point observations
    Range {
        /// Case id column
        case_id: String,
        /// Role column
        activity: String,
        /// First time column
        start: String,
        /// Last time column (inclusive)
        end: String,
    },
}

impl SnapshotColumns {
    /// Point time columns
    pub fn point(case_id: &str, activity: &str, time: &str) -> Self {
        SnapshotColumns::Point {
            case_id: case_id.to_string(),
            activity: activity.to_string(),
            time: time.to_string(),
        }
    }

    /// Range time columns
    pub fn range(case_id: &str, activity: &str, start: &str, end: &str) -> Self {
        SnapshotColumns::Range {
            case_id: case_id.to_string(),
            activity: activity.to_string(),
            start: start.to_string(),
            end: end.to_string(),
        }
    }
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, SnapshotLogIOError> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| SnapshotLogIOError::MissingColumn(name.to_string()))
}

fn parse_time(record: &csv::StringRecord, index: usize, row: usize) -> Result<f64, SnapshotLogIOError> {
    let value = record.get(index).unwrap_or_default();
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| SnapshotLogIOError::InvalidTime {
            row,
            value: value.to_string(),
        })
}

fn cell(record: &csv::StringRecord, index: usize) -> String {
    record.get(index).unwrap_or_default().trim().to_string()
}

///
/// Import a [`StateSnapshotLog`] from a CSV reader with a header row
///
/// Time cells are parsed as floating point numbers (e.g., `1801` or `1801.25`).
///
pub fn import_state_snapshot_log_csv<R: Read>(
    reader: R,
    columns: &SnapshotColumns,
    options: &StateSnapshotLogOptions,
) -> Result<StateSnapshotLog, SnapshotLogIOError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    match columns {
        SnapshotColumns::Point {
            case_id,
            activity,
            time,
        } => {
            let (ci, ai, ti) = (
                column_index(&headers, case_id)?,
                column_index(&headers, activity)?,
                column_index(&headers, time)?,
            );
            let mut rows = Vec::new();
            for (row, record) in csv_reader.records().enumerate() {
                let record = record?;
                rows.push(SnapshotRow::new(
                    cell(&record, ci),
                    cell(&record, ai),
                    parse_time(&record, ti, row + 1)?,
                ));
            }
            Ok(StateSnapshotLog::from_rows(rows, options)?)
        }
        SnapshotColumns::Range {
            case_id,
            activity,
            start,
            end,
        } => {
            let (ci, ai, si, ei) = (
                column_index(&headers, case_id)?,
                column_index(&headers, activity)?,
                column_index(&headers, start)?,
                column_index(&headers, end)?,
            );
            let mut rows = Vec::new();
            for (row, record) in csv_reader.records().enumerate() {
                let record = record?;
                rows.push(SnapshotRangeRow::new(
                    cell(&record, ci),
                    cell(&record, ai),
                    parse_time(&record, si, row + 1)?,
                    parse_time(&record, ei, row + 1)?,
                ));
            }
            Ok(StateSnapshotLog::from_range_rows(rows, options)?)
        }
    }
}

///
/// Import a [`StateSnapshotLog`] from a `.csv` or `.csv.gz` file
///
pub fn import_state_snapshot_log_csv_from_path<P: AsRef<Path>>(
    path: P,
    columns: &SnapshotColumns,
    options: &StateSnapshotLogOptions,
) -> Result<StateSnapshotLog, SnapshotLogIOError> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy().to_lowercase();
    let reader = BufReader::new(File::open(path)?);
    if path_str.ends_with(".csv.gz") {
        let gz = flate2::read::GzDecoder::new(reader);
        import_state_snapshot_log_csv(gz, columns, options)
    } else if path_str.ends_with(".csv") {
        import_state_snapshot_log_csv(reader, columns, options)
    } else {
        Err(SnapshotLogIOError::UnsupportedFormat(path_str))
    }
}

///
/// Export a [`StateSnapshotLog`] as CSV with one row per (snapshot, role)
///
pub fn export_state_snapshot_log_csv<W: Write>(
    log: &StateSnapshotLog,
    writer: W,
    case_id_column: &str,
    activity_column: &str,
    time_column: &str,
) -> Result<(), SnapshotLogIOError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([case_id_column, activity_column, time_column])?;
    for (_, trace) in log.iter() {
        for ss in trace {
            let time = ss.time.to_string();
            for role in &ss.activities {
                csv_writer.write_record([ss.case_id.as_str(), role.as_str(), time.as_str()])?;
            }
        }
    }
    csv_writer.flush()?;
    Ok(())
}

///
/// Expand a trace frequency table into a CSV case log
///
/// Every occurrence of a trace gets a fresh consecutive integer case id (starting at 1).
/// The snapshots of a case are dated one day apart, starting at `start_date`.
///
pub fn export_trace_frequency_csv<W: Write>(
    traces: &TraceFrequency<RoleSet>,
    writer: W,
    start_date: NaiveDate,
) -> Result<(), SnapshotLogIOError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([CASE_ID_COLUMN, DATE_COLUMN, ROLE_COLUMN])?;
    let mut case_id: u64 = 1;
    for (trace, freq) in traces.sorted_elements() {
        for _ in 0..freq {
            let mut date = start_date;
            let id = case_id.to_string();
            for entry in trace {
                let formatted = date.format("%Y%m%d").to_string();
                for role in entry {
                    csv_writer.write_record([id.as_str(), formatted.as_str(), role.as_str()])?;
                }
                date = date.checked_add_days(Days::new(1)).unwrap_or(date);
            }
            case_id += 1;
        }
    }
    csv_writer.flush()?;
    Ok(())
}

/// Export a trace frequency table to a CSV file (see [`export_trace_frequency_csv`])
pub fn export_trace_frequency_csv_path<P: AsRef<Path>>(
    traces: &TraceFrequency<RoleSet>,
    path: P,
    start_date: NaiveDate,
) -> Result<(), SnapshotLogIOError> {
    let writer = BufWriter::new(File::create(path)?);
    export_trace_frequency_csv(traces, writer, start_date)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::core::event_data::state_snapshot_log::{role_set, StateSnapshot};

    const POINT_CSV: &str = "personid,job,year
1,Student,1801
1,Student,1802
1,Student,1803
1,Student,1804
1,Drone,1805
2,Student,1801
2,Tutor,1801
2,Bludger,1805
";

    const RANGE_CSV: &str = "personid,job,yearStart,yearEnd
1,Student,1801,1804
1,Drone,1805,1805
2,Student,1801,1804
2,Tutor,1802,1804
2,Bludger,1805,1807
";

    #[test]
    fn import_point_csv() {
        let log = import_state_snapshot_log_csv(
            POINT_CSV.as_bytes(),
            &SnapshotColumns::point("personid", "job", "year"),
            &StateSnapshotLogOptions::default(),
        )
        .unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.trace("1").unwrap().len(), 5);
        assert_eq!(
            log.trace("2").unwrap()[0],
            StateSnapshot::new("2", 1801.0, ["Student", "Tutor"])
        );
    }

    #[test]
    fn import_point_csv_without_successive_duplicates() {
        let options = StateSnapshotLogOptions {
            keep_successive_duplicates: false,
            ..Default::default()
        };
        let log = import_state_snapshot_log_csv(
            POINT_CSV.as_bytes(),
            &SnapshotColumns::point("personid", "job", "year"),
            &options,
        )
        .unwrap();
        assert_eq!(
            log.variant_of("1").unwrap(),
            vec![role_set(["Student"]), role_set(["Drone"])]
        );
    }

    #[test]
    fn import_range_csv() {
        let options = StateSnapshotLogOptions {
            time_increment: 1.0,
            ..Default::default()
        };
        let log = import_state_snapshot_log_csv(
            RANGE_CSV.as_bytes(),
            &SnapshotColumns::range("personid", "job", "yearStart", "yearEnd"),
            &options,
        )
        .unwrap();
        assert_eq!(log.trace("1").unwrap().len(), 5);
        assert_eq!(log.trace("2").unwrap().len(), 7);
        assert_eq!(
            log.trace("2").unwrap()[3],
            StateSnapshot::new("2", 1804.0, ["Student", "Tutor"])
        );
    }

    #[test]
    fn missing_column_and_bad_time() {
        let err = import_state_snapshot_log_csv(
            POINT_CSV.as_bytes(),
            &SnapshotColumns::point("personid", "role", "year"),
            &StateSnapshotLogOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SnapshotLogIOError::MissingColumn(c) if c == "role"));

        let err = import_state_snapshot_log_csv(
            "id,job,year\n1,Student,soon\n".as_bytes(),
            &SnapshotColumns::point("id", "job", "year"),
            &StateSnapshotLogOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SnapshotLogIOError::InvalidTime { row: 1, .. }));
    }

    #[test]
    fn export_then_import_from_gz_path() {
        let log = import_state_snapshot_log_csv(
            POINT_CSV.as_bytes(),
            &SnapshotColumns::point("personid", "job", "year"),
            &StateSnapshotLogOptions::default(),
        )
        .unwrap();
        let mut plain = Vec::new();
        export_state_snapshot_log_csv(&log, &mut plain, "case", "role", "time").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv.gz");
        let mut encoder = flate2::write::GzEncoder::new(
            File::create(&path).unwrap(),
            flate2::Compression::default(),
        );
        encoder.write_all(&plain).unwrap();
        encoder.finish().unwrap();

        let reimported = import_state_snapshot_log_csv_from_path(
            &path,
            &SnapshotColumns::point("case", "role", "time"),
            &StateSnapshotLogOptions::default(),
        )
        .unwrap();
        assert_eq!(log, reimported);
    }

    #[test]
    fn export_synthetic_log() {
        let traces = TraceFrequency::new([
            (vec![role_set(["I"]), role_set(["A", "B"])], 2),
            (vec![role_set(["I"])], 1),
        ]);
        let mut out = Vec::new();
        let start = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        export_trace_frequency_csv(&traces, &mut out, start).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "caseid,date,role");
        // 1 row for the single-entry trace, 3 rows per occurrence of the other
        assert_eq!(lines.len(), 1 + 1 + 2 * 3);
        assert!(lines.contains(&"1,20200131,I"));
        assert!(lines.contains(&"2,20200201,B"));
        assert!(lines.contains(&"3,20200201,A"));
    }
}
