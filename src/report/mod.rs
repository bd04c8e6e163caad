//! Export of the current session's row records
//!
//! Two formats, picked by output extension:
//!
//! - **JSON**: machine-readable, the records as a pretty-printed array
//! - **CSV**: spreadsheet-compatible, one row per record (the default)
//!
//! # Usage
//!
//! ```ignore
//! use pachilog::report;
//!
//! report::generate("session.json", &records)?;  // JSON
//! report::generate("session.csv", &records)?;   // CSV
//! ```

pub mod csv;
pub mod json;

use crate::session::RowRecord;
use std::io;
use std::path::Path;

/// Generate a report in the appropriate format based on file extension
pub fn generate<P: AsRef<Path>>(path: P, records: &[RowRecord]) -> io::Result<()> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let mut file = std::fs::File::create(path)?;

    match ext.as_str() {
        "json" => json::write(&mut file, records),
        _ => csv::write(&mut file, records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<RowRecord> {
        vec![
            RowRecord {
                time: "10:30".to_string(),
                used_balls: 325,
                start_spin: 1000,
                end_spin: 1500,
                normal_spins: 500,
                spin_rate: 384.62,
                gained_balls: 450,
                rounds: 5,
                payout_per_round: 90.0,
            },
            RowRecord {
                time: "11:05".to_string(),
                used_balls: 250,
                start_spin: 1500,
                end_spin: 1600,
                normal_spins: 100,
                spin_rate: 100.0,
                gained_balls: 0,
                rounds: 0,
                payout_per_round: 0.0,
            },
        ]
    }

    #[test]
    fn test_generate_picks_format_by_extension() {
        let dir = std::env::temp_dir();
        let json_path = dir.join(format!("pachilog_report_{}.json", std::process::id()));
        let csv_path = dir.join(format!("pachilog_report_{}.csv", std::process::id()));

        generate(&json_path, &sample_records()).unwrap();
        generate(&csv_path, &sample_records()).unwrap();

        let json = std::fs::read_to_string(&json_path).unwrap();
        assert!(json.trim_start().starts_with('['));
        let parsed: Vec<RowRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 2);

        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert!(csv.starts_with("time,"));
        assert_eq!(csv.lines().count(), 3); // header + 2 rows

        std::fs::remove_file(&json_path).ok();
        std::fs::remove_file(&csv_path).ok();
    }
}
