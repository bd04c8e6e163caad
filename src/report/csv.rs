//! CSV output for row records

use crate::session::RowRecord;
use std::io::{self, Write};

const HEADER: &str =
    "time,used_balls,start_spin,end_spin,normal_spins,spin_rate,gained_balls,rounds,payout_per_round";

/// Write records as CSV with a fixed header row
pub fn write<W: Write>(out: &mut W, records: &[RowRecord]) -> io::Result<()> {
    writeln!(out, "{}", HEADER)?;
    for r in records {
        writeln!(
            out,
            "{},{},{},{},{},{:.2},{},{},{:.2}",
            r.time,
            r.used_balls,
            r.start_spin,
            r.end_spin,
            r.normal_spins,
            r.spin_rate,
            r.gained_balls,
            r.rounds,
            r.payout_per_round
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_shape() {
        let records = vec![RowRecord {
            time: "10:30".to_string(),
            used_balls: 325,
            start_spin: 1000,
            end_spin: 1500,
            normal_spins: 500,
            spin_rate: 384.62,
            gained_balls: 450,
            rounds: 5,
            payout_per_round: 90.0,
        }];

        let mut buf = Vec::new();
        write(&mut buf, &records).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(HEADER));
        assert_eq!(lines.next(), Some("10:30,325,1000,1500,500,384.62,450,5,90.00"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_empty_records_header_only() {
        let mut buf = Vec::new();
        write(&mut buf, &[]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
