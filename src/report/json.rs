//! JSON output for row records

use crate::session::RowRecord;
use std::io::{self, Write};

/// Write records as a pretty-printed JSON array
pub fn write<W: Write>(out: &mut W, records: &[RowRecord]) -> io::Result<()> {
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    out.write_all(json.as_bytes())?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_roundtrip() {
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
        let parsed: Vec<RowRecord> = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed, records);
    }
}
