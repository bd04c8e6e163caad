//! Flat-file session snapshot
//!
//! Crash/refresh recovery only: the whole state is rewritten to one JSON
//! file after every mutating action and read back exactly once at startup.
//! There is a single writer and a single reader, never concurrent, so no
//! locking and no partial writes.
//!
//! File shape:
//!
//! ```json
//! {
//!   "records": [ ... ],
//!   "machine_info": { ... },
//!   "is_active": true
//! }
//! ```
//!
//! A missing, unreadable, or malformed file degrades to a fresh start with
//! a non-fatal warning. A failed write drops that save and the session
//! carries on in memory; there is no retry.

use crate::session::{MachineInfo, Page, RowDraft, RowRecord, Session};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// Default snapshot location, next to wherever the process runs
pub const DEFAULT_SNAPSHOT_PATH: &str = "pachilog_session.json";

/// The persisted whole-state image. Per-row transients (the draft, the hit
/// sub-entries) are deliberately absent: a refresh abandons them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: Vec<RowRecord>,
    pub machine_info: MachineInfo,
    pub is_active: bool,
}

impl Snapshot {
    /// Capture the persistable parts of a session
    pub fn capture(session: &Session) -> Self {
        Self {
            records: session.records.clone(),
            machine_info: session.machine_info.clone(),
            is_active: session.is_active,
        }
    }

    /// Rebuild a session from a startup read. An active snapshot resumes
    /// straight at the dashboard; anything else starts fresh at setup.
    pub fn into_session(snapshot: Option<Self>) -> Session {
        match snapshot {
            Some(snap) if snap.is_active => Session {
                page: Page::Main,
                machine_info: snap.machine_info,
                records: snap.records,
                is_active: true,
                draft: RowDraft::default(),
                hit_entries: Vec::new(),
            },
            _ => Session::new(),
        }
    }
}

/// Overwrite the snapshot file with the session's current state
pub fn save<P: AsRef<Path>>(path: P, session: &Session) -> io::Result<()> {
    let snapshot = Snapshot::capture(session);
    let json = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)
}

/// Read the snapshot once at startup. Missing or malformed files are
/// treated as absent; malformed ones additionally get a warning so the
/// user knows their last session was not recovered.
pub fn load<P: AsRef<Path>>(path: P) -> Option<Snapshot> {
    let path = path.as_ref();
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            eprintln!(
                "\x1b[33mWarning: could not read snapshot {}: {} (starting fresh)\x1b[0m",
                path.display(),
                e
            );
            return None;
        }
    };

    match serde_json::from_str::<Snapshot>(&data) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            eprintln!(
                "\x1b[33mWarning: snapshot {} is malformed: {} (starting fresh)\x1b[0m",
                path.display(),
                e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Rate;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("pachilog_test_{}_{}.json", name, std::process::id()));
        p
    }

    fn populated_session() -> Session {
        let mut s = Session::new();
        s.start("Marion", 123, Rate::FourYen, 1000).unwrap();
        s.add_funds(1000).unwrap();
        s.begin_row(None).unwrap();
        s.set_remaining(800).unwrap();
        s.set_spins(0, 100).unwrap();
        s.confirm_row().unwrap();
        s
    }

    // ==========================================================================
    // SAVE / LOAD TESTS
    // ==========================================================================

    #[test]
    fn test_save_then_load_roundtrip() {
        let path = temp_path("roundtrip");
        let session = populated_session();

        save(&path, &session).unwrap();
        let snap = load(&path).expect("snapshot should load");

        assert!(snap.is_active);
        assert_eq!(snap.records, session.records);
        assert_eq!(snap.machine_info, session.machine_info);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_absent() {
        let path = temp_path("does_not_exist");
        std::fs::remove_file(&path).ok();
        assert!(load(&path).is_none());
    }

    #[test]
    fn test_malformed_file_is_absent() {
        let path = temp_path("malformed");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load(&path).is_none());
        std::fs::remove_file(&path).ok();
    }

    // ==========================================================================
    // RESTORE RULE TESTS
    // ==========================================================================

    #[test]
    fn test_crash_recovery_resumes_at_dashboard() {
        // Simulated crash: last save happened while the session was active
        let path = temp_path("crash");
        let session = populated_session();
        save(&path, &session).unwrap();

        let restored = Snapshot::into_session(load(&path));
        assert_eq!(restored.page, Page::Main);
        assert!(restored.is_active);
        assert_eq!(restored.records, session.records);
        assert_eq!(restored.machine_info, session.machine_info);
        // Transients never survive a restart
        assert_eq!(restored.draft, RowDraft::default());
        assert!(restored.hit_entries.is_empty());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_ended_session_restarts_fresh() {
        // The end write persisted is_active=false, so restore must not resume
        let path = temp_path("ended");
        let mut session = populated_session();
        session.end_session().unwrap();
        save(&path, &session).unwrap();

        let restored = Snapshot::into_session(load(&path));
        assert_eq!(restored.page, Page::Select);
        assert!(!restored.is_active);
        assert!(restored.records.is_empty());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_no_snapshot_restarts_fresh() {
        let restored = Snapshot::into_session(None);
        assert_eq!(restored.page, Page::Select);
        assert!(!restored.is_active);
    }
}
