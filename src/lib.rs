//! PachiLog - Track pachinko/pachislot play sessions
//!
//! PachiLog is a personal data-entry tool for recording play sessions: cash
//! invested, balls borrowed, spin counts, jackpot payouts, and the derived
//! statistics (spin rate, per-round payout, border line) over a sequence of
//! manually entered rows.
//!
//! # Overview
//!
//! A session is a small form wizard over an in-memory ledger: a setup screen,
//! a dashboard with the record list, a row-entry form, and a jackpot-detail
//! screen. The whole state is snapshotted to one JSON file after every
//! action, so a crash or refresh resumes exactly where play left off.
//! Finished sessions are archived in a local SQLite history.
//!
//! # Quick Start
//!
//! ```no_run
//! use pachilog::{Rate, Session};
//!
//! let mut session = Session::new();
//! session.start("Marion", 123, Rate::FourYen, 1000)?;
//! session.add_funds(500)?;
//!
//! session.begin_row(None)?;
//! session.loan()?;                    // +125 balls, -¥500 loanable
//! session.set_remaining(800)?;
//! session.set_spins(1000, 1500)?;
//! session.confirm_row()?;
//!
//! let row = &session.records[0];
//! println!("used {} balls at {:.2} spins/250", row.used_balls, row.spin_rate);
//! # Ok::<(), pachilog::SessionError>(())
//! ```
//!
//! # Arithmetic Conventions
//!
//! All user-entered counts are non-negative; negative deltas (counter typos,
//! miscounts) floor to zero and divisions are zero-guarded, so bad input
//! yields a harmless 0 instead of an error. Rates are rounded to two
//! decimals exactly once, when a row is confirmed.
//!
//! # Modules
//!
//! - [`ledger`]: pure arithmetic (used balls, spin rate, payout per round)
//! - [`session`]: the screen state machine and row-record lifecycle
//! - [`snapshot`]: whole-state JSON persistence for crash recovery
//! - [`border`]: standalone border-line / expected-value calculator
//! - [`history`]: SQLite archive of completed sessions
//! - [`report`]: CSV/JSON export of row records

pub mod border;
pub mod history;
pub mod ledger;
pub mod report;
pub mod schema;
pub mod serve;
pub mod session;
pub mod snapshot;

pub use border::{BorderResult, MachineSpec, NextState, RoundDistribution};
pub use ledger::Rate;
pub use session::{
    Action, MachineInfo, Page, RowRecord, Session, SessionError, SessionSummary,
};
pub use snapshot::Snapshot;
