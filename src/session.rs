//! Session state machine
//!
//! One active play session is a small wizard:
//!
//! ```text
//! Select ──start──▶ Main ──begin_row──▶ AddRow ──begin_hits──▶ HitDist
//!   ▲                │ ▲                  │ ▲                     │
//!   └──end_session───┘ └──confirm/cancel──┘ └─────confirm_hits────┘
//! ```
//!
//! All state lives in an explicit [`Session`] struct and every transition is
//! a method of `(current state, inputs) -> Result`, so the whole machine is
//! unit-testable without a UI in front of it. Wrong-page actions are rejected
//! rather than silently applied.
//!
//! Invalid user input never propagates as a failure: it comes back as a
//! [`SessionError`] the UI renders as a warning, and the session stays put.

use crate::ledger::{self, Rate};
use serde::{Deserialize, Serialize};

/// Deposit denominations accepted by the add-funds button row
pub const DEPOSIT_DENOMINATIONS: [u32; 4] = [500, 1000, 5000, 10_000];

/// Which screen the wizard is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    /// Session setup: shop, table, rate, opening balls
    Select,
    /// Dashboard with the record list and money buttons
    Main,
    /// Row entry form
    AddRow,
    /// Jackpot sub-entry list for the pending row
    HitDist,
}

impl std::fmt::Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Page::Select => "select",
            Page::Main => "main",
            Page::AddRow => "add_row",
            Page::HitDist => "hit_dist",
        };
        write!(f, "{}", name)
    }
}

/// Identifiers and running balances for the session in progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineInfo {
    pub shop_name: String,
    pub table_number: u32,
    pub rate: Rate,
    /// Current ball count (the running total shown on the dashboard)
    pub current_balls: u32,
    /// Cumulative cash invested this session (yen)
    pub total_invest: u32,
    /// Cash invested but not yet converted to balls (yen).
    /// Only ever decreases in whole loan units, never below zero.
    pub loanable_yen: u32,
    /// Wall-clock session start, HH:MM
    pub start_time: String,
}

impl Default for MachineInfo {
    fn default() -> Self {
        Self {
            shop_name: String::new(),
            table_number: 0,
            rate: Rate::FourYen,
            current_balls: 0,
            total_invest: 0,
            loanable_yen: 0,
            start_time: String::new(),
        }
    }
}

/// One completed play interval, appended (or overwritten by edit index) in
/// the record list. Identity is positional; records are never reordered and
/// only ending the session removes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRecord {
    /// HH:MM stamp set at first confirmation; edits keep the original
    pub time: String,
    pub used_balls: u32,
    pub start_spin: u32,
    pub end_spin: u32,
    pub normal_spins: u32,
    /// Rounded once at confirmation
    pub spin_rate: f64,
    pub gained_balls: u32,
    pub rounds: u32,
    /// Rounded once at confirmation
    pub payout_per_round: f64,
}

/// One (rounds, balls won) pair while detailing a jackpot event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitEntry {
    pub rounds: u32,
    pub balls: u32,
}

/// Transient fields for the row being entered. Cleared when a fresh row is
/// opened and when a row is confirmed or cancelled; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowDraft {
    /// Balls granted by loan presses during this row
    pub loaned_balls: u32,
    /// Remaining-ball count the player entered
    pub remaining_balls: u32,
    pub start_spin: u32,
    pub end_spin: u32,
    /// Folded jackpot aggregates from the hit-dist screen
    pub hit_rounds: u32,
    pub hit_payout: u32,
    /// Unrounded until row confirmation
    pub hit_per_round: f64,
    /// When set, confirmation overwrites this record instead of appending
    pub edit_index: Option<usize>,
}

/// Aggregate handed back by [`Session::end_session`], one per completed
/// session; this is what lands in the history ledger.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub date: String,
    pub shop_name: String,
    pub table_number: u32,
    pub rate: Rate,
    pub started_at: String,
    pub ended_at: String,
    pub duration_min: u32,
    pub row_count: u32,
    pub total_invest: u32,
    pub total_used_balls: u32,
    pub total_spins: u32,
    pub avg_spin_rate: f64,
    pub final_balls: u32,
}

/// User-visible rejections. These block the transition and get rendered as
/// warnings; the session state is untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    EmptyShopName,
    InvalidDeposit(u32),
    InsufficientBalance { have: u32, need: u32 },
    EmptyHitEntry,
    BadEditIndex(usize),
    InvalidTransition { action: &'static str, page: Page },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::EmptyShopName => write!(f, "Shop name is required to start a session"),
            SessionError::InvalidDeposit(v) => {
                write!(f, "Deposits must be one of 500/1000/5000/10000 yen (got {})", v)
            }
            SessionError::InsufficientBalance { have, need } => {
                write!(f, "Loan needs ¥{} but only ¥{} is loanable", need, have)
            }
            SessionError::EmptyHitEntry => {
                write!(f, "Enter a round count or a payout before adding a hit")
            }
            SessionError::BadEditIndex(i) => write!(f, "No record at index {}", i),
            SessionError::InvalidTransition { action, page } => {
                write!(f, "'{}' is not available on the {} screen", action, page)
            }
        }
    }
}

impl std::error::Error for SessionError {}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Every mutating interaction, as one tagged enum so the HTTP layer can
/// deserialize a form post straight into a transition.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Start {
        shop_name: String,
        table_number: u32,
        rate: Rate,
        #[serde(default)]
        opening_balls: u32,
    },
    AddFunds { amount: u32 },
    BeginRow {
        #[serde(default)]
        edit_index: Option<usize>,
    },
    Loan,
    SetRemaining { balls: u32 },
    SetSpins { start: u32, end: u32 },
    BeginHits,
    AddHit { rounds: u32, balls: u32 },
    ConfirmHits,
    ConfirmRow,
    CancelRow,
    EndSession,
}

/// The whole application state: current screen, session fields, the ordered
/// record list, and the per-row transients.
#[derive(Debug, Clone)]
pub struct Session {
    pub page: Page,
    pub machine_info: MachineInfo,
    pub records: Vec<RowRecord>,
    pub is_active: bool,
    pub draft: RowDraft,
    pub hit_entries: Vec<HitEntry>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Fresh state at the setup screen
    pub fn new() -> Self {
        Self {
            page: Page::Select,
            machine_info: MachineInfo::default(),
            records: Vec::new(),
            is_active: false,
            draft: RowDraft::default(),
            hit_entries: Vec::new(),
        }
    }

    /// Dispatch an [`Action`] to the matching transition
    pub fn apply(&mut self, action: Action) -> Result<Option<SessionSummary>> {
        match action {
            Action::Start { shop_name, table_number, rate, opening_balls } => {
                self.start(&shop_name, table_number, rate, opening_balls)?
            }
            Action::AddFunds { amount } => self.add_funds(amount)?,
            Action::BeginRow { edit_index } => self.begin_row(edit_index)?,
            Action::Loan => self.loan()?,
            Action::SetRemaining { balls } => self.set_remaining(balls)?,
            Action::SetSpins { start, end } => self.set_spins(start, end)?,
            Action::BeginHits => self.begin_hits()?,
            Action::AddHit { rounds, balls } => self.add_hit(rounds, balls)?,
            Action::ConfirmHits => self.confirm_hits()?,
            Action::ConfirmRow => self.confirm_row()?,
            Action::CancelRow => self.cancel_row()?,
            Action::EndSession => return self.end_session().map(Some),
        }
        Ok(None)
    }

    fn expect_page(&self, page: Page, action: &'static str) -> Result<()> {
        if self.page == page {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition { action, page: self.page })
        }
    }

    // ========================================================================
    // Select screen
    // ========================================================================

    /// Start a session: validate identifiers, zero the balances, stamp the
    /// start time, and land on the dashboard.
    pub fn start(
        &mut self,
        shop_name: &str,
        table_number: u32,
        rate: Rate,
        opening_balls: u32,
    ) -> Result<()> {
        self.expect_page(Page::Select, "start")?;
        if shop_name.trim().is_empty() {
            return Err(SessionError::EmptyShopName);
        }

        self.machine_info = MachineInfo {
            shop_name: shop_name.trim().to_string(),
            table_number,
            rate,
            current_balls: opening_balls,
            total_invest: 0,
            loanable_yen: 0,
            start_time: clock_now(),
        };
        self.records.clear();
        self.draft = RowDraft::default();
        self.hit_entries.clear();
        self.is_active = true;
        self.page = Page::Main;
        Ok(())
    }

    // ========================================================================
    // Main screen
    // ========================================================================

    /// Add cash: bumps both the invested total and the loanable balance.
    /// Balls only change later, through the loan button.
    pub fn add_funds(&mut self, amount: u32) -> Result<()> {
        self.expect_page(Page::Main, "add_funds")?;
        if !DEPOSIT_DENOMINATIONS.contains(&amount) {
            return Err(SessionError::InvalidDeposit(amount));
        }
        self.machine_info.total_invest = self.machine_info.total_invest.saturating_add(amount);
        self.machine_info.loanable_yen = self.machine_info.loanable_yen.saturating_add(amount);
        Ok(())
    }

    /// Open the row form. A fresh entry clears the draft; an edit preloads
    /// the indexed record so its counters show up as defaults.
    pub fn begin_row(&mut self, edit_index: Option<usize>) -> Result<()> {
        self.expect_page(Page::Main, "begin_row")?;

        match edit_index {
            None => {
                self.draft = RowDraft {
                    remaining_balls: self.machine_info.current_balls,
                    ..RowDraft::default()
                };
            }
            Some(i) => {
                let record = self
                    .records
                    .get(i)
                    .ok_or(SessionError::BadEditIndex(i))?;
                self.draft = RowDraft {
                    remaining_balls: self.machine_info.current_balls,
                    start_spin: record.start_spin,
                    end_spin: record.end_spin,
                    hit_rounds: record.rounds,
                    hit_payout: record.gained_balls,
                    hit_per_round: record.payout_per_round,
                    loaned_balls: 0,
                    edit_index: Some(i),
                };
            }
        }
        self.page = Page::AddRow;
        Ok(())
    }

    /// Average spin rate across all recorded rows, in the session's unit
    pub fn avg_spin_rate(&self) -> f64 {
        let used = self.total_used_balls();
        let spins = self.total_spins();
        ledger::spin_rate(spins, used, self.machine_info.rate.rate_unit())
    }

    fn total_used_balls(&self) -> u32 {
        self.records
            .iter()
            .fold(0u32, |acc, r| acc.saturating_add(r.used_balls))
    }

    fn total_spins(&self) -> u32 {
        self.records
            .iter()
            .fold(0u32, |acc, r| acc.saturating_add(r.normal_spins))
    }

    /// Close out the session: everything is cleared and the wizard returns
    /// to setup. The returned summary is the caller's to persist.
    pub fn end_session(&mut self) -> Result<SessionSummary> {
        self.expect_page(Page::Main, "end_session")?;

        let info = &self.machine_info;
        let ended_at = clock_now();
        let summary = SessionSummary {
            date: chrono::Local::now().format("%Y-%m-%d").to_string(),
            shop_name: info.shop_name.clone(),
            table_number: info.table_number,
            rate: info.rate,
            started_at: info.start_time.clone(),
            ended_at: ended_at.clone(),
            duration_min: elapsed_minutes(&info.start_time, &ended_at),
            row_count: self.records.len() as u32,
            total_invest: info.total_invest,
            total_used_balls: self.total_used_balls(),
            total_spins: self.total_spins(),
            avg_spin_rate: ledger::round2(self.avg_spin_rate()),
            final_balls: info.current_balls,
        };

        self.records.clear();
        self.machine_info = MachineInfo::default();
        self.draft = RowDraft::default();
        self.hit_entries.clear();
        self.is_active = false;
        self.page = Page::Select;
        Ok(summary)
    }

    // ========================================================================
    // Add-row screen
    // ========================================================================

    /// Convert one loan unit of cash into balls for this row. Disabled when
    /// the loanable balance can't cover the rate's minimum unit.
    pub fn loan(&mut self) -> Result<()> {
        self.expect_page(Page::AddRow, "loan")?;
        let rate = self.machine_info.rate;
        let unit = rate.loan_unit_yen();
        if self.machine_info.loanable_yen < unit {
            return Err(SessionError::InsufficientBalance {
                have: self.machine_info.loanable_yen,
                need: unit,
            });
        }
        self.machine_info.loanable_yen -= unit;
        self.draft.loaned_balls = self.draft.loaned_balls.saturating_add(rate.loan_balls());
        Ok(())
    }

    pub fn set_remaining(&mut self, balls: u32) -> Result<()> {
        self.expect_page(Page::AddRow, "set_remaining")?;
        self.draft.remaining_balls = balls;
        Ok(())
    }

    pub fn set_spins(&mut self, start: u32, end: u32) -> Result<()> {
        self.expect_page(Page::AddRow, "set_spins")?;
        self.draft.start_spin = start;
        self.draft.end_spin = end;
        Ok(())
    }

    /// Open the jackpot detail screen with an empty sub-entry list
    pub fn begin_hits(&mut self) -> Result<()> {
        self.expect_page(Page::AddRow, "begin_hits")?;
        self.hit_entries.clear();
        self.page = Page::HitDist;
        Ok(())
    }

    /// Compute the pending record, append or overwrite in place, roll the
    /// ball count forward, and return to the dashboard.
    pub fn confirm_row(&mut self) -> Result<()> {
        self.expect_page(Page::AddRow, "confirm_row")?;

        let info = &self.machine_info;
        let draft = &self.draft;

        let used = ledger::used_balls(info.current_balls, draft.loaned_balls, draft.remaining_balls);
        let spins = ledger::normal_spins(draft.start_spin, draft.end_spin);
        let rate = ledger::spin_rate(spins, used, info.rate.rate_unit());

        let time = match draft.edit_index {
            // Edits keep the original stamp; the record's position is its identity
            Some(i) => self
                .records
                .get(i)
                .map(|r| r.time.clone())
                .ok_or(SessionError::BadEditIndex(i))?,
            None => clock_now(),
        };

        let record = RowRecord {
            time,
            used_balls: used,
            start_spin: draft.start_spin,
            end_spin: draft.end_spin,
            normal_spins: spins,
            spin_rate: ledger::round2(rate),
            gained_balls: draft.hit_payout,
            rounds: draft.hit_rounds,
            payout_per_round: ledger::round2(draft.hit_per_round),
        };

        match draft.edit_index {
            Some(i) => self.records[i] = record,
            None => self.records.push(record),
        }

        self.machine_info.current_balls = draft.remaining_balls.saturating_add(draft.hit_payout);
        self.draft = RowDraft::default();
        self.page = Page::Main;
        Ok(())
    }

    /// Discard the draft without touching the record list
    pub fn cancel_row(&mut self) -> Result<()> {
        self.expect_page(Page::AddRow, "cancel_row")?;
        self.draft = RowDraft::default();
        self.page = Page::Main;
        Ok(())
    }

    // ========================================================================
    // Hit-dist screen
    // ========================================================================

    /// Record one (rounds, balls) pair. An all-zero entry is a misclick.
    pub fn add_hit(&mut self, rounds: u32, balls: u32) -> Result<()> {
        self.expect_page(Page::HitDist, "add_hit")?;
        if rounds == 0 && balls == 0 {
            return Err(SessionError::EmptyHitEntry);
        }
        self.hit_entries.push(HitEntry { rounds, balls });
        Ok(())
    }

    /// Reduce the sub-entries to three scalars, fold them into the draft,
    /// and go back to the row form. Nothing is appended yet.
    pub fn confirm_hits(&mut self) -> Result<()> {
        self.expect_page(Page::HitDist, "confirm_hits")?;

        let total_rounds = self
            .hit_entries
            .iter()
            .fold(0u32, |acc, h| acc.saturating_add(h.rounds));
        let total_payout = self
            .hit_entries
            .iter()
            .fold(0u32, |acc, h| acc.saturating_add(h.balls));

        self.draft.hit_rounds = total_rounds;
        self.draft.hit_payout = total_payout;
        self.draft.hit_per_round = ledger::payout_per_round(total_payout, total_rounds);

        self.hit_entries.clear();
        self.page = Page::AddRow;
        Ok(())
    }
}

/// Current wall-clock time as HH:MM
fn clock_now() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}

/// Minutes between two HH:MM stamps. An end before the start means the
/// clock rolled past midnight, so a day is added back; sessions never run
/// 24 hours. Unparseable stamps count as zero elapsed.
fn elapsed_minutes(start: &str, end: &str) -> u32 {
    use chrono::NaiveTime;
    let parse = |s: &str| NaiveTime::parse_from_str(s, "%H:%M").ok();
    match (parse(start), parse(end)) {
        (Some(s), Some(e)) => {
            let mut delta = e.signed_duration_since(s).num_minutes();
            if delta < 0 {
                delta += 24 * 60;
            }
            delta as u32
        }
        _ => 0,
    }
}
