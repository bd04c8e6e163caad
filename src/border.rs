//! Border-line and expected-value calculator
//!
//! Standalone formula evaluator for machine specs: given the hit
//! probabilities, the RUSH continuation rate, the per-round ball count, and
//! a user-built round distribution, it computes the expected net balls per
//! jackpot cycle and the break-even spin rate (the "border line"). It never
//! touches the session ledger.
//!
//! Distribution percentages that do not sum to 100 only produce a warning;
//! the computation proceeds on the raw values.

use serde::{Deserialize, Serialize};

/// Fixed blend weight of the non-entry path (initial hit without RUSH).
/// Product constant observed on the target machine family; paired with
/// [`ENTRY_WEIGHT`], not derived from the RUSH entry rate.
pub const NON_ENTRY_WEIGHT: f64 = 0.41;

/// Fixed blend weight of the entry path (initial hit into RUSH)
pub const ENTRY_WEIGHT: f64 = 0.59;

/// Where the machine goes after a jackpot of this round count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextState {
    /// Stays in the heightened-probability loop (確変)
    Rush,
    /// Drops to time-shortened normal play (時短)
    Normal,
}

/// One (round count, probability, next state) line of a distribution.
/// Keyed by a counter assigned at creation; deletion is by id, not position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundEntry {
    pub id: u64,
    pub rounds: u32,
    /// Percentage points, user-entered (e.g. 40.0)
    pub percent: f64,
    pub next: NextState,
}

/// A user-built round/probability table. Percentages should total 100;
/// a mismatch warns but never blocks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundDistribution {
    entries: Vec<RoundEntry>,
    #[serde(default)]
    next_id: u64,
}

impl RoundDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry and return its key
    pub fn add(&mut self, rounds: u32, percent: f64, next: NextState) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.push(RoundEntry { id, rounds, percent, next });
        id
    }

    /// Remove by key lookup; false when no entry has that id
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn entries(&self) -> &[RoundEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the entered percentages
    pub fn total_percent(&self) -> f64 {
        self.entries.iter().map(|e| e.percent).sum()
    }

    /// Warning when the table does not total 100%
    pub fn check(&self, label: &str) -> Option<String> {
        let total = self.total_percent();
        if (total - 100.0).abs() > 1e-9 {
            Some(format!(
                "{} distribution totals {:.1}% (expected 100%); computing on raw values",
                label, total
            ))
        } else {
            None
        }
    }

    /// Expected net balls per jackpot under this distribution.
    ///
    /// `round_balls` is the payout of one round (count x attacker payout),
    /// `support_factor` the fraction kept after electric-support losses.
    /// When `rush_only` is set, only entries that continue the loop count
    /// (the continuation-state expectation).
    fn expected_balls(&self, round_balls: f64, support_factor: f64, rush_only: bool) -> f64 {
        self.entries
            .iter()
            .filter(|e| !rush_only || e.next == NextState::Rush)
            .map(|e| round_balls * e.rounds as f64 * support_factor * (e.percent / 100.0))
            .sum()
    }
}

/// Machine probability parameters plus the two round tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSpec {
    #[serde(default)]
    pub name: String,
    /// Hit probability denominator in normal play (e.g. 319.7 for 1/319.7)
    pub prob_normal: f64,
    /// Hit probability denominator inside RUSH
    pub prob_rush: f64,
    /// RUSH entry rate on an initial hit, percent
    pub rush_entry_pct: f64,
    /// RUSH continuation rate, percent
    pub rush_continue_pct: f64,
    /// Attacker count per round
    pub count_num: u32,
    /// Balls paid per attacker hit
    pub attacker_balls: u32,
    /// Yen per ball at the exchange counter (4.0 at par)
    pub exchange_rate: f64,
    /// Electric-support ball deduction, percent
    pub support_deduction_pct: f64,
    /// Round table for initial hits (normal state)
    pub normal_dist: RoundDistribution,
    /// Round table inside RUSH
    pub rush_dist: RoundDistribution,
}

/// Derived expected-value scalars
#[derive(Debug, Clone, Serialize)]
pub struct BorderResult {
    /// 1 / (1 - continuation), the mean RUSH chain length
    pub avg_chain: f64,
    /// Expected net balls of an initial hit that misses RUSH
    pub normal_expectation: f64,
    /// Expected net balls of one continuing RUSH hit
    pub rush_expectation: f64,
    /// Expected net balls of a whole RUSH entry (chain x per-hit)
    pub rush_cycle_expectation: f64,
    /// Expected net balls of an initial hit that enters RUSH
    pub entry_expectation: f64,
    /// Fixed-weight blend of the two initial-hit paths
    pub blended_expectation: f64,
    /// Balls bought per thousand yen at this exchange rate
    pub thousand_yen_balls: f64,
    /// Spins per thousand yen needed to break even
    pub border_line: f64,
}

impl MachineSpec {
    /// Evaluate the spec. Non-100% tables come back as warnings alongside
    /// the result, never as failures.
    pub fn compute(&self) -> (BorderResult, Vec<String>) {
        let mut warnings = Vec::new();
        if let Some(w) = self.normal_dist.check("normal") {
            warnings.push(w);
        }
        if let Some(w) = self.rush_dist.check("rush") {
            warnings.push(w);
        }

        let round_balls = (self.count_num * self.attacker_balls) as f64;
        let support_factor = (100.0 - self.support_deduction_pct) / 100.0;

        let avg_chain = {
            let denom = 1.0 - self.rush_continue_pct / 100.0;
            if denom <= 0.0 { 0.0 } else { 1.0 / denom }
        };

        let normal_expectation = self.normal_dist.expected_balls(round_balls, support_factor, false);
        let rush_expectation = self.rush_dist.expected_balls(round_balls, support_factor, true);
        let rush_cycle_expectation = rush_expectation * avg_chain;
        let entry_expectation = normal_expectation + rush_cycle_expectation;
        let blended_expectation =
            normal_expectation * NON_ENTRY_WEIGHT + entry_expectation * ENTRY_WEIGHT;

        let thousand_yen_balls = if self.exchange_rate > 0.0 {
            1000.0 / self.exchange_rate
        } else {
            0.0
        };

        let border_line = if blended_expectation > 0.0 {
            self.prob_normal * thousand_yen_balls / blended_expectation
        } else {
            0.0
        };

        (
            BorderResult {
                avg_chain,
                normal_expectation,
                rush_expectation,
                rush_cycle_expectation,
                entry_expectation,
                blended_expectation,
                thousand_yen_balls,
                border_line,
            },
            warnings,
        )
    }
}
