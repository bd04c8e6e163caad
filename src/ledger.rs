//! Ledger arithmetic for play sessions
//!
//! Pure functions over user-entered counts. Everything here is deliberately
//! total: negative deltas floor to zero and divisions are zero-guarded, so a
//! fat-fingered counter reading produces a harmless 0 instead of an error.
//!
//! The exchange rate drives two constants:
//!
//! | Rate  | Spin-rate unit | Loan unit | Balls per loan |
//! |-------|----------------|-----------|----------------|
//! | 4-yen | 250            | ¥500      | 125            |
//! | 1-yen | 1000           | ¥200      | 200            |
//!
//! Spin rates are normalized "per 250 balls" (4-yen) or "per 1000 balls"
//! (1-yen), the convention hall-goers quote as 回転率.

use serde::{Deserialize, Serialize};

/// Ball-to-yen exchange convention for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rate {
    /// 4 yen per ball (standard pachinko)
    FourYen,
    /// 1 yen per ball (low-stakes corner)
    OneYen,
}

impl Rate {
    /// Normalization basis for spin rates (balls per quoted unit)
    pub fn rate_unit(self) -> u32 {
        match self {
            Rate::FourYen => 250,
            Rate::OneYen => 1000,
        }
    }

    /// Minimum cash converted per loan press (yen)
    pub fn loan_unit_yen(self) -> u32 {
        match self {
            Rate::FourYen => 500,
            Rate::OneYen => 200,
        }
    }

    /// Balls granted per loan press
    pub fn loan_balls(self) -> u32 {
        match self {
            Rate::FourYen => 125,
            Rate::OneYen => 200,
        }
    }
}

impl std::fmt::Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rate::FourYen => write!(f, "4yen"),
            Rate::OneYen => write!(f, "1yen"),
        }
    }
}

/// Balls consumed during a row: the pool at row start (prior running total
/// plus anything loaned this row) minus the remaining count the player
/// entered, floored at zero. The pool itself saturates rather than wraps.
pub fn used_balls(start_of_row: u32, loaned_this_row: u32, entered_remaining: u32) -> u32 {
    start_of_row
        .saturating_add(loaned_this_row)
        .saturating_sub(entered_remaining)
}

/// Spins made during a row, from the machine's spin counter readings.
/// End < start (counter reset, typo) floors to zero.
pub fn normal_spins(start_counter: u32, end_counter: u32) -> u32 {
    end_counter.saturating_sub(start_counter)
}

/// Spins per `rate_unit` balls spent. Zero when no balls were used.
pub fn spin_rate(normal_spins: u32, used_balls: u32, rate_unit: u32) -> f64 {
    if used_balls == 0 {
        return 0.0;
    }
    normal_spins as f64 / used_balls as f64 * rate_unit as f64
}

/// Average payout per jackpot round. Zero when no rounds were recorded.
pub fn payout_per_round(total_payout: u32, total_rounds: u32) -> f64 {
    if total_rounds == 0 {
        return 0.0;
    }
    total_payout as f64 / total_rounds as f64
}

/// Presentation rounding to two decimals. Applied exactly once, at row
/// confirmation; intermediate math stays unrounded.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // RATE TABLE TESTS
    // ==========================================================================

    #[test]
    fn test_rate_units() {
        assert_eq!(Rate::FourYen.rate_unit(), 250);
        assert_eq!(Rate::OneYen.rate_unit(), 1000);
    }

    #[test]
    fn test_loan_table() {
        assert_eq!(Rate::FourYen.loan_unit_yen(), 500);
        assert_eq!(Rate::FourYen.loan_balls(), 125);
        assert_eq!(Rate::OneYen.loan_unit_yen(), 200);
        assert_eq!(Rate::OneYen.loan_balls(), 200);
    }

    #[test]
    fn test_rate_serde_roundtrip() {
        let json = serde_json::to_string(&Rate::FourYen).unwrap();
        assert_eq!(json, "\"four_yen\"");
        let back: Rate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Rate::FourYen);
    }

    // ==========================================================================
    // USED BALLS TESTS
    // ==========================================================================

    #[test]
    fn test_used_balls_simple_subtraction() {
        // No loan: a - b for a >= b
        assert_eq!(used_balls(1000, 0, 800), 200);
        assert_eq!(used_balls(50, 0, 50), 0);
    }

    #[test]
    fn test_used_balls_floors_at_zero() {
        // Remaining larger than the pool (typo or miscount) floors to 0
        assert_eq!(used_balls(100, 0, 300), 0);
        assert_eq!(used_balls(0, 0, 1), 0);
    }

    #[test]
    fn test_used_balls_includes_same_row_loans() {
        // Mid-row loans join the row's available-balls pool
        assert_eq!(used_balls(1000, 125, 800), 325);
    }

    #[test]
    fn test_used_balls_saturates_at_extremes() {
        // Counts near u32::MAX saturate; no wrap, no panic
        assert_eq!(used_balls(u32::MAX, 125, 0), u32::MAX);
        assert_eq!(used_balls(u32::MAX, u32::MAX, 0), u32::MAX);
        assert_eq!(used_balls(u32::MAX, 125, u32::MAX), 0);
    }

    // ==========================================================================
    // SPIN TESTS
    // ==========================================================================

    #[test]
    fn test_normal_spins() {
        assert_eq!(normal_spins(1000, 1500), 500);
        assert_eq!(normal_spins(1500, 1000), 0);
        assert_eq!(normal_spins(0, 0), 0);
    }

    #[test]
    fn test_spin_rate_zero_guards() {
        assert_eq!(spin_rate(0, 325, 250), 0.0);
        assert_eq!(spin_rate(500, 0, 250), 0.0);
        assert_eq!(spin_rate(0, 0, 1000), 0.0);
    }

    #[test]
    fn test_spin_rate_worked_example() {
        // 4-yen session: 500 spins on 325 balls -> 384.62 per 250 balls
        let rate = spin_rate(500, 325, 250);
        assert!((round2(rate) - 384.62).abs() < 1e-9);
    }

    #[test]
    fn test_spin_rate_one_yen_unit() {
        // 1-yen rate quotes per 1000 balls
        let rate = spin_rate(200, 1000, Rate::OneYen.rate_unit());
        assert_eq!(rate, 200.0);
    }

    // ==========================================================================
    // PAYOUT TESTS
    // ==========================================================================

    #[test]
    fn test_payout_per_round() {
        // Sub-entries (3R, 300) + (2R, 150) -> 450 balls over 5 rounds
        assert_eq!(payout_per_round(450, 5), 90.0);
        assert_eq!(payout_per_round(0, 0), 0.0);
        assert_eq!(payout_per_round(100, 0), 0.0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(384.6153846), 384.62);
        assert_eq!(round2(90.0), 90.0);
        assert_eq!(round2(0.005), 0.01);
    }
}
