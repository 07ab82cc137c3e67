//! Fixed thresholds that turn numeric findings into advisory strings.
//!
//! | # | Condition | Text |
//! |---|---|---|
//! | 1 | bets < min_sample_bets | sample too small for reliable conclusions |
//! | 2 | sharpe > 1.5 | strong risk-adjusted performance |
//! | 3 | 1.0 < sharpe ≤ 1.5 | solid risk-adjusted performance |
//! | 4 | sharpe ≤ 1.0 | weak risk-adjusted performance: review risk management |
//! | 5 | total_roi > 15 | exceptional return on stake |
//! | 6 | 0 < total_roi ≤ 15 | positive return on stake |
//! | 7 | total_roi ≤ 0 | negative return on stake: revisit selection criteria |
//! | 8 | win_rate > 65 | high hit rate |
//! | 9 | win_rate < 45 | low hit rate: consider raising min_confidence |
//! | 10 | profit_factor < 1 | losses outweigh wins |
//! | 11 | max_drawdown_pct > 20 | deep drawdown: reduce stake size |
//! | 12 | probability_of_ruin > 0.10 | material risk of ruin: reduce stake size |
//! | 13 | calibration gap < −0.05 | predictions are over-confident |
//! | 14 | calibration gap > 0.05 | predictions are under-confident |
//! | 15 | bootstrap stability < 70 | unstable bootstrap: increase bootstrap_samples |
//! | 16 | profitable league share < 50 | profit concentrated in few leagues: focus selection |
//!
//! Rules are evaluated in table order and every match emits its text. A rule
//! whose metric is `None` never fires.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Findings {
    pub bets: usize,
    pub min_sample_bets: usize,
    pub sharpe: f64,
    pub total_roi: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub max_drawdown_pct: f64,
    pub probability_of_ruin: Option<f64>,
    pub calibration_gap: Option<f64>,
    pub bootstrap_stability: Option<f64>,
    pub profitable_league_share: Option<f64>,
}

pub struct Rule {
    pub text: &'static str,
    pub applies: fn(&Findings) -> bool,
}

pub const RULES: [Rule; 16] = [
    Rule {
        text: "sample too small for reliable conclusions",
        applies: |f| f.bets < f.min_sample_bets,
    },
    Rule {
        text: "strong risk-adjusted performance",
        applies: |f| f.sharpe > 1.5,
    },
    Rule {
        text: "solid risk-adjusted performance",
        applies: |f| f.sharpe > 1.0 && f.sharpe <= 1.5,
    },
    Rule {
        text: "weak risk-adjusted performance: review risk management",
        applies: |f| f.sharpe <= 1.0,
    },
    Rule {
        text: "exceptional return on stake",
        applies: |f| f.total_roi > 15.0,
    },
    Rule {
        text: "positive return on stake",
        applies: |f| f.total_roi > 0.0 && f.total_roi <= 15.0,
    },
    Rule {
        text: "negative return on stake: revisit selection criteria",
        applies: |f| f.total_roi <= 0.0,
    },
    Rule {
        text: "high hit rate",
        applies: |f| f.win_rate > 65.0,
    },
    Rule {
        text: "low hit rate: consider raising min_confidence",
        applies: |f| f.win_rate < 45.0,
    },
    Rule {
        text: "losses outweigh wins",
        applies: |f| f.profit_factor < 1.0,
    },
    Rule {
        text: "deep drawdown: reduce stake size",
        applies: |f| f.max_drawdown_pct > 20.0,
    },
    Rule {
        text: "material risk of ruin: reduce stake size",
        applies: |f| f.probability_of_ruin.is_some_and(|p| p > 0.10),
    },
    Rule {
        text: "predictions are over-confident",
        applies: |f| f.calibration_gap.is_some_and(|g| g < -0.05),
    },
    Rule {
        text: "predictions are under-confident",
        applies: |f| f.calibration_gap.is_some_and(|g| g > 0.05),
    },
    Rule {
        text: "unstable bootstrap: increase bootstrap_samples",
        applies: |f| f.bootstrap_stability.is_some_and(|s| s < 70.0),
    },
    Rule {
        text: "profit concentrated in few leagues: focus selection",
        applies: |f| f.profitable_league_share.is_some_and(|s| s < 50.0),
    },
];

pub fn recommend(findings: &Findings) -> Vec<String> {
    RULES
        .iter()
        .filter(|rule| (rule.applies)(findings))
        .map(|rule| rule.text.to_string())
        .collect()
}
