use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;

/// A label a prediction can back. 1X2 picks and Over/Under picks share the
/// type so a bet record can carry either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pick {
    Home,
    Draw,
    Away,
    Over,
    Under,
}

impl Pick {
    pub fn label(self) -> &'static str {
        match self {
            Pick::Home => "1",
            Pick::Draw => "X",
            Pick::Away => "2",
            Pick::Over => "Over",
            Pick::Under => "Under",
        }
    }

    pub fn parse_1x2(raw: &str) -> Option<Self> {
        match raw.trim() {
            "1" => Some(Pick::Home),
            "X" | "x" => Some(Pick::Draw),
            "2" => Some(Pick::Away),
            _ => None,
        }
    }

    pub fn parse_ou(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Over" => Some(Pick::Over),
            "Under" => Some(Pick::Under),
            _ => None,
        }
    }
}

impl fmt::Display for Pick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bet types in admission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BetType {
    MatchResult,
    OverUnder,
}

impl BetType {
    pub const ALL: [BetType; 2] = [BetType::MatchResult, BetType::OverUnder];

    pub fn label(self) -> &'static str {
        match self {
            BetType::MatchResult => "1X2",
            BetType::OverUnder => "Over/Under",
        }
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BetResult {
    Win,
    Loss,
    // Never produced while odds of exactly 1.0 are rejected at admission.
    Push,
}

impl BetResult {
    pub fn label(self) -> &'static str {
        match self {
            BetResult::Win => "WIN",
            BetResult::Loss => "LOSS",
            BetResult::Push => "PUSH",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub fixture_id: i64,
    pub date: NaiveDate,
    pub league_name: String,
    pub home_team: String,
    pub away_team: String,
    pub score: Option<Score>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

impl Score {
    pub fn total_goals(self) -> u64 {
        u64::from(self.home) + u64::from(self.away)
    }
}

impl MatchRecord {
    pub fn is_settled(&self) -> bool {
        self.score.is_some()
    }

    /// Realized label for a bet type, `None` while the match is unsettled.
    pub fn realized(&self, bet_type: BetType, ou_threshold: f64) -> Option<Pick> {
        let score = self.score?;
        Some(match bet_type {
            BetType::MatchResult => classify_outcome(score.home, score.away),
            BetType::OverUnder => classify_total(score.total_goals(), ou_threshold),
        })
    }
}

pub fn classify_outcome(home_goals: u32, away_goals: u32) -> Pick {
    match home_goals.cmp(&away_goals) {
        Ordering::Greater => Pick::Home,
        Ordering::Less => Pick::Away,
        Ordering::Equal => Pick::Draw,
    }
}

pub fn classify_total(total_goals: u64, threshold: f64) -> Pick {
    if total_goals as f64 > threshold {
        Pick::Over
    } else {
        Pick::Under
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub fixture_id: i64,
    pub date: NaiveDate,
    pub confidence: f64,
    pub prediction_1x2: Pick,
    pub prediction_ou: Pick,
}

impl PredictionRecord {
    pub fn pick(&self, bet_type: BetType) -> Pick {
        match bet_type {
            BetType::MatchResult => self.prediction_1x2,
            BetType::OverUnder => self.prediction_ou,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OddsRecord {
    pub fixture_id: i64,
    pub odds_1x2: f64,
    pub odds_ou: f64,
}

impl OddsRecord {
    pub fn price(&self, bet_type: BetType) -> f64 {
        match bet_type {
            BetType::MatchResult => self.odds_1x2,
            BetType::OverUnder => self.odds_ou,
        }
    }
}

/// One settled bet. Created once by the simulator and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct BetRecord {
    pub date: NaiveDate,
    pub fixture_id: i64,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub bet_type: BetType,
    pub prediction: Pick,
    pub odds: f64,
    pub stake: f64,
    pub confidence: f64,
    pub actual_result: Pick,
    pub bet_result: BetResult,
    pub profit_loss: f64,
    pub roi: f64,
}

impl BetRecord {
    pub fn is_win(&self) -> bool {
        self.bet_result == BetResult::Win
    }
}

#[cfg(test)]
mod tests {
    use super::{BetType, MatchRecord, Pick, Score, classify_outcome, classify_total};
    use chrono::NaiveDate;

    #[test]
    fn outcome_labels_follow_score_comparison() {
        assert_eq!(classify_outcome(2, 0), Pick::Home);
        assert_eq!(classify_outcome(1, 1), Pick::Draw);
        assert_eq!(classify_outcome(0, 3), Pick::Away);
    }

    #[test]
    fn totals_compare_strictly_against_threshold() {
        assert_eq!(classify_total(3, 2.5), Pick::Over);
        assert_eq!(classify_total(2, 2.5), Pick::Under);
        assert_eq!(classify_total(3, 3.0), Pick::Under);
    }

    #[test]
    fn unsettled_match_has_no_realized_label() {
        let mut m = MatchRecord {
            fixture_id: 1,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            league_name: "L".to_string(),
            home_team: "H".to_string(),
            away_team: "A".to_string(),
            score: None,
        };
        assert_eq!(m.realized(BetType::MatchResult, 2.5), None);
        m.score = Some(Score { home: 1, away: 2 });
        assert_eq!(m.realized(BetType::MatchResult, 2.5), Some(Pick::Away));
        assert_eq!(m.realized(BetType::OverUnder, 2.5), Some(Pick::Over));
    }

    #[test]
    fn extreme_scores_total_without_overflow() {
        let score = Score {
            home: u32::MAX,
            away: 1,
        };
        assert_eq!(score.total_goals(), u64::from(u32::MAX) + 1);
        assert_eq!(classify_total(score.total_goals(), 2.5), Pick::Over);
    }

    #[test]
    fn pick_parsers_reject_cross_market_labels() {
        assert_eq!(Pick::parse_1x2("X"), Some(Pick::Draw));
        assert_eq!(Pick::parse_1x2("Over"), None);
        assert_eq!(Pick::parse_ou("Under"), Some(Pick::Under));
        assert_eq!(Pick::parse_ou("1"), None);
    }
}
