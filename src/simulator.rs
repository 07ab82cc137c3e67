use std::collections::HashMap;

use crate::config::{BacktestConfig, StakeStrategy};
use crate::records::{
    BetRecord, BetResult, BetType, MatchRecord, OddsRecord, PredictionRecord,
};

/// Largest share of current capital a Kelly-sized bet may take.
pub const KELLY_CAP: f64 = 0.05;

/// Why a candidate bet was not admitted. Checked in declaration order; the
/// first failing check is the one recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    OutOfBand,
    MissingMatch,
    UnsettledMatch,
    OutsideWindow,
    MissingOdds,
    NoMarket,
    KellyNonPositive,
    NonPositiveStake,
}

impl SkipReason {
    pub const ALL: [SkipReason; 8] = [
        SkipReason::OutOfBand,
        SkipReason::MissingMatch,
        SkipReason::UnsettledMatch,
        SkipReason::OutsideWindow,
        SkipReason::MissingOdds,
        SkipReason::NoMarket,
        SkipReason::KellyNonPositive,
        SkipReason::NonPositiveStake,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SkipReason::OutOfBand => "out_of_band",
            SkipReason::MissingMatch => "missing_match",
            SkipReason::UnsettledMatch => "unsettled_match",
            SkipReason::OutsideWindow => "outside_window",
            SkipReason::MissingOdds => "missing_odds",
            SkipReason::NoMarket => "no_market",
            SkipReason::KellyNonPositive => "kelly_non_positive",
            SkipReason::NonPositiveStake => "non_positive_stake",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipTally {
    counts: [usize; SkipReason::ALL.len()],
}

impl SkipTally {
    pub fn record(&mut self, reason: SkipReason) {
        self.counts[reason.index()] += 1;
    }

    pub fn get(&self, reason: SkipReason) -> usize {
        self.counts[reason.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SkipReason, usize)> + '_ {
        SkipReason::ALL.iter().map(|r| (*r, self.get(*r)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub ledger: Vec<BetRecord>,
    pub skips: SkipTally,
    pub predictions: usize,
    pub candidates: usize,
    pub initial_capital: f64,
    pub final_capital: f64,
}

/// `(b·p − q) / b` with `b = odds − 1`, unclamped.
pub fn kelly_fraction(odds: f64, confidence: f64) -> f64 {
    let b = odds - 1.0;
    if b <= 0.0 {
        return 0.0;
    }
    (b * confidence - (1.0 - confidence)) / b
}

pub fn settle(stake: f64, odds: f64, result: BetResult) -> f64 {
    match result {
        BetResult::Win => stake * (odds - 1.0),
        BetResult::Loss => -stake,
        BetResult::Push => 0.0,
    }
}

/// Walks predictions in `(date, fixture_id)` order and builds the ledger.
/// Stake sizing under `percentage` and `kelly` depends on every prior bet.
pub fn simulate(
    matches: &[MatchRecord],
    predictions: &[PredictionRecord],
    odds: &[OddsRecord],
    config: &BacktestConfig,
) -> Simulation {
    let match_index: HashMap<i64, &MatchRecord> =
        matches.iter().map(|m| (m.fixture_id, m)).collect();
    let mut odds_index: HashMap<i64, &OddsRecord> = HashMap::with_capacity(odds.len());
    for o in odds {
        odds_index.entry(o.fixture_id).or_insert(o);
    }

    let mut ordered: Vec<&PredictionRecord> = predictions.iter().collect();
    ordered.sort_by_key(|p| (p.date, p.fixture_id));

    let fixed_stake = config.initial_capital * config.stake_percentage;
    let mut capital = config.initial_capital;
    let mut ledger = Vec::new();
    let mut skips = SkipTally::default();

    for prediction in &ordered {
        for bet_type in BetType::ALL {
            let admitted = admit(
                prediction,
                bet_type,
                &match_index,
                &odds_index,
                config,
                capital,
                fixed_stake,
            );
            match admitted {
                Ok(bet) => {
                    capital += bet.profit_loss;
                    ledger.push(bet);
                }
                Err(reason) => skips.record(reason),
            }
        }
    }

    Simulation {
        ledger,
        skips,
        predictions: predictions.len(),
        candidates: predictions.len() * BetType::ALL.len(),
        initial_capital: config.initial_capital,
        final_capital: capital,
    }
}

fn admit(
    prediction: &PredictionRecord,
    bet_type: BetType,
    match_index: &HashMap<i64, &MatchRecord>,
    odds_index: &HashMap<i64, &OddsRecord>,
    config: &BacktestConfig,
    capital: f64,
    fixed_stake: f64,
) -> Result<BetRecord, SkipReason> {
    let confidence = prediction.confidence;
    if confidence < config.min_confidence || confidence > config.max_confidence {
        return Err(SkipReason::OutOfBand);
    }
    let m = match_index
        .get(&prediction.fixture_id)
        .ok_or(SkipReason::MissingMatch)?;
    let actual = m
        .realized(bet_type, config.ou_threshold)
        .ok_or(SkipReason::UnsettledMatch)?;
    if let Some(window) = config.date_window
        && !window.contains(m.date)
    {
        return Err(SkipReason::OutsideWindow);
    }
    let price = odds_index
        .get(&prediction.fixture_id)
        .map(|o| o.price(bet_type))
        .ok_or(SkipReason::MissingOdds)?;
    if price <= 1.0 {
        return Err(SkipReason::NoMarket);
    }

    let stake = match config.stake_strategy {
        StakeStrategy::Fixed => fixed_stake,
        StakeStrategy::Percentage => capital * config.stake_percentage,
        StakeStrategy::Kelly => {
            let f = kelly_fraction(price, confidence).clamp(0.0, KELLY_CAP);
            if f <= 0.0 {
                return Err(SkipReason::KellyNonPositive);
            }
            capital * f
        }
    };
    if !(stake.is_finite() && stake > 0.0) {
        return Err(SkipReason::NonPositiveStake);
    }

    let pick = prediction.pick(bet_type);
    let bet_result = if pick == actual {
        BetResult::Win
    } else {
        BetResult::Loss
    };
    let profit_loss = settle(stake, price, bet_result);

    Ok(BetRecord {
        date: prediction.date,
        fixture_id: prediction.fixture_id,
        league: m.league_name.clone(),
        home_team: m.home_team.clone(),
        away_team: m.away_team.clone(),
        bet_type,
        prediction: pick,
        odds: price,
        stake,
        confidence,
        actual_result: actual,
        bet_result,
        profit_loss,
        roi: 100.0 * profit_loss / stake,
    })
}

#[cfg(test)]
mod tests {
    use super::{KELLY_CAP, SkipReason, SkipTally, kelly_fraction, simulate};
    use crate::config::{BacktestConfig, DateWindow, StakeStrategy};
    use crate::records::{MatchRecord, OddsRecord, Pick, PredictionRecord, Score};
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn fixture(id: i64, d: u32, score: Option<(u32, u32)>) -> MatchRecord {
        MatchRecord {
            fixture_id: id,
            date: day(d),
            league_name: "L".to_string(),
            home_team: format!("H{id}"),
            away_team: format!("A{id}"),
            score: score.map(|(home, away)| Score { home, away }),
        }
    }

    fn prediction(id: i64, d: u32, confidence: f64) -> PredictionRecord {
        PredictionRecord {
            fixture_id: id,
            date: day(d),
            confidence,
            prediction_1x2: Pick::Home,
            prediction_ou: Pick::Over,
        }
    }

    fn odds(id: i64, odds_1x2: f64, odds_ou: f64) -> OddsRecord {
        OddsRecord {
            fixture_id: id,
            odds_1x2,
            odds_ou,
        }
    }

    #[test]
    fn kelly_fraction_matches_formula() {
        assert!((kelly_fraction(2.0, 0.4) + 0.2).abs() < 1e-12);
        assert!((kelly_fraction(3.0, 0.5) - 0.25).abs() < 1e-12);
        assert!(kelly_fraction(3.0, 0.5).clamp(0.0, KELLY_CAP) == KELLY_CAP);
    }

    #[test]
    fn each_candidate_records_one_reason() {
        let matches = vec![
            fixture(1, 1, Some((2, 1))),
            fixture(2, 2, None),
            fixture(3, 20, Some((0, 0))),
        ];
        let predictions = vec![
            prediction(1, 1, 0.7),
            prediction(2, 2, 0.7),
            prediction(3, 3, 0.7),
            prediction(4, 4, 0.7),
            prediction(1, 5, 0.3),
        ];
        let cfg = BacktestConfig {
            date_window: Some(DateWindow {
                start: day(1),
                end: day(10),
            }),
            ..BacktestConfig::default()
        };
        let sim = simulate(&matches, &predictions, &[odds(1, 2.0, 1.0)], &cfg);

        assert_eq!(sim.ledger.len(), 1);
        assert_eq!(sim.skips.get(SkipReason::NoMarket), 1);
        assert_eq!(sim.skips.get(SkipReason::UnsettledMatch), 2);
        assert_eq!(sim.skips.get(SkipReason::OutsideWindow), 2);
        assert_eq!(sim.skips.get(SkipReason::MissingMatch), 2);
        assert_eq!(sim.skips.get(SkipReason::OutOfBand), 2);
        assert_eq!(sim.candidates, sim.ledger.len() + sim.skips.total());
    }

    #[test]
    fn percentage_stakes_compound() {
        let matches = vec![fixture(1, 1, Some((1, 0))), fixture(2, 2, Some((1, 0)))];
        let predictions = vec![prediction(2, 2, 0.7), prediction(1, 1, 0.7)];
        let cfg = BacktestConfig {
            initial_capital: 1000.0,
            stake_strategy: StakeStrategy::Percentage,
            stake_percentage: 0.1,
            ..BacktestConfig::default()
        };
        let sim = simulate(
            &matches,
            &predictions,
            &[odds(1, 2.0, 1.0), odds(2, 2.0, 1.0)],
            &cfg,
        );
        // Fixture 1 is dated first, so it is staked first.
        assert_eq!(sim.ledger[0].fixture_id, 1);
        assert!((sim.ledger[0].stake - 100.0).abs() < 1e-9);
        assert!((sim.ledger[1].stake - 110.0).abs() < 1e-9);
        assert!((sim.final_capital - 1210.0).abs() < 1e-9);
    }

    #[test]
    fn kelly_stakes_follow_running_capital() {
        let matches = vec![fixture(1, 1, Some((1, 0))), fixture(2, 2, Some((0, 1)))];
        let predictions = vec![prediction(1, 1, 0.52), prediction(2, 2, 0.52)];
        let cfg = BacktestConfig {
            initial_capital: 1000.0,
            stake_strategy: StakeStrategy::Kelly,
            min_confidence: 0.5,
            ..BacktestConfig::default()
        };
        let sim = simulate(
            &matches,
            &predictions,
            &[odds(1, 2.0, 1.0), odds(2, 3.0, 1.0)],
            &cfg,
        );

        assert_eq!(sim.ledger.len(), 2);
        assert_eq!(sim.skips.get(SkipReason::NoMarket), 2);
        // f = (1 * 0.52 - 0.48) / 1 = 0.04, under the cap.
        let first = &sim.ledger[0];
        assert!((first.stake - 40.0).abs() < 1e-9);
        assert!((first.profit_loss - 40.0).abs() < 1e-9);
        // f = (2 * 0.52 - 0.48) / 2 = 0.28, capped.
        let second = &sim.ledger[1];
        let expected = (1000.0 + first.profit_loss) * KELLY_CAP;
        assert!((second.stake - expected).abs() < 1e-9);
        assert!((second.stake - 52.0).abs() < 1e-9);
        assert!((sim.final_capital - 988.0).abs() < 1e-9);
    }

    #[test]
    fn tally_iterates_in_check_order() {
        let mut tally = SkipTally::default();
        tally.record(SkipReason::NonPositiveStake);
        let keys: Vec<&str> = tally.iter().map(|(r, _)| r.key()).collect();
        assert_eq!(keys.first(), Some(&"out_of_band"));
        assert_eq!(keys.last(), Some(&"non_positive_stake"));
        assert_eq!(tally.total(), 1);
    }
}
