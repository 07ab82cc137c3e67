use std::path::PathBuf;

use serde_json::{Value, json};

use bet_backtest::config::{BacktestConfig, StakeStrategy};
use bet_backtest::loader::{self, CsvSource, Inputs, MemorySource, Row, TablePaths};
use bet_backtest::performance;
use bet_backtest::records::BetResult;
use bet_backtest::simulator::{self, SkipReason};
use bet_backtest::{calibration, pipeline};

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn fixture_inputs() -> Inputs {
    let mut source = CsvSource::new(TablePaths::new(
        fixture_path("matches.csv"),
        fixture_path("predictions.csv"),
        fixture_path("odds.csv"),
    ));
    loader::load(&mut source).expect("fixture tables should load")
}

fn rows(values: Vec<Value>) -> Vec<Row> {
    values
        .into_iter()
        .map(|v| match v {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        })
        .collect()
}

fn memory_inputs(matches: Vec<Value>, predictions: Vec<Value>, odds: Vec<Value>) -> Inputs {
    let mut source = MemorySource::new(rows(matches), rows(predictions), rows(odds));
    loader::load(&mut source).expect("scenario rows should load")
}

fn scenario_config(strategy: StakeStrategy) -> BacktestConfig {
    BacktestConfig {
        stake_strategy: strategy,
        initial_capital: 1000.0,
        stake_percentage: 0.02,
        min_confidence: 0.60,
        max_confidence: 0.95,
        ..BacktestConfig::default()
    }
}

fn single_match(home: u32, away: u32) -> Vec<Value> {
    vec![json!({
        "fixture_id": 1, "date": "2024-01-01", "league_name": "L",
        "home_team": "H", "away_team": "A", "home_score": home, "away_score": away
    })]
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn scenario_a_single_winning_bet() {
    let inputs = memory_inputs(
        single_match(2, 0),
        vec![json!({"fixture_id": 1, "date": "2024-01-01", "confidence": 0.8,
                    "prediction_1x2": "1", "prediction_ou": "Under"})],
        vec![json!({"fixture_id": 1, "odds_1x2": 2.0, "odds_ou": 1.0})],
    );
    let config = scenario_config(StakeStrategy::Fixed);
    let sim = simulator::simulate(&inputs.matches, &inputs.predictions, &inputs.odds, &config);

    assert_eq!(sim.ledger.len(), 1);
    assert_eq!(sim.skips.get(SkipReason::NoMarket), 1);
    let bet = &sim.ledger[0];
    assert!(close(bet.stake, 20.0));
    assert!(close(bet.profit_loss, 20.0));
    assert_eq!(bet.bet_result, BetResult::Win);

    let totals = performance::totals(&sim.ledger, &config);
    assert!(close(totals.total_roi, 100.0));
    assert!(close(totals.win_rate, 100.0));
}

#[test]
fn scenario_b_loss_reduces_capital_under_percentage() {
    let inputs = memory_inputs(
        single_match(2, 0),
        vec![json!({"fixture_id": 1, "date": "2024-01-01", "confidence": 0.8,
                    "prediction_1x2": "2", "prediction_ou": "Under"})],
        vec![json!({"fixture_id": 1, "odds_1x2": 1.5, "odds_ou": 1.0})],
    );
    let config = scenario_config(StakeStrategy::Percentage);
    let sim = simulator::simulate(&inputs.matches, &inputs.predictions, &inputs.odds, &config);

    assert_eq!(sim.ledger.len(), 1);
    assert_eq!(sim.ledger[0].bet_result, BetResult::Loss);
    assert!(close(sim.ledger[0].profit_loss, -20.0));
    assert!(close(sim.final_capital, 980.0));
}

#[test]
fn scenario_c_kelly_rejects_negative_edge() {
    let inputs = memory_inputs(
        single_match(2, 0),
        vec![json!({"fixture_id": 1, "date": "2024-01-01", "confidence": 0.4,
                    "prediction_1x2": "1", "prediction_ou": "Under"})],
        vec![json!({"fixture_id": 1, "odds_1x2": 2.0, "odds_ou": 2.0})],
    );
    let config = BacktestConfig {
        min_confidence: 0.3,
        ..scenario_config(StakeStrategy::Kelly)
    };
    assert!(close(simulator::kelly_fraction(2.0, 0.4), -0.2));

    let sim = simulator::simulate(&inputs.matches, &inputs.predictions, &inputs.odds, &config);
    assert!(sim.ledger.is_empty());
    assert_eq!(sim.skips.get(SkipReason::KellyNonPositive), 2);
}

#[test]
fn extreme_scores_settle_without_overflow() {
    let inputs = memory_inputs(
        single_match(u32::MAX, 1),
        vec![json!({"fixture_id": 1, "date": "2024-01-01", "confidence": 0.8,
                    "prediction_1x2": "1", "prediction_ou": "Over"})],
        vec![json!({"fixture_id": 1, "odds_1x2": 2.0, "odds_ou": 2.0})],
    );
    let report = pipeline::run(&inputs, &scenario_config(StakeStrategy::Fixed))
        .expect("extreme scores should still produce a report");
    assert_eq!(report.totals.bets, 2);
    assert_eq!(report.totals.wins, 2);
}

#[test]
fn scenario_d_band_filter_admits_middle_prediction() {
    let matches: Vec<Value> = (1..=3)
        .map(|id| {
            json!({"fixture_id": id, "date": "2024-01-01", "league_name": "L",
                   "home_team": "H", "away_team": "A", "home_score": 1, "away_score": 0})
        })
        .collect();
    let predictions = [0.55, 0.75, 0.97]
        .iter()
        .enumerate()
        .map(|(idx, conf)| {
            json!({"fixture_id": idx + 1, "date": "2024-01-01", "confidence": conf,
                   "prediction_1x2": "1", "prediction_ou": "Under"})
        })
        .collect();
    let odds = (1..=3)
        .map(|id| json!({"fixture_id": id, "odds_1x2": 1.8, "odds_ou": 1.0}))
        .collect();
    let inputs = memory_inputs(matches, predictions, odds);
    let config = scenario_config(StakeStrategy::Fixed);
    let sim = simulator::simulate(&inputs.matches, &inputs.predictions, &inputs.odds, &config);

    assert_eq!(sim.ledger.len(), 1);
    assert_eq!(sim.ledger[0].fixture_id, 2);
    assert_eq!(sim.skips.get(SkipReason::OutOfBand), 4);
}

#[test]
fn fixture_skip_tally_accounts_for_every_candidate() {
    let inputs = fixture_inputs();
    let config = BacktestConfig::default();
    let sim = simulator::simulate(&inputs.matches, &inputs.predictions, &inputs.odds, &config);

    assert_eq!(sim.predictions, 37);
    assert_eq!(sim.ledger.len(), 45);
    assert_eq!(sim.skips.get(SkipReason::OutOfBand), 18);
    assert_eq!(sim.skips.get(SkipReason::MissingMatch), 2);
    assert_eq!(sim.skips.get(SkipReason::UnsettledMatch), 2);
    assert_eq!(sim.skips.get(SkipReason::MissingOdds), 2);
    assert_eq!(sim.skips.get(SkipReason::NoMarket), 5);
    assert_eq!(2 * sim.predictions, sim.ledger.len() + sim.skips.total());
}

#[test]
fn ledger_invariants_hold_for_every_strategy() {
    let inputs = fixture_inputs();
    for strategy in StakeStrategy::ALL {
        let config = BacktestConfig {
            stake_strategy: strategy,
            ..BacktestConfig::default()
        };
        let sim = simulator::simulate(&inputs.matches, &inputs.predictions, &inputs.odds, &config);
        let totals = performance::totals(&sim.ledger, &config);

        assert_eq!(totals.bets, totals.wins + totals.losses + totals.pushes);
        let profit: f64 = sim.ledger.iter().map(|b| b.profit_loss).sum();
        assert!(close(totals.total_profit, profit));
        if totals.total_stake > 0.0 {
            assert!(close(totals.total_roi, 100.0 * totals.total_profit / totals.total_stake));
        } else {
            assert_eq!(totals.total_roi, 0.0);
        }
        assert!(close(sim.final_capital, config.initial_capital + profit));

        for bet in &sim.ledger {
            assert!(close(bet.roi, 100.0 * bet.profit_loss / bet.stake));
            match bet.bet_result {
                BetResult::Win => assert!(close(bet.profit_loss, bet.stake * (bet.odds - 1.0))),
                BetResult::Loss => assert!(close(bet.profit_loss, -bet.stake)),
                BetResult::Push => assert_eq!(bet.profit_loss, 0.0),
            }
            if strategy == StakeStrategy::Fixed {
                assert!(close(bet.stake, config.initial_capital * config.stake_percentage));
            }
        }
    }
}

#[test]
fn band_rois_recombine_into_total_roi() {
    let inputs = fixture_inputs();
    let config = BacktestConfig::default();
    let sim = simulator::simulate(&inputs.matches, &inputs.predictions, &inputs.odds, &config);
    let totals = performance::totals(&sim.ledger, &config);
    let bands = performance::per_confidence(&sim.ledger, &config.confidence_bands);

    let stake: f64 = bands.iter().map(|b| b.stats.stake).sum();
    let weighted: f64 = bands.iter().map(|b| b.stats.roi * b.stats.stake).sum();
    let bets: usize = bands.iter().map(|b| b.stats.bets).sum();
    assert_eq!(bets, totals.bets);
    assert!(close(stake, totals.total_stake));
    assert!((weighted / stake - totals.total_roi).abs() < 1e-6);
}

#[test]
fn reports_are_deterministic_and_have_ten_bins() {
    let inputs = fixture_inputs();
    let config = BacktestConfig {
        bootstrap_samples: 200,
        monte_carlo_paths: 200,
        ..BacktestConfig::default()
    };
    let first = pipeline::run(&inputs, &config).expect("pipeline should run");
    let second = pipeline::run(&inputs, &config).expect("pipeline should run");
    assert_eq!(first, second);
    assert_eq!(first.uncertainty.calibration.len(), 10);

    let empty = calibration::calibration_curve(&calibration::OutcomeSample::default());
    assert_eq!(empty.len(), 10);
}

#[test]
fn per_league_covers_every_admitted_bet() {
    let inputs = fixture_inputs();
    let report = pipeline::run(&inputs, &BacktestConfig::default()).expect("pipeline should run");
    let leagues: Vec<&str> = report.per_league.iter().map(|l| l.league.as_str()).collect();
    assert_eq!(leagues, vec!["La Liga", "Premier League", "Serie A"]);
    let bets: usize = report.per_league.iter().map(|l| l.bets).sum();
    assert_eq!(bets, 45);
    assert_eq!(report.rankings.by_volume[0].league, "Premier League");
    assert_eq!(report.rankings.by_volume[0].bets, 18);
    assert_eq!(report.league_summary.leagues, 3);
}
