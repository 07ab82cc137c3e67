use crate::calibration;
use crate::config::BacktestConfig;
use crate::error::Result;
use crate::league_rankings;
use crate::loader::{self, Inputs, RowSource};
use crate::monte_carlo::{self, MonteCarloSettings};
use crate::performance;
use crate::report::{self, Report, ReportParts};
use crate::simulator;
use crate::uncertainty::{self, UncertaintyOptions};
use crate::walk_forward;

/// Validates `config`, replays the bets and composes the full report.
pub fn run(inputs: &Inputs, config: &BacktestConfig) -> Result<Report> {
    config.validate()?;

    let sim = simulator::simulate(&inputs.matches, &inputs.predictions, &inputs.odds, config);
    let ledger = &sim.ledger;

    let totals = performance::totals(ledger, config);
    let returns = performance::returns(ledger, &totals, config);
    let leagues = league_rankings::analyze_leagues(ledger);
    let validation = performance::validate(ledger, &totals, &returns, config);
    let walk_forward = walk_forward::analyze(ledger, &config.walk_forward, config.risk_free_rate);

    let sample = calibration::outcome_sample(&inputs.matches, &inputs.predictions);
    let uncertainty = uncertainty::analyze(
        &sample,
        UncertaintyOptions {
            levels: &config.confidence_levels,
            bootstrap_samples: config.bootstrap_samples,
            rng_seed: config.rng_seed,
        },
    );

    let monte_carlo = monte_carlo::simulate_paths(
        ledger,
        MonteCarloSettings {
            paths: config.monte_carlo_paths,
            initial_capital: config.initial_capital,
            ruin_fraction: config.ruin_fraction,
            seed: config.rng_seed,
        },
    );

    Ok(report::compose(ReportParts {
        config,
        input_fingerprint: inputs.fingerprint(),
        predictions: sim.predictions,
        candidates: sim.candidates,
        skips: sim.skips,
        period: performance::period_range(ledger),
        totals,
        returns,
        per_period: performance::per_period(ledger, config.rolling_window),
        per_bet_type: performance::per_bet_type(ledger),
        per_confidence: performance::per_confidence(ledger, &config.confidence_bands),
        rankings: league_rankings::rankings(&leagues),
        league_summary: league_rankings::league_summary(&leagues),
        highlights: league_rankings::league_extremes(&leagues),
        per_league: leagues,
        monte_carlo,
        walk_forward,
        validation,
        uncertainty,
    }))
}

pub fn run_source(source: &mut dyn RowSource, config: &BacktestConfig) -> Result<Report> {
    config.validate()?;
    let inputs = loader::load(source)?;
    run(&inputs, config)
}
