use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use rayon::prelude::*;

use bet_backtest::cli::{self, InputArgs};
use bet_backtest::{BacktestConfig, Report, StakeStrategy, loader, pipeline};

/// Runs the same inputs under every staking strategy and prints one line each.
#[derive(Parser)]
#[command(name = "strategy_sweep")]
struct Cli {
    #[command(flatten)]
    inputs: InputArgs,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli::init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            cli::exit_code(&err)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let base = cli.inputs.config()?;
    let mut source = cli.inputs.source()?;
    let inputs = loader::load(source.as_mut())?;
    info!(
        "sweeping {} strategies over {} predictions",
        StakeStrategy::ALL.len(),
        inputs.predictions.len()
    );

    let results: Vec<(StakeStrategy, bet_backtest::Result<Report>)> = StakeStrategy::ALL
        .par_iter()
        .map(|strategy| {
            let config = BacktestConfig {
                stake_strategy: *strategy,
                ..base.clone()
            };
            (*strategy, pipeline::run(&inputs, &config))
        })
        .collect();

    println!(
        "{:<12} {:>6} {:>8} {:>12} {:>9} {:>8} {:>9}",
        "strategy", "bets", "win%", "profit", "roi%", "sharpe", "max_dd%"
    );
    for (strategy, result) in results {
        let report = result?;
        println!(
            "{:<12} {:>6} {:>8.2} {:>12.2} {:>9.2} {:>8.3} {:>9.2}",
            strategy.name(),
            report.totals.bets,
            report.totals.win_rate.value(),
            report.totals.total_profit.value(),
            report.totals.total_roi.value(),
            report.totals.sharpe.value(),
            report.returns.max_drawdown_pct.value(),
        );
    }
    Ok(())
}
