use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::{debug, error, info};

use bet_backtest::cli::{self, InputArgs};
use bet_backtest::{emit, loader, pipeline};

#[derive(Parser)]
#[command(name = "bet_backtest")]
#[command(
    about = "Replay model predictions against closing odds and report ROI and uncertainty",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    inputs: InputArgs,

    /// Where to write the JSON report
    #[arg(short, long)]
    output: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Pretty-print the report
    #[arg(long)]
    pretty: bool,
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
    let config = cli.inputs.config()?;
    debug!(
        "config: strategy={} bootstrap_samples={} seed={}",
        config.stake_strategy, config.bootstrap_samples, config.rng_seed
    );

    let mut source = cli.inputs.source()?;
    let inputs = loader::load(source.as_mut())?;
    info!(
        "loaded {} matches, {} predictions, {} odds rows",
        inputs.matches.len(),
        inputs.predictions.len(),
        inputs.odds.len()
    );

    let report = pipeline::run(&inputs, &config)?;
    info!(
        "{} bets placed, {} candidates skipped, ROI {:.2}%",
        report.totals.bets,
        report.diagnostics.total_skipped,
        report.totals.total_roi.value()
    );
    for (reason, count) in &report.diagnostics.skips {
        debug!("skipped {reason}: {count}");
    }

    emit::write_report(&report, &cli.output, cli.pretty)
        .with_context(|| format!("failed to write report to {}", cli.output.display()))?;
    info!("report written to {}", cli.output.display());
    Ok(())
}
