//! Argument groups shared by the command-line binaries.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;

use crate::config::BacktestConfig;
use crate::error::{BacktestError, Result};
use crate::loader::{FileSource, RowSource, SqliteSource, TablePaths};

#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Matches table (CSV or JSON)
    #[arg(long, required_unless_present = "sqlite", conflicts_with = "sqlite")]
    pub matches: Option<PathBuf>,

    /// Predictions table (CSV or JSON)
    #[arg(long, required_unless_present = "sqlite", conflicts_with = "sqlite")]
    pub predictions: Option<PathBuf>,

    /// Odds table (CSV or JSON)
    #[arg(long, required_unless_present = "sqlite", conflicts_with = "sqlite")]
    pub odds: Option<PathBuf>,

    /// SQLite database holding all three tables
    #[arg(long)]
    pub sqlite: Option<PathBuf>,

    /// Config document (JSON or TOML); defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl InputArgs {
    pub fn source(&self) -> Result<Box<dyn RowSource>> {
        if let Some(db) = &self.sqlite {
            return Ok(Box::new(SqliteSource::open(db)?));
        }
        match (&self.matches, &self.predictions, &self.odds) {
            (Some(m), Some(p), Some(o)) => Ok(Box::new(FileSource::new(TablePaths::new(m, p, o)))),
            _ => Err(BacktestError::Config(
                "either --sqlite or all of --matches, --predictions and --odds are required"
                    .to_string(),
            )),
        }
    }

    /// Loads the config file, if any, then applies `BACKTEST_*` overrides.
    pub fn config(&self) -> Result<BacktestConfig> {
        let mut config = match &self.config {
            Some(path) => BacktestConfig::load(path)?,
            None => BacktestConfig::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }
}

pub fn init_logging(verbose: bool) {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let log_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();
}

/// Maps a failure to the documented process exit code.
pub fn exit_code(err: &anyhow::Error) -> ExitCode {
    ExitCode::from(exit_status(err))
}

fn exit_status(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<BacktestError>()
        .map(BacktestError::exit_code)
        .and_then(|code| u8::try_from(code).ok())
        .unwrap_or(3)
}
