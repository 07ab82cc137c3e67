pub mod calibration;
pub mod cli;
pub mod config;
pub mod emit;
pub mod error;
pub mod league_rankings;
pub mod loader;
pub mod monte_carlo;
pub mod performance;
pub mod pipeline;
pub mod records;
pub mod recommendations;
pub mod report;
pub mod simulator;
pub mod stats;
pub mod uncertainty;
pub mod walk_forward;

pub use config::{BacktestConfig, StakeStrategy};
pub use error::{BacktestError, ErrorKind, Result};
pub use loader::{Inputs, RowSource};
pub use report::Report;
