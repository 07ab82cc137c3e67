use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};

pub const DEFAULT_CONFIDENCE_LEVELS: [f64; 5] = [0.68, 0.80, 0.90, 0.95, 0.99];
pub const DEFAULT_CONFIDENCE_BANDS: [[f64; 2]; 4] =
    [[0.60, 0.70], [0.70, 0.80], [0.80, 0.90], [0.90, 0.95]];

const ENV_BOOTSTRAP_SAMPLES: &str = "BACKTEST_BOOTSTRAP_SAMPLES";
const ENV_RNG_SEED: &str = "BACKTEST_RNG_SEED";
const ENV_MONTE_CARLO_PATHS: &str = "BACKTEST_MONTE_CARLO_PATHS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StakeStrategy {
    Fixed,
    Percentage,
    Kelly,
}

impl StakeStrategy {
    pub const ALL: [StakeStrategy; 3] = [
        StakeStrategy::Fixed,
        StakeStrategy::Percentage,
        StakeStrategy::Kelly,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StakeStrategy::Fixed => "fixed",
            StakeStrategy::Percentage => "percentage",
            StakeStrategy::Kelly => "kelly",
        }
    }
}

impl fmt::Display for StakeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive day-precision window applied to match dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Half-open `[lo, hi)` confidence band; the last configured band also
/// includes `hi`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct ConfidenceBand {
    pub lo: f64,
    pub hi: f64,
}

impl From<[f64; 2]> for ConfidenceBand {
    fn from(pair: [f64; 2]) -> Self {
        Self {
            lo: pair[0],
            hi: pair[1],
        }
    }
}

impl From<ConfidenceBand> for [f64; 2] {
    fn from(band: ConfidenceBand) -> Self {
        [band.lo, band.hi]
    }
}

impl ConfidenceBand {
    pub fn label(&self) -> String {
        format!("{:.0}-{:.0}%", self.lo * 100.0, self.hi * 100.0)
    }

    pub fn contains(&self, confidence: f64, inclusive_hi: bool) -> bool {
        confidence >= self.lo && (confidence < self.hi || (inclusive_hi && confidence == self.hi))
    }
}

/// Rolling train/test windows over the ledger. Months are 30 days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WalkForwardConfig {
    pub train_months: u32,
    pub test_months: u32,
    pub step_months: u32,
    pub min_train_bets: usize,
    pub min_test_bets: usize,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_months: 12,
            test_months: 3,
            step_months: 1,
            min_train_bets: 50,
            min_test_bets: 20,
        }
    }
}

/// Minimum history a backtest needs before its metrics are graded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    pub min_bets: usize,
    pub min_years: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_bets: 100,
            min_years: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub stake_strategy: StakeStrategy,
    pub stake_percentage: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,
    pub date_window: Option<DateWindow>,
    pub bootstrap_samples: usize,
    pub rng_seed: u64,
    pub confidence_levels: Vec<f64>,
    pub ou_threshold: f64,
    pub risk_free_rate: f64,
    pub rolling_window: usize,
    pub confidence_bands: Vec<ConfidenceBand>,
    // Annual ROI (percent) the strategy is compared against.
    pub benchmark_roi: f64,
    pub monte_carlo_paths: usize,
    pub ruin_fraction: f64,
    pub min_sample_bets: usize,
    pub walk_forward: WalkForwardConfig,
    pub validation: ValidationConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            stake_strategy: StakeStrategy::Fixed,
            stake_percentage: 0.02,
            min_confidence: 0.60,
            max_confidence: 0.95,
            date_window: None,
            bootstrap_samples: 1000,
            rng_seed: 42,
            confidence_levels: DEFAULT_CONFIDENCE_LEVELS.to_vec(),
            ou_threshold: 2.5,
            risk_free_rate: 0.005,
            rolling_window: 30,
            confidence_bands: DEFAULT_CONFIDENCE_BANDS
                .iter()
                .copied()
                .map(ConfidenceBand::from)
                .collect(),
            benchmark_roi: 5.0,
            monte_carlo_paths: 1000,
            ruin_fraction: 0.20,
            min_sample_bets: 30,
            walk_forward: WalkForwardConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl BacktestConfig {
    /// Reads a JSON or TOML config document, chosen by file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            BacktestError::Config(format!("failed to read config {}: {e}", path.display()))
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("toml") => Self::from_toml_str(&raw),
            _ => Self::from_json_str(&raw),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| BacktestError::Config(format!("failed to parse config: {e}")))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|e| BacktestError::Config(format!("failed to parse config: {e}")))
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = parse_override::<usize>(&lookup, ENV_BOOTSTRAP_SAMPLES)? {
            self.bootstrap_samples = v;
        }
        if let Some(v) = parse_override::<u64>(&lookup, ENV_RNG_SEED)? {
            self.rng_seed = v;
        }
        if let Some(v) = parse_override::<usize>(&lookup, ENV_MONTE_CARLO_PATHS)? {
            self.monte_carlo_paths = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return config_err(format!(
                "initial_capital must be > 0, got {}",
                self.initial_capital
            ));
        }
        if !(self.stake_percentage > 0.0 && self.stake_percentage <= 1.0) {
            return config_err(format!(
                "stake_percentage must be in (0, 1], got {}",
                self.stake_percentage
            ));
        }
        for (name, v) in [
            ("min_confidence", self.min_confidence),
            ("max_confidence", self.max_confidence),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return config_err(format!("{name} must be in [0, 1], got {v}"));
            }
        }
        if self.min_confidence > self.max_confidence {
            return config_err(format!(
                "min_confidence ({}) exceeds max_confidence ({})",
                self.min_confidence, self.max_confidence
            ));
        }
        if let Some(w) = self.date_window
            && w.start > w.end
        {
            return config_err(format!(
                "date_window start {} is after end {}",
                w.start, w.end
            ));
        }
        if self.bootstrap_samples == 0 {
            return config_err("bootstrap_samples must be at least 1".to_string());
        }
        if self.confidence_levels.is_empty() {
            return config_err("confidence_levels must not be empty".to_string());
        }
        let mut seen = HashSet::new();
        for level in &self.confidence_levels {
            if !(*level > 0.0 && *level < 1.0) {
                return config_err(format!("confidence level {level} is outside (0, 1)"));
            }
            if !seen.insert(level_key(*level)) {
                return config_err(format!("confidence level {level} is listed twice"));
            }
        }
        if !(self.ou_threshold.is_finite() && self.ou_threshold >= 0.0) {
            return config_err(format!(
                "ou_threshold must be a non-negative number, got {}",
                self.ou_threshold
            ));
        }
        if !self.risk_free_rate.is_finite() || !self.benchmark_roi.is_finite() {
            return config_err("risk_free_rate and benchmark_roi must be finite".to_string());
        }
        if self.rolling_window == 0 {
            return config_err("rolling_window must be at least 1".to_string());
        }
        self.validate_bands()?;
        if !(0.0..1.0).contains(&self.ruin_fraction) {
            return config_err(format!(
                "ruin_fraction must be in [0, 1), got {}",
                self.ruin_fraction
            ));
        }
        let wf = &self.walk_forward;
        if wf.train_months == 0 || wf.test_months == 0 || wf.step_months == 0 {
            return config_err(format!(
                "walk_forward months must be at least 1, got train={} test={} step={}",
                wf.train_months, wf.test_months, wf.step_months
            ));
        }
        if !(self.validation.min_years.is_finite() && self.validation.min_years >= 0.0) {
            return config_err(format!(
                "validation.min_years must be a non-negative number, got {}",
                self.validation.min_years
            ));
        }
        Ok(())
    }

    fn validate_bands(&self) -> Result<()> {
        if self.confidence_bands.is_empty() {
            return config_err("confidence_bands must not be empty".to_string());
        }
        let mut prev_hi = f64::NEG_INFINITY;
        for band in &self.confidence_bands {
            if !(0.0..=1.0).contains(&band.lo) || !(0.0..=1.0).contains(&band.hi) {
                return config_err(format!(
                    "confidence band [{}, {}] leaves [0, 1]",
                    band.lo, band.hi
                ));
            }
            if band.lo >= band.hi {
                return config_err(format!(
                    "confidence band [{}, {}] is empty",
                    band.lo, band.hi
                ));
            }
            if band.lo < prev_hi {
                return config_err(format!(
                    "confidence band [{}, {}] overlaps or is out of order",
                    band.lo, band.hi
                ));
            }
            prev_hi = band.hi;
        }
        Ok(())
    }
}

/// Stable map key for a confidence level.
pub fn level_key(level: f64) -> String {
    format!("{level:.2}")
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|_| BacktestError::Config(format!("{key}={trimmed} is not a valid value")))
}

fn config_err(message: String) -> Result<()> {
    Err(BacktestError::Config(message))
}

#[cfg(test)]
mod tests {
    use super::{BacktestConfig, ConfidenceBand, StakeStrategy, level_key};
    use crate::error::ErrorKind;

    #[test]
    fn defaults_validate() {
        let cfg = BacktestConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.confidence_bands.len(), 4);
        assert_eq!(cfg.confidence_bands[0].label(), "60-70%");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = BacktestConfig::from_json_str(
            r#"{"stake_strategy": "kelly", "date_window": {"start": "2024-01-01", "end": "2024-03-31"}}"#,
        )
        .unwrap();
        assert_eq!(cfg.stake_strategy, StakeStrategy::Kelly);
        assert_eq!(cfg.bootstrap_samples, 1000);
        assert!(cfg.date_window.is_some());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn unknown_strategy_is_config_error() {
        let err = BacktestConfig::from_json_str(r#"{"stake_strategy": "martingale"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn unknown_key_is_config_error() {
        let err = BacktestConfig::from_json_str(r#"{"stake_pct": 0.1}"#).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn toml_documents_parse() {
        let cfg = BacktestConfig::from_toml_str(
            "initial_capital = 500.0\nstake_strategy = \"percentage\"\nconfidence_bands = [[0.5, 0.75], [0.75, 1.0]]\n",
        )
        .unwrap();
        assert_eq!(cfg.initial_capital, 500.0);
        assert_eq!(
            cfg.confidence_bands[1],
            ConfidenceBand { lo: 0.75, hi: 1.0 }
        );
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn inverted_confidence_band_is_rejected() {
        let cfg = BacktestConfig {
            min_confidence: 0.9,
            max_confidence: 0.6,
            ..BacktestConfig::default()
        };
        assert_eq!(cfg.validate().unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn overlapping_bands_are_rejected() {
        let cfg = BacktestConfig {
            confidence_bands: vec![
                ConfidenceBand { lo: 0.6, hi: 0.8 },
                ConfidenceBand { lo: 0.7, hi: 0.9 },
            ],
            ..BacktestConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn duplicate_levels_are_rejected() {
        let cfg = BacktestConfig {
            confidence_levels: vec![0.9, 0.901],
            ..BacktestConfig::default()
        };
        assert_eq!(level_key(0.9), "0.90");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn walk_forward_and_validation_tables_parse() {
        let cfg = BacktestConfig::from_toml_str(
            "[walk_forward]\ntrain_months = 2\ntest_months = 1\n\n[validation]\nmin_bets = 10\n",
        )
        .unwrap();
        assert_eq!(cfg.walk_forward.train_months, 2);
        assert_eq!(cfg.walk_forward.step_months, 1);
        assert_eq!(cfg.validation.min_bets, 10);
        assert_eq!(cfg.validation.min_years, 3.0);
        assert!(cfg.validate().is_ok());

        let mut zero_step = cfg.clone();
        zero_step.walk_forward.step_months = 0;
        assert_eq!(zero_step.validate().unwrap_err().kind(), ErrorKind::Config);

        let err = BacktestConfig::from_json_str(r#"{"walk_forward": {"train_days": 30}}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn overrides_replace_seed_and_samples() {
        let mut cfg = BacktestConfig::default();
        cfg.apply_overrides(|key| match key {
            "BACKTEST_RNG_SEED" => Some("7".to_string()),
            "BACKTEST_BOOTSTRAP_SAMPLES" => Some(" 250 ".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.rng_seed, 7);
        assert_eq!(cfg.bootstrap_samples, 250);

        let err = cfg
            .apply_overrides(|key| (key == "BACKTEST_RNG_SEED").then(|| "abc".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
