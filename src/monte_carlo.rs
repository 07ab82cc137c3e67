use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::records::BetRecord;
use crate::stats;

// Keeps the bankroll paths off the bootstrap's random stream.
const STREAM_SALT: u64 = 0x4d43_5041_5448_5331;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonteCarloSettings {
    pub paths: usize,
    pub initial_capital: f64,
    pub ruin_fraction: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonteCarloSummary {
    pub paths: usize,
    pub mean_final_capital: f64,
    pub p5_final_capital: f64,
    pub p50_final_capital: f64,
    pub p95_final_capital: f64,
    pub probability_of_ruin: f64,
    pub value_at_risk_95: f64,
}

/// Replays the realized per-bet P&L in random order, with replacement, and
/// tracks where each bankroll path ends and whether it ever dips below the
/// ruin line.
pub fn simulate_paths(
    ledger: &[BetRecord],
    settings: MonteCarloSettings,
) -> Option<MonteCarloSummary> {
    if ledger.is_empty() || settings.paths == 0 {
        return None;
    }
    let pnl: Vec<f64> = ledger.iter().map(|b| b.profit_loss).collect();
    let ruin_line = settings.ruin_fraction * settings.initial_capital;
    let mut rng = StdRng::seed_from_u64(settings.seed ^ STREAM_SALT);

    let mut finals = Vec::with_capacity(settings.paths);
    let mut ruined = 0usize;
    for _ in 0..settings.paths {
        let mut capital = settings.initial_capital;
        let mut hit_ruin = false;
        for _ in 0..pnl.len() {
            capital += pnl[rng.gen_range(0..pnl.len())];
            if capital < ruin_line {
                hit_ruin = true;
            }
        }
        if hit_ruin {
            ruined += 1;
        }
        finals.push(capital);
    }

    let sorted = stats::sorted(&finals);
    let p5 = stats::percentile_sorted(&sorted, 0.05);
    Some(MonteCarloSummary {
        paths: settings.paths,
        mean_final_capital: stats::mean(&finals),
        p5_final_capital: p5,
        p50_final_capital: stats::percentile_sorted(&sorted, 0.50),
        p95_final_capital: stats::percentile_sorted(&sorted, 0.95),
        probability_of_ruin: ruined as f64 / settings.paths as f64,
        value_at_risk_95: settings.initial_capital - p5,
    })
}
