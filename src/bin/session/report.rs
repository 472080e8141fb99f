// Simulation Report Types
// Structured output for the Monte Carlo session runner

use serde::Serialize;

use investment_arena::ExperimentConfig;

// ─── Statistics (per-metric Monte Carlo aggregation) ────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl Stats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self { mean: 0.0, std_dev: 0.0, ci_lower: 0.0, ci_upper: 0.0, min: 0.0, max: 0.0, n: 0 };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let stderr = std_dev / (n as f64).sqrt();
        let z = 1.96; // 95% CI
        Self {
            mean,
            std_dev,
            ci_lower: mean - z * stderr,
            ci_upper: mean + z * stderr,
            min: samples.iter().cloned().fold(f64::INFINITY, f64::min),
            max: samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }
}

// ─── Single-Run Result ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub seed: u64,
    pub session_code: String,
    pub completed: bool,
    pub participants: usize,
    /// Mean total payoff per participant.
    pub mean_payoff: f64,
    /// Share of decisions matching the group outcome.
    pub accuracy: f64,
    /// Share of decisions matching the advice.
    pub adherence: f64,
    pub incomplete_rows: usize,
    pub elapsed_ms: u128,
}

// ─── Aggregate Report ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloReport {
    pub config: ExperimentConfig,
    pub follow_rate: f64,
    pub n_runs: usize,
    pub completion_rate: f64,
    pub mean_payoff: Stats,
    pub accuracy: Stats,
    pub adherence: Stats,
    pub elapsed_ms: Stats,
    pub individual_runs: Vec<RunResult>,
}

impl MonteCarloReport {
    pub fn aggregate(config: ExperimentConfig, follow_rate: f64, runs: Vec<RunResult>) -> Self {
        let n = runs.len();
        let completed = runs.iter().filter(|r| r.completed).count();
        let metric = |f: fn(&RunResult) -> f64| -> Stats {
            Stats::from_samples(&runs.iter().map(f).collect::<Vec<_>>())
        };
        Self {
            config,
            follow_rate,
            n_runs: n,
            completion_rate: if n > 0 { completed as f64 / n as f64 } else { 0.0 },
            mean_payoff: metric(|r| r.mean_payoff),
            accuracy: metric(|r| r.accuracy),
            adherence: metric(|r| r.adherence),
            elapsed_ms: metric(|r| r.elapsed_ms as f64),
            individual_runs: runs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_of_constant_samples() {
        let stats = Stats::from_samples(&[2.0, 2.0, 2.0]);
        assert_eq!(stats.mean, 2.0);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.ci_lower, stats.ci_upper);
    }

    #[test]
    fn stats_of_nothing() {
        assert_eq!(Stats::from_samples(&[]).n, 0);
    }
}
