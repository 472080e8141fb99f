// Session Runner: Monte Carlo simulation of the social investment experiment
// Bot participants play full sessions; results aggregated per configuration
//
// Usage:
//   cargo run --release --bin session                           # 30 sessions, default config
//   cargo run --release --bin session -- --runs 5               # Quick mode
//   cargo run --release --bin session -- --config exp.json      # Custom experiment
//   cargo run --release --bin session -- --follow-rate 0.9      # More obedient bots
//   cargo run --release --bin session -- --output report.json   # Write JSON report
//   RUST_LOG=debug cargo run --bin session -- --runs 1          # Trace every decision

mod report;
mod runner;

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use investment_arena::ExperimentConfig;

// ─── CLI Parsing ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(author, version, about = "Simulate social investment sessions with bot participants")]
struct Args {
    /// JSON-serialized ExperimentConfig; defaults apply to missing fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sessions to simulate.
    #[arg(long, default_value_t = 30)]
    runs: usize,

    /// Seed of the first session; later sessions use consecutive seeds.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Probability (0-1) that a bot follows the advice.
    #[arg(long, default_value_t = 0.7)]
    follow_rate: f64,

    /// Where to write the JSON report.
    #[arg(long)]
    output: Option<PathBuf>,
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ExperimentConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => ExperimentConfig::default(),
    };
    let follow_rate = args.follow_rate.clamp(0.0, 1.0);

    println!("\n  Session Runner");
    println!(
        "  {} groups x {} players, {} rounds | advisor {}% | follow rate {:.2}",
        config.num_groups,
        config.players_per_group,
        config.num_rounds,
        config.advisor_threshold_percent,
        follow_rate
    );
    println!("  PRNG: ChaCha8Rng | Sessions: {} | Base seed: {}\n", args.runs, args.seed);

    let report = runner::run_monte_carlo(&config, args.runs, args.seed, follow_rate)?;

    println!("  {:<16} {:>10} {:>10} {:>10} {:>10}", "Metric", "Mean", "StdDev", "CI-", "CI+");
    println!("  {}", "-".repeat(60));
    for (name, stats) in [
        ("Payoff/player", &report.mean_payoff),
        ("Accuracy", &report.accuracy),
        ("Adherence", &report.adherence),
        ("Elapsed ms", &report.elapsed_ms),
    ] {
        println!(
            "  {:<16} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
            name, stats.mean, stats.std_dev, stats.ci_lower, stats.ci_upper
        );
    }
    println!("  {}", "-".repeat(60));
    println!("  Completed sessions: {:.1}%\n", report.completion_rate * 100.0);

    if let Some(path) = &args.output {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        println!("  Results saved to: {}\n", path.display());
    }

    Ok(())
}
