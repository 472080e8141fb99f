// Monte Carlo Infrastructure: N sessions per configuration with bot participants
// Each participant runs on its own thread against a shared session

use std::thread;
use std::time::Instant;

use num_traits::ToPrimitive;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use investment_arena::*;

use crate::report::{MonteCarloReport, RunResult};

/// Play every round for one participant.
///
/// The bot follows the advice with probability `follow_rate`, otherwise it
/// picks uniformly.
fn play(
    shared: &SharedSession,
    participant: ParticipantId,
    num_rounds: u32,
    follow_rate: f64,
    mut rng: ChaCha8Rng,
) -> Result<(), SessionError> {
    for round in 1..=num_rounds {
        shared.wait_for_round(round)?;
        let view = shared.wait_for_turn(participant)?;
        let choice = if rng.gen_bool(follow_rate) {
            view.advice
        } else {
            Choice::ALL[rng.gen_range(0..Choice::ALL.len())]
        };
        shared.submit_choice(participant, choice)?;
        let result = shared.wait_for_results(participant)?;
        log::debug!(
            "{} round {}: chose {} (outcome {}), payoff {}",
            participant,
            round,
            result.choice,
            result.successful_option,
            result.round_payoff
        );
        shared.acknowledge_results(participant)?;
    }
    Ok(())
}

/// Run a single session with a specific seed.
pub fn run_single(
    config: &ExperimentConfig,
    seed: u64,
    follow_rate: f64,
) -> Result<RunResult, SessionError> {
    let start = Instant::now();
    let session = Session::sequential(config.clone(), seed)?;
    let shared = SharedSession::new(session);
    shared.start()?;

    let participants = config.total_players();
    let failures: Vec<String> = thread::scope(|scope| {
        let handles: Vec<_> = (0..participants)
            .map(|i| {
                let shared = &shared;
                let rng = ChaCha8Rng::seed_from_u64(seed.wrapping_mul(1_000_003).wrapping_add(i as u64));
                scope.spawn(move || play(shared, ParticipantId(i), config.num_rounds, follow_rate, rng))
            })
            .collect();
        handles
            .into_iter()
            .filter_map(|h| match h.join() {
                Ok(outcome) => outcome.err().map(|e| e.to_string()),
                Err(_) => Some("bot thread panicked".to_string()),
            })
            .collect()
    });
    for err in &failures {
        log::warn!("seed {}: participant gave up: {}", seed, err);
    }

    let session = shared.into_inner();
    let export = export(&session);
    let decisions = (participants as f64 * config.num_rounds as f64).max(1.0);
    let correct: u32 = export.rows.iter().map(|r| r.num_correct).sum();
    let followed: u32 = export.rows.iter().map(|r| r.times_followed_adviser).sum();
    let payoff: Points = export.rows.iter().map(|r| r.total_payoff).sum();

    Ok(RunResult {
        seed,
        session_code: export.session_code.clone(),
        completed: session.is_finished() && failures.is_empty(),
        participants,
        mean_payoff: payoff.0.to_f64().unwrap_or(0.0) / participants.max(1) as f64,
        accuracy: f64::from(correct) / decisions,
        adherence: f64::from(followed) / decisions,
        incomplete_rows: export.rows.iter().filter(|r| !r.is_complete()).count(),
        elapsed_ms: start.elapsed().as_millis(),
    })
}

/// Run Monte Carlo: N sessions with seeds `base_seed..base_seed + N`.
pub fn run_monte_carlo(
    config: &ExperimentConfig,
    n_runs: usize,
    base_seed: u64,
    follow_rate: f64,
) -> Result<MonteCarloReport, SessionError> {
    let mut results = Vec::with_capacity(n_runs);
    for i in 0..n_runs {
        let seed = base_seed + i as u64;
        results.push(run_single(config, seed, follow_rate)?);
    }
    Ok(MonteCarloReport::aggregate(config.clone(), follow_rate, results))
}
