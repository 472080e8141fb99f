// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Ground-truth outcome assignment.
//!
//! Every group of a round gets an independent, uniform draw from the option
//! set. This must complete for the whole round before any turn check or
//! decision for that round is evaluated.

use rand::Rng;

use crate::round::GroupRound;
use crate::types::Choice;

/// Uniform draw from [`Choice::ALL`].
pub fn draw_outcome<R: Rng + ?Sized>(rng: &mut R) -> Choice {
    Choice::ALL[rng.gen_range(0..Choice::ALL.len())]
}

/// Set `successful_option` on every group.
pub fn assign_outcomes<R: Rng + ?Sized>(groups: &mut [GroupRound], rng: &mut R) {
    for group in groups.iter_mut() {
        let outcome = draw_outcome(rng);
        log::debug!("group {} outcome {}", group.index + 1, outcome);
        group.successful_option = Some(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParticipantId;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn groups(n: usize) -> Vec<GroupRound> {
        (0..n).map(|i| GroupRound::new(i, &[ParticipantId(i)])).collect()
    }

    #[test]
    fn every_group_gets_an_outcome() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut round = groups(5);
        assign_outcomes(&mut round, &mut rng);
        assert!(round.iter().all(|g| g.successful_option.is_some()));
    }

    #[test]
    fn same_seed_same_outcomes() {
        let mut a = groups(10);
        let mut b = groups(10);
        assign_outcomes(&mut a, &mut ChaCha8Rng::seed_from_u64(42));
        assign_outcomes(&mut b, &mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn both_options_occur() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let draws: Vec<Choice> = (0..200).map(|_| draw_outcome(&mut rng)).collect();
        assert!(draws.contains(&Choice::A));
        assert!(draws.contains(&Choice::B));
    }
}
