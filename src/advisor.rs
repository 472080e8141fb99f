// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Probabilistic advisor.
//!
//! A roll `r` in `[0, 100)` below the threshold yields the true outcome;
//! otherwise the advice is drawn uniformly from the remaining options.
//! The result has to be persisted by the caller: drawing again would change
//! what the player was shown.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::Choice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisorOracle {
    threshold_percent: u8,
}

impl AdvisorOracle {
    /// Thresholds above 100 behave like 100.
    pub fn new(threshold_percent: u8) -> Self {
        Self { threshold_percent: threshold_percent.min(100) }
    }

    pub fn threshold_percent(&self) -> u8 {
        self.threshold_percent
    }

    pub fn recommend<R: Rng + ?Sized>(&self, truth: Choice, rng: &mut R) -> Choice {
        recommend_from(&Choice::ALL, truth, self.threshold_percent, rng)
    }
}

/// Advice over an arbitrary option set. Returns `truth` when no other
/// option exists.
pub fn recommend_from<T, R>(options: &[T], truth: T, threshold_percent: u8, rng: &mut R) -> T
where
    T: Copy + PartialEq,
    R: Rng + ?Sized,
{
    let roll: f64 = rng.gen_range(0.0..100.0);
    if roll < f64::from(threshold_percent) {
        return truth;
    }
    let wrong: Vec<T> = options.iter().copied().filter(|o| *o != truth).collect();
    wrong.choose(rng).copied().unwrap_or(truth)
}
