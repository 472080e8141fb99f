// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Payoff settlement for a fully decided group.
//!
//! ```text
//! correct:   reward - transaction_cost
//! incorrect: -penalty - transaction_cost
//! ```
//!
//! A nonzero penalty therefore yields a negative payoff. Following the
//! advisor adds one to the player's adherence count for the round.

use serde::{Deserialize, Serialize};

use crate::round::GroupRound;
use crate::types::{Choice, Points};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettleError {
    #[error("group {0} has no successful option")]
    MissingOutcome(usize),

    #[error("group {group} still has {missing} undecided member(s)")]
    Incomplete { group: usize, missing: usize },

    #[error("group {0} already settled")]
    AlreadySettled(usize),
}

// ---------------------------------------------------------------------------
// PayoffRules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoffRules {
    pub reward: Points,
    pub penalty: Points,
    pub transaction_cost: Points,
}

/// Payoff of one choice against the group's outcome.
pub fn payoff_for(choice: Choice, outcome: Choice, rules: &PayoffRules) -> Points {
    if choice == outcome {
        rules.reward - rules.transaction_cost
    } else {
        -rules.penalty - rules.transaction_cost
    }
}

/// Score every member of `group`. Must run exactly once per group and round,
/// after every member has decided.
pub fn settle(group: &mut GroupRound, rules: &PayoffRules) -> Result<(), SettleError> {
    if group.settled {
        return Err(SettleError::AlreadySettled(group.index));
    }
    let outcome = group
        .successful_option
        .ok_or(SettleError::MissingOutcome(group.index))?;
    let missing = group.pending();
    if missing > 0 {
        return Err(SettleError::Incomplete { group: group.index, missing });
    }

    for player in &mut group.members {
        let Some(choice) = player.choice else { continue };
        player.payoff = Some(payoff_for(choice, outcome, rules));
        if player.advisor_recommendation == Some(choice) {
            player.advisor_followed += 1;
        }
    }
    group.settled = true;
    Ok(())
}
