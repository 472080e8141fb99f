// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Sequential turn gate.
//!
//! Within a group, players act in ascending position order: a player may act
//! once every member with a lower position has a choice on record. The
//! predicate reads sibling state that changes as others submit, so it is
//! evaluated fresh on every query and never cached.

use crate::round::PlayerRound;
use crate::types::Choice;

/// Whether the player at `position` may decide now.
pub fn can_act(position: usize, members: &[PlayerRound]) -> bool {
    position == 1
        || members
            .iter()
            .filter(|m| m.position < position)
            .all(PlayerRound::has_decided)
}

/// The waiting page is shown exactly when the decision page is not.
pub fn must_wait(position: usize, members: &[PlayerRound]) -> bool {
    !can_act(position, members)
}

/// Choices already made by earlier members, in turn order.
pub fn prior_choices(position: usize, members: &[PlayerRound]) -> Vec<Choice> {
    let mut earlier: Vec<&PlayerRound> = members.iter().filter(|m| m.position < position).collect();
    earlier.sort_by_key(|m| m.position);
    earlier.into_iter().filter_map(|m| m.choice).collect()
}

/// Lowest position still without a choice.
pub fn next_to_act(members: &[PlayerRound]) -> Option<usize> {
    members
        .iter()
        .filter(|m| !m.has_decided())
        .map(|m| m.position)
        .min()
}
