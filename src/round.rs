// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Per-round state: players, groups and the round lifecycle phase.

use serde::{Deserialize, Serialize};

use crate::grouping::Grouping;
use crate::types::{Choice, ParticipantId, Points, RoundNumber};

// ---------------------------------------------------------------------------
// RoundPhase
// ---------------------------------------------------------------------------

/// Round lifecycle.
///
/// `SetupOutcome -> Deciding -> Settled -> Displayed -> Redistributed`, or
/// `Displayed -> Final` for the last round. Per-group completion is tracked
/// by [`GroupRound::settled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundPhase {
    /// Grouping fixed, outcomes not drawn yet.
    SetupOutcome,
    /// Outcomes drawn; players submit in turn order.
    Deciding,
    /// Every group settled; results on display.
    Settled,
    /// Every participant acknowledged the results.
    Displayed,
    /// The next round's grouping has been produced from this one.
    Redistributed,
    /// TERMINAL: last round displayed.
    Final,
}

impl RoundPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Final)
    }

    /// Whether decisions for this round are still accepted.
    pub fn accepts_decisions(&self) -> bool {
        matches!(self, Self::Deciding)
    }
}

// ---------------------------------------------------------------------------
// PlayerRound
// ---------------------------------------------------------------------------

/// One participant's seat in one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRound {
    pub participant: ParticipantId,
    /// 1-based turn order within the group.
    pub position: usize,
    pub choice: Option<Choice>,
    /// Written once, when the decision is first opened.
    pub advisor_recommendation: Option<Choice>,
    /// 1 if the choice matched the advice in this round, else 0.
    pub advisor_followed: u32,
    pub payoff: Option<Points>,
}

impl PlayerRound {
    pub fn new(participant: ParticipantId, position: usize) -> Self {
        Self {
            participant,
            position,
            choice: None,
            advisor_recommendation: None,
            advisor_followed: 0,
            payoff: None,
        }
    }

    pub fn has_decided(&self) -> bool {
        self.choice.is_some()
    }
}

// ---------------------------------------------------------------------------
// GroupRound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRound {
    /// 0-based, stable within the round.
    pub index: usize,
    /// Ordered by position.
    pub members: Vec<PlayerRound>,
    pub successful_option: Option<Choice>,
    pub settled: bool,
}

impl GroupRound {
    pub fn new(index: usize, participants: &[ParticipantId]) -> Self {
        Self {
            index,
            members: participants
                .iter()
                .enumerate()
                .map(|(p, id)| PlayerRound::new(*id, p + 1))
                .collect(),
            successful_option: None,
            settled: false,
        }
    }

    pub fn all_decided(&self) -> bool {
        self.members.iter().all(PlayerRound::has_decided)
    }

    pub fn pending(&self) -> usize {
        self.members.iter().filter(|m| !m.has_decided()).count()
    }

    pub fn member(&self, position: usize) -> Option<&PlayerRound> {
        position.checked_sub(1).and_then(|i| self.members.get(i))
    }

    pub fn member_mut(&mut self, position: usize) -> Option<&mut PlayerRound> {
        position.checked_sub(1).and_then(|i| self.members.get_mut(i))
    }
}

// ---------------------------------------------------------------------------
// RoundState
// ---------------------------------------------------------------------------

/// Where a participant sits in a round (group index 0-based, position 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Seat {
    pub group: usize,
    pub position: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundState {
    pub number: RoundNumber,
    pub phase: RoundPhase,
    pub grouping: Grouping<ParticipantId>,
    pub groups: Vec<GroupRound>,
    /// Indexed by participant.
    seats: Vec<Seat>,
    acknowledged: Vec<bool>,
}

impl RoundState {
    /// Lay out a round from a grouping whose occupants are exactly
    /// `0..grouping.len()`. The caller validates that.
    pub(crate) fn new(number: RoundNumber, grouping: Grouping<ParticipantId>) -> Self {
        let total = grouping.len();
        let mut seats = vec![Seat { group: 0, position: 0 }; total];
        for (group, position, id) in grouping.cells() {
            if let Some(seat) = seats.get_mut(id.index()) {
                *seat = Seat { group, position: position + 1 };
            }
        }
        let groups = grouping
            .groups()
            .enumerate()
            .map(|(index, members)| GroupRound::new(index, members))
            .collect();
        Self {
            number,
            phase: RoundPhase::SetupOutcome,
            grouping,
            groups,
            seats,
            acknowledged: vec![false; total],
        }
    }

    pub fn seat(&self, participant: ParticipantId) -> Option<Seat> {
        self.seats.get(participant.index()).copied()
    }

    pub fn player(&self, participant: ParticipantId) -> Option<&PlayerRound> {
        let seat = self.seat(participant)?;
        self.groups.get(seat.group)?.member(seat.position)
    }

    pub fn group_of(&self, participant: ParticipantId) -> Option<&GroupRound> {
        self.groups.get(self.seat(participant)?.group)
    }

    pub fn all_settled(&self) -> bool {
        self.groups.iter().all(|g| g.settled)
    }

    pub fn has_acknowledged(&self, participant: ParticipantId) -> bool {
        self.acknowledged.get(participant.index()).copied().unwrap_or(false)
    }

    /// Returns `true` once every participant has acknowledged.
    pub(crate) fn acknowledge(&mut self, participant: ParticipantId) -> bool {
        if let Some(flag) = self.acknowledged.get_mut(participant.index()) {
            *flag = true;
        }
        self.acknowledged.iter().all(|a| *a)
    }
}
