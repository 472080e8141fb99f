// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Per-participant export across all rounds.
//!
//! Each (participant, round) pair is classified exactly once into a
//! [`RoundEntry`] that lists whatever data is missing. Aggregation reads only
//! those entries, so an incomplete participant still yields a row (with
//! zeros for the missing metrics) and never aborts the batch.

use serde::{Deserialize, Serialize};

use crate::config::ExperimentConfig;
use crate::round::RoundState;
use crate::session::{Participant, Session};
use crate::types::{Choice, ParticipantId, Points, RoundNumber};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Data absent for one participant in one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissingData {
    /// No seat: the round never started.
    Seat,
    Choice,
    Outcome,
    Payoff,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEntry {
    pub round: RoundNumber,
    pub missing: Vec<MissingData>,
    pub correct: bool,
    pub followed: u32,
    pub payoff: Points,
}

impl RoundEntry {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Classify one participant's round. `round` is `None` for rounds that
/// were never reached.
pub fn classify(number: RoundNumber, round: Option<&RoundState>, participant: ParticipantId) -> RoundEntry {
    let mut entry = RoundEntry {
        round: number,
        missing: Vec::new(),
        correct: false,
        followed: 0,
        payoff: Points::zero(),
    };
    let (Some(player), Some(group)) = (
        round.and_then(|r| r.player(participant)),
        round.and_then(|r| r.group_of(participant)),
    ) else {
        entry.missing.push(MissingData::Seat);
        return entry;
    };

    let choice: Option<Choice> = player.choice;
    if choice.is_none() {
        entry.missing.push(MissingData::Choice);
    }
    if group.successful_option.is_none() {
        entry.missing.push(MissingData::Outcome);
    }
    match player.payoff {
        Some(payoff) => entry.payoff = payoff,
        None => entry.missing.push(MissingData::Payoff),
    }
    entry.correct = choice.is_some() && choice == group.successful_option;
    entry.followed = player.advisor_followed;
    entry
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    /// `P1`, `P2`, ...
    pub id: String,
    pub participant_code: String,
    pub num_correct: u32,
    pub num_incorrect: u32,
    pub times_followed_adviser: u32,
    pub total_payoff: Points,
    /// Rounds with any missing data.
    pub incomplete_rounds: Vec<RoundNumber>,
}

impl ExportRow {
    pub fn from_entries(participant: &Participant, num_rounds: u32, entries: &[RoundEntry]) -> Self {
        let num_correct = entries.iter().filter(|e| e.correct).count() as u32;
        Self {
            id: participant.id.to_string(),
            participant_code: participant.code.clone(),
            num_correct,
            num_incorrect: num_rounds.saturating_sub(num_correct),
            times_followed_adviser: entries.iter().map(|e| e.followed).sum(),
            total_payoff: entries.iter().map(|e| e.payoff).sum(),
            incomplete_rounds: entries
                .iter()
                .filter(|e| !e.is_complete())
                .map(|e| e.round)
                .collect(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.incomplete_rounds.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionExport {
    pub session_code: String,
    pub settings: ExperimentConfig,
    pub rows: Vec<ExportRow>,
}

pub const HEADER: [&str; 6] = [
    "ID",
    "participant_code",
    "num_correct",
    "num_incorrect",
    "times_followed_adviser",
    "total_payoff",
];

impl SessionExport {
    /// Tabular layout: settings block, blank row, header, one row per
    /// participant.
    pub fn records(&self) -> Vec<Vec<String>> {
        let s = &self.settings;
        let mut out = vec![
            vec![format!("EXPERIMENT SETTINGS (Session: {})", self.session_code)],
            vec!["PLAYERS_PER_GROUP".into(), s.players_per_group.to_string()],
            vec!["NUM_GROUPS".into(), s.num_groups.to_string()],
            vec!["NUM_ROUNDS".into(), s.num_rounds.to_string()],
            vec!["CORRECT_CHOICE_REWARD".into(), s.correct_choice_reward.to_string()],
            vec!["INCORRECT_CHOICE_PENALTY".into(), s.incorrect_choice_penalty.to_string()],
            vec!["TRANSACTION_COST".into(), s.transaction_cost.to_string()],
            vec![
                "ADVISOR_CORRECTION_THRESHOLD_PERCENT".into(),
                s.advisor_threshold_percent.to_string(),
            ],
            Vec::new(),
            HEADER.iter().map(|h| h.to_string()).collect(),
        ];
        out.extend(self.rows.iter().map(|row| {
            vec![
                row.id.clone(),
                row.participant_code.clone(),
                row.num_correct.to_string(),
                row.num_incorrect.to_string(),
                row.times_followed_adviser.to_string(),
                row.total_payoff.to_string(),
            ]
        }));
        out
    }
}

/// Export every participant of `session`, complete or not.
pub fn export(session: &Session) -> SessionExport {
    let num_rounds = session.config().num_rounds;
    let rows = session
        .participants()
        .iter()
        .map(|participant| {
            let entries: Vec<RoundEntry> = (1..=num_rounds)
                .map(|n| classify(n, session.round(n), participant.id))
                .collect();
            let row = ExportRow::from_entries(participant, num_rounds, &entries);
            if !row.is_complete() {
                log::warn!(
                    "{} ({}) incomplete in rounds {:?}",
                    row.id,
                    row.participant_code,
                    row.incomplete_rounds
                );
            }
            row
        })
        .collect();
    SessionExport {
        session_code: session.code().to_string(),
        settings: session.config().clone(),
        rows,
    }
}
