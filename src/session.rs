// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Session orchestrator: sequences rounds `1..=num_rounds`.
//!
//! The presentation layer drives the session through a handful of events
//! (start, open decision, submit, acknowledge results) and queries it for
//! what to render. Ordering per round:
//!
//! ```text
//! outcomes drawn -> advice on open -> choices in turn order
//!   -> group settled by its last submission -> results acknowledged
//!   -> redistribution + outcomes for next round | Final
//! ```
//!
//! Every operation that would break that ordering is rejected with a
//! [`SessionError`]; those are orchestration bugs, not user input errors.

use std::time::Duration;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::advisor::AdvisorOracle;
use crate::config::{ConfigError, ExperimentConfig};
use crate::grouping::{Grouping, GroupingError};
use crate::outcome;
use crate::payoff::{self, PayoffRules, SettleError};
use crate::round::{GroupRound, PlayerRound, RoundPhase, RoundState, Seat};
use crate::turn;
use crate::types::{Choice, ParticipantId, Points, RoundNumber};

const CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const CODE_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Grouping(#[from] GroupingError),

    #[error(transparent)]
    Settle(#[from] SettleError),

    #[error("grouping is {actual:?}, configuration expects {expected:?}")]
    ShapeMismatch { expected: (usize, usize), actual: (usize, usize) },

    #[error("grouping does not seat every participant exactly once ({0} misplaced)")]
    NotAPermutation(ParticipantId),

    #[error("unknown participant {0}")]
    UnknownParticipant(ParticipantId),

    #[error("round {round} is {actual:?}, expected {expected:?}")]
    WrongPhase { round: RoundNumber, expected: RoundPhase, actual: RoundPhase },

    #[error("{participant} acted out of turn (position {position} in group {group})")]
    OutOfTurn { participant: ParticipantId, group: usize, position: usize },

    #[error("{0} already submitted a choice this round")]
    AlreadySubmitted(ParticipantId),

    #[error("results for {participant} in round {round} are not settled yet")]
    GroupNotSettled { participant: ParticipantId, round: RoundNumber },

    #[error("no redistribution after the final round {0}")]
    RedistributeAfterFinalRound(RoundNumber),

    #[error("round {0} does not exist")]
    NoSuchRound(RoundNumber),

    #[error("session already finished")]
    SessionFinished,

    #[error("gave up after waiting {0:?}")]
    TurnTimeout(Duration),
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Cross-round identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    /// Random 8-character label, unique in practice.
    pub code: String,
}

/// What the decision page needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionView {
    pub round: RoundNumber,
    pub group: usize,
    pub position: usize,
    pub is_first_player: bool,
    pub prior_choices: Vec<Choice>,
    pub advice: Choice,
}

/// Outcome of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub round: RoundNumber,
    pub group: usize,
    pub group_settled: bool,
    pub round_settled: bool,
}

/// What the round results page needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    pub round: RoundNumber,
    pub successful_option: Choice,
    pub choice: Choice,
    pub is_correct: bool,
    pub round_payoff: Points,
    pub advisor_option: Option<Choice>,
    /// Payoff over rounds `1..=round`.
    pub total_payoff: Points,
    pub total_followed_adviser: u32,
}

/// What the final page needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalSummary {
    pub participant: ParticipantId,
    pub total_payoff: Points,
    pub total_followed_adviser: u32,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Session {
    config: ExperimentConfig,
    code: String,
    advisor: AdvisorOracle,
    rules: PayoffRules,
    participants: Vec<Participant>,
    rounds: Vec<RoundState>,
    rng: ChaCha8Rng,
}

impl Session {
    /// Bootstrap from an explicit round-1 grouping of participants
    /// `0..config.total_players()`.
    pub fn new(
        config: ExperimentConfig,
        initial: Grouping<ParticipantId>,
        seed: u64,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let expected = (config.num_groups, config.players_per_group);
        if initial.shape() != expected {
            return Err(SessionError::ShapeMismatch { expected, actual: initial.shape() });
        }
        let total = config.total_players();
        let mut seen = vec![false; total];
        for (_, _, id) in initial.cells() {
            match seen.get_mut(id.index()) {
                Some(slot) if !*slot => *slot = true,
                _ => return Err(SessionError::NotAPermutation(*id)),
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let code = random_code(&mut rng);
        let participants = (0..total)
            .map(|i| Participant { id: ParticipantId(i), code: random_code(&mut rng) })
            .collect();

        log::info!(
            "session {} created: {} groups of {}, {} rounds",
            code,
            config.num_groups,
            config.players_per_group,
            config.num_rounds
        );

        Ok(Self {
            advisor: AdvisorOracle::new(config.advisor_threshold_percent),
            rules: config.payoff_rules(),
            code,
            participants,
            rounds: vec![RoundState::new(1, initial)],
            rng,
            config,
        })
    }

    /// Bootstrap with participants seated in id order.
    pub fn sequential(config: ExperimentConfig, seed: u64) -> Result<Self, SessionError> {
        config.validate()?;
        let ids = (0..config.total_players()).map(ParticipantId).collect();
        let initial = Grouping::sequential(ids, config.players_per_group)?;
        Self::new(config, initial, seed)
    }

    /// Draw round-1 outcomes and open it for decisions.
    pub fn start(&mut self) -> Result<(), SessionError> {
        let round = self.current_mut();
        expect_phase(round, RoundPhase::SetupOutcome)?;
        let number = round.number;
        self.open_round(number);
        Ok(())
    }

    // -- Accessors ----------------------------------------------------------

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn rounds(&self) -> &[RoundState] {
        &self.rounds
    }

    pub fn round(&self, number: RoundNumber) -> Option<&RoundState> {
        number.checked_sub(1).and_then(|i| self.rounds.get(i as usize))
    }

    pub fn current(&self) -> &RoundState {
        // `rounds` is never empty: `new` seeds round 1.
        &self.rounds[self.rounds.len() - 1]
    }

    pub fn current_round(&self) -> RoundNumber {
        self.current().number
    }

    pub fn phase(&self) -> RoundPhase {
        self.current().phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase().is_terminal()
    }

    pub fn seat(&self, participant: ParticipantId) -> Result<Seat, SessionError> {
        self.current()
            .seat(participant)
            .ok_or(SessionError::UnknownParticipant(participant))
    }

    pub fn player(&self, participant: ParticipantId, round: RoundNumber) -> Option<&PlayerRound> {
        self.round(round)?.player(participant)
    }

    // -- Turn gate ----------------------------------------------------------

    /// Whether `participant` may decide in the current round.
    pub fn can_act(&self, participant: ParticipantId) -> Result<bool, SessionError> {
        let round = self.current();
        expect_phase(round, RoundPhase::Deciding)?;
        let (seat, group) = self.seated(participant)?;
        Ok(turn::can_act(seat.position, &group.members))
    }

    pub fn must_wait(&self, participant: ParticipantId) -> Result<bool, SessionError> {
        self.can_act(participant).map(|ok| !ok)
    }

    // -- Decisions ----------------------------------------------------------

    /// Open the decision page. The advice is drawn on the first call and
    /// returned unchanged afterwards.
    pub fn open_decision(&mut self, participant: ParticipantId) -> Result<DecisionView, SessionError> {
        let seat = self.gate(participant)?;
        let advice = self.ensure_advice(participant, seat)?;
        let round = self.current();
        let members = &round.groups[seat.group].members;
        Ok(DecisionView {
            round: round.number,
            group: seat.group,
            position: seat.position,
            is_first_player: seat.position == 1,
            prior_choices: turn::prior_choices(seat.position, members),
            advice,
        })
    }

    /// Record a choice. The submission that completes a group settles it.
    pub fn submit_choice(
        &mut self,
        participant: ParticipantId,
        choice: Choice,
    ) -> Result<Submission, SessionError> {
        let seat = self.gate(participant)?;
        self.ensure_advice(participant, seat)?;

        let rules = self.rules;
        let round = self.current_mut();
        let number = round.number;
        let group = &mut round.groups[seat.group];
        let player = group
            .member_mut(seat.position)
            .ok_or(SessionError::UnknownParticipant(participant))?;
        player.choice = Some(choice);
        log::debug!(
            "round {} group {} position {}: {} chose {}",
            number,
            seat.group + 1,
            seat.position,
            participant,
            choice
        );

        let group_settled = group.all_decided();
        if group_settled {
            payoff::settle(group, &rules)?;
            log::info!("round {} group {} settled", number, seat.group + 1);
        }
        let round_settled = round.all_settled();
        if round_settled {
            round.phase = RoundPhase::Settled;
            log::info!("round {} settled", number);
        }
        Ok(Submission { round: number, group: seat.group, group_settled, round_settled })
    }

    // -- Results ------------------------------------------------------------

    pub fn round_result(
        &self,
        participant: ParticipantId,
        number: RoundNumber,
    ) -> Result<RoundResult, SessionError> {
        let round = self.round(number).ok_or(SessionError::NoSuchRound(number))?;
        let group = round
            .group_of(participant)
            .ok_or(SessionError::UnknownParticipant(participant))?;
        let player = round
            .player(participant)
            .ok_or(SessionError::UnknownParticipant(participant))?;
        let not_settled = || SessionError::GroupNotSettled { participant, round: number };
        if !group.settled {
            return Err(not_settled());
        }
        let (Some(successful_option), Some(choice), Some(round_payoff)) =
            (group.successful_option, player.choice, player.payoff)
        else {
            return Err(not_settled());
        };
        let played = &self.rounds[..number as usize];
        Ok(RoundResult {
            round: number,
            successful_option,
            choice,
            is_correct: choice == successful_option,
            round_payoff,
            advisor_option: player.advisor_recommendation,
            total_payoff: sum_payoff(played, participant),
            total_followed_adviser: sum_followed(played, participant),
        })
    }

    /// Participant is done viewing this round's results. When the last one
    /// confirms, the session moves on to the next round or finishes.
    pub fn acknowledge_results(&mut self, participant: ParticipantId) -> Result<RoundPhase, SessionError> {
        let number = self.current_round();
        let round = self.current();
        if round.phase.is_terminal() {
            return Err(SessionError::SessionFinished);
        }
        let group = round
            .group_of(participant)
            .ok_or(SessionError::UnknownParticipant(participant))?;
        if !group.settled {
            return Err(SessionError::GroupNotSettled { participant, round: number });
        }

        let round = self.current_mut();
        if !round.acknowledge(participant) {
            return Ok(round.phase);
        }
        expect_phase(round, RoundPhase::Settled)?;
        round.phase = RoundPhase::Displayed;
        log::info!("round {} displayed to every participant", number);
        self.advance()?;
        Ok(self.phase())
    }

    /// Grouping the next round would use.
    pub fn next_grouping(&self) -> Result<Grouping<ParticipantId>, SessionError> {
        let round = self.current();
        if round.number >= self.config.num_rounds {
            return Err(SessionError::RedistributeAfterFinalRound(round.number));
        }
        Ok(round.grouping.redistribute())
    }

    // -- Aggregates ---------------------------------------------------------

    /// Payoff summed over every round played so far.
    pub fn total_payoff(&self, participant: ParticipantId) -> Points {
        sum_payoff(&self.rounds, participant)
    }

    pub fn total_advisor_followed(&self, participant: ParticipantId) -> u32 {
        sum_followed(&self.rounds, participant)
    }

    pub fn final_summary(&self, participant: ParticipantId) -> Result<FinalSummary, SessionError> {
        if participant.index() >= self.participants.len() {
            return Err(SessionError::UnknownParticipant(participant));
        }
        let round = self.current();
        if !round.phase.is_terminal() {
            return Err(SessionError::WrongPhase {
                round: round.number,
                expected: RoundPhase::Final,
                actual: round.phase,
            });
        }
        Ok(FinalSummary {
            participant,
            total_payoff: self.total_payoff(participant),
            total_followed_adviser: self.total_advisor_followed(participant),
        })
    }

    // -- Internals ----------------------------------------------------------

    fn current_mut(&mut self) -> &mut RoundState {
        let last = self.rounds.len() - 1;
        &mut self.rounds[last]
    }

    fn seated(&self, participant: ParticipantId) -> Result<(Seat, &GroupRound), SessionError> {
        let round = self.current();
        let seat = round
            .seat(participant)
            .ok_or(SessionError::UnknownParticipant(participant))?;
        let group = round
            .groups
            .get(seat.group)
            .ok_or(SessionError::UnknownParticipant(participant))?;
        Ok((seat, group))
    }

    /// Common checks before a participant may touch the decision page.
    fn gate(&self, participant: ParticipantId) -> Result<Seat, SessionError> {
        let round = self.current();
        if round.phase.is_terminal() {
            return Err(SessionError::SessionFinished);
        }
        expect_phase(round, RoundPhase::Deciding)?;
        let (seat, group) = self.seated(participant)?;
        if group.member(seat.position).is_some_and(PlayerRound::has_decided) {
            log::warn!("{} submitted twice in round {}", participant, round.number);
            return Err(SessionError::AlreadySubmitted(participant));
        }
        if !turn::can_act(seat.position, &group.members) {
            log::warn!(
                "{} tried to act out of turn in round {} group {}",
                participant,
                round.number,
                seat.group + 1
            );
            return Err(SessionError::OutOfTurn {
                participant,
                group: seat.group,
                position: seat.position,
            });
        }
        Ok(seat)
    }

    fn ensure_advice(&mut self, participant: ParticipantId, seat: Seat) -> Result<Choice, SessionError> {
        let advisor = self.advisor;
        let last = self.rounds.len() - 1;
        let round = &mut self.rounds[last];
        let number = round.number;
        let group = &mut round.groups[seat.group];
        let truth = group
            .successful_option
            .ok_or(SettleError::MissingOutcome(seat.group))?;
        let player = group
            .member_mut(seat.position)
            .ok_or(SessionError::UnknownParticipant(participant))?;
        if let Some(advice) = player.advisor_recommendation {
            return Ok(advice);
        }
        let advice = advisor.recommend(truth, &mut self.rng);
        player.advisor_recommendation = Some(advice);
        log::debug!("round {} {}: advisor says {}", number, participant, advice);
        Ok(advice)
    }

    fn open_round(&mut self, number: RoundNumber) {
        let last = self.rounds.len() - 1;
        let round = &mut self.rounds[last];
        outcome::assign_outcomes(&mut round.groups, &mut self.rng);
        round.phase = RoundPhase::Deciding;
        log::info!("round {} open: {} groups", number, round.groups.len());
    }

    fn advance(&mut self) -> Result<(), SessionError> {
        let number = self.current_round();
        if number >= self.config.num_rounds {
            self.current_mut().phase = RoundPhase::Final;
            log::info!("session {} finished after round {}", self.code, number);
            return Ok(());
        }
        let next = self.next_grouping()?;
        self.current_mut().phase = RoundPhase::Redistributed;
        log::info!("round {} redistributed into round {}", number, number + 1);
        self.rounds.push(RoundState::new(number + 1, next));
        self.open_round(number + 1);
        Ok(())
    }
}

fn expect_phase(round: &RoundState, expected: RoundPhase) -> Result<(), SessionError> {
    if round.phase == expected {
        Ok(())
    } else {
        Err(SessionError::WrongPhase { round: round.number, expected, actual: round.phase })
    }
}

fn sum_payoff(rounds: &[RoundState], participant: ParticipantId) -> Points {
    rounds
        .iter()
        .filter_map(|r| r.player(participant)?.payoff)
        .sum()
}

fn sum_followed(rounds: &[RoundState], participant: ParticipantId) -> u32 {
    rounds
        .iter()
        .filter_map(|r| r.player(participant))
        .map(|p| p.advisor_followed)
        .sum()
}

fn random_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LEN)
        .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: usize) -> ParticipantId {
        ParticipantId(n)
    }

    fn small() -> ExperimentConfig {
        ExperimentConfig {
            num_groups: 2,
            players_per_group: 2,
            num_rounds: 2,
            ..Default::default()
        }
    }

    fn started(config: ExperimentConfig) -> Session {
        let mut session = Session::sequential(config, 5).expect("test: valid session");
        session.start().expect("test: start");
        session
    }

    /// Everyone in turn order picks `A`.
    fn play_round(session: &mut Session) {
        let round = session.current().clone();
        for group in &round.groups {
            for member in &group.members {
                session
                    .submit_choice(member.participant, Choice::A)
                    .expect("test: in-turn submission");
            }
        }
        for participant in 0..session.participants().len() {
            session.acknowledge_results(pid(participant)).expect("test: ack");
        }
    }

    #[test]
    fn start_assigns_every_outcome_first() {
        let mut session = Session::sequential(small(), 1).expect("test: valid");
        assert_eq!(session.phase(), RoundPhase::SetupOutcome);
        assert!(session.can_act(pid(0)).is_err());
        session.start().expect("test: start");
        assert!(session.current().groups.iter().all(|g| g.successful_option.is_some()));
        assert!(matches!(session.start(), Err(SessionError::WrongPhase { .. })));
    }

    #[test]
    fn out_of_turn_submission_is_rejected() {
        let mut session = started(small());
        let err = session.submit_choice(pid(1), Choice::A).expect_err("test: out of turn");
        assert!(matches!(err, SessionError::OutOfTurn { position: 2, .. }), "got: {err}");
        assert!(session.player(pid(1), 1).is_some_and(|p| p.choice.is_none()));
    }

    #[test]
    fn double_submission_is_rejected() {
        let mut session = started(small());
        session.submit_choice(pid(0), Choice::B).expect("test: first");
        let err = session.submit_choice(pid(0), Choice::A).expect_err("test: second");
        assert!(matches!(err, SessionError::AlreadySubmitted(_)));
        assert_eq!(session.player(pid(0), 1).and_then(|p| p.choice), Some(Choice::B));
    }

    #[test]
    fn advice_is_drawn_once() {
        let mut session = started(small());
        let first = session.open_decision(pid(0)).expect("test: open");
        for _ in 0..20 {
            assert_eq!(session.open_decision(pid(0)).expect("test: reopen").advice, first.advice);
        }
        session.submit_choice(pid(0), first.advice).expect("test: submit");
        assert_eq!(
            session.player(pid(0), 1).and_then(|p| p.advisor_recommendation),
            Some(first.advice)
        );
    }

    #[test]
    fn decision_view_shows_prior_choices() {
        let mut session = started(small());
        session.submit_choice(pid(0), Choice::B).expect("test: first");
        let view = session.open_decision(pid(1)).expect("test: second opens");
        assert_eq!(view.prior_choices, vec![Choice::B]);
        assert!(!view.is_first_player);
        assert_eq!(view.position, 2);
    }

    #[test]
    fn last_submission_settles_group() {
        let mut session = started(small());
        let first = session.submit_choice(pid(0), Choice::A).expect("test: first");
        assert!(!first.group_settled);
        let second = session.submit_choice(pid(1), Choice::A).expect("test: second");
        assert!(second.group_settled);
        assert!(!second.round_settled);
        assert!(session.round_result(pid(0), 1).is_ok());
        assert!(matches!(
            session.round_result(pid(2), 1),
            Err(SessionError::GroupNotSettled { .. })
        ));
    }

    #[test]
    fn no_redistribution_after_final_round() {
        let mut session = started(small());
        assert!(session.next_grouping().is_ok());
        play_round(&mut session);
        assert_eq!(session.current_round(), 2);
        assert_eq!(session.round(1).map(|r| r.phase), Some(RoundPhase::Redistributed));
        assert!(matches!(
            session.next_grouping(),
            Err(SessionError::RedistributeAfterFinalRound(2))
        ));
        play_round(&mut session);
        assert!(session.is_finished());
        assert_eq!(session.rounds().len(), 2);
        assert!(matches!(
            session.acknowledge_results(pid(0)),
            Err(SessionError::SessionFinished)
        ));
    }

    #[test]
    fn round_two_uses_redistributed_grouping() {
        let mut session = started(small());
        let expected = session.current().grouping.redistribute();
        play_round(&mut session);
        assert_eq!(session.current().grouping, expected);
        assert_eq!(session.phase(), RoundPhase::Deciding);
        assert!(session.current().groups.iter().all(|g| g.successful_option.is_some()));
    }

    #[test]
    fn totals_are_read_only() {
        let mut session = started(small());
        play_round(&mut session);
        play_round(&mut session);
        for participant in 0..4 {
            let first = session.final_summary(pid(participant)).expect("test: final");
            let again = session.final_summary(pid(participant)).expect("test: final again");
            assert_eq!(first, again);
            let correct = session
                .rounds()
                .iter()
                .filter(|r| {
                    r.group_of(pid(participant)).and_then(|g| g.successful_option)
                        == Some(Choice::A)
                })
                .count() as i64;
            assert_eq!(first.total_payoff, Points::whole(10 * correct));
        }
    }

    #[test]
    fn rejects_grouping_that_is_not_a_permutation() {
        let grouping = Grouping::new(vec![vec![pid(0), pid(0)], vec![pid(2), pid(3)]])
            .expect("test: rectangular");
        let err = Session::new(small(), grouping, 0).expect_err("test: duplicate seat");
        assert!(matches!(err, SessionError::NotAPermutation(p) if p == pid(0)));
    }

    #[test]
    fn rejects_grouping_of_wrong_shape() {
        let grouping = Grouping::sequential((0..4).map(pid).collect(), 4).expect("test: 1x4");
        let err = Session::new(small(), grouping, 0).expect_err("test: shape");
        assert!(matches!(err, SessionError::ShapeMismatch { expected: (2, 2), actual: (1, 4) }));
    }

    #[test]
    fn acknowledgement_waits_for_own_group() {
        let mut session = started(small());
        session.submit_choice(pid(0), Choice::A).expect("test: submit");
        assert!(matches!(
            session.acknowledge_results(pid(0)),
            Err(SessionError::GroupNotSettled { .. })
        ));
    }

    #[test]
    fn participant_codes_are_seeded() {
        let a = Session::sequential(small(), 99).expect("test: a");
        let b = Session::sequential(small(), 99).expect("test: b");
        assert_eq!(a.participants(), b.participants());
        assert!(a.participants().iter().all(|p| p.code.len() == CODE_LEN));
    }
}
