// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Thread-safe session for concurrently connected participants.
//!
//! One mutex guards the [`Session`]; waiters park on condition variables
//! instead of polling:
//!
//! - one per (round, group), notified on every submission in that group
//!   (turn gate and settle barrier),
//! - one per round, notified when the round advances or the session ends.
//!
//! Without a `turn_timeout` a stalled predecessor stalls its whole group
//! indefinitely.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::round::RoundPhase;
use crate::session::{DecisionView, RoundResult, Session, SessionError, Submission};
use crate::types::{Choice, ParticipantId, RoundNumber};

pub struct SharedSession {
    session: Mutex<Session>,
    /// `[round - 1][group]`
    turn_signals: Vec<Vec<Condvar>>,
    round_signal: Condvar,
    timeout: Option<Duration>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        let config = session.config();
        let turn_signals = (0..config.num_rounds)
            .map(|_| (0..config.num_groups).map(|_| Condvar::new()).collect())
            .collect();
        let timeout = config.turn_timeout;
        Self {
            session: Mutex::new(session),
            turn_signals,
            round_signal: Condvar::new(),
            timeout,
        }
    }

    /// Exclusive access for queries and one-off operations.
    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn into_inner(self) -> Session {
        self.session.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start(&self) -> Result<(), SessionError> {
        self.lock().start()?;
        self.round_signal.notify_all();
        Ok(())
    }

    /// Block until round `round` accepts decisions.
    pub fn wait_for_round(&self, round: RoundNumber) -> Result<(), SessionError> {
        let deadline = self.deadline();
        let mut session = self.lock();
        loop {
            if session.is_finished() {
                return Err(SessionError::SessionFinished);
            }
            let current = session.current_round();
            if current > round || (current == round && session.phase().accepts_decisions()) {
                return Ok(());
            }
            session = self.park(&self.round_signal, session, deadline)?;
        }
    }

    /// Block until `participant` may decide, then open the decision.
    pub fn wait_for_turn(&self, participant: ParticipantId) -> Result<DecisionView, SessionError> {
        let deadline = self.deadline();
        let mut session = self.lock();
        loop {
            if session.can_act(participant)? {
                return session.open_decision(participant);
            }
            let signal = self.group_signal(&session, participant)?;
            log::debug!("{} waiting for turn in round {}", participant, session.current_round());
            session = self.park(signal, session, deadline)?;
        }
    }

    pub fn submit_choice(
        &self,
        participant: ParticipantId,
        choice: Choice,
    ) -> Result<Submission, SessionError> {
        let mut session = self.lock();
        let submission = session.submit_choice(participant, choice)?;
        if let Some(signal) = self.signal(submission.round, submission.group) {
            signal.notify_all();
        }
        Ok(submission)
    }

    /// Block until the participant's group for the current round is
    /// settled, then return its results.
    pub fn wait_for_results(&self, participant: ParticipantId) -> Result<RoundResult, SessionError> {
        let deadline = self.deadline();
        let mut session = self.lock();
        let round = session.current_round();
        loop {
            match session.round_result(participant, round) {
                Err(SessionError::GroupNotSettled { .. }) => {}
                other => return other,
            }
            let signal = self.group_signal(&session, participant)?;
            session = self.park(signal, session, deadline)?;
        }
    }

    pub fn acknowledge_results(&self, participant: ParticipantId) -> Result<RoundPhase, SessionError> {
        let mut session = self.lock();
        let before = session.current_round();
        let phase = session.acknowledge_results(participant)?;
        if session.current_round() != before || phase.is_terminal() {
            self.round_signal.notify_all();
        }
        Ok(phase)
    }

    // -- Internals ----------------------------------------------------------

    fn deadline(&self) -> Option<(Instant, Duration)> {
        self.timeout.map(|t| (Instant::now() + t, t))
    }

    fn signal(&self, round: RoundNumber, group: usize) -> Option<&Condvar> {
        let index = usize::try_from(round.checked_sub(1)?).ok()?;
        self.turn_signals.get(index)?.get(group)
    }

    fn group_signal(
        &self,
        session: &Session,
        participant: ParticipantId,
    ) -> Result<&Condvar, SessionError> {
        let round = session.current_round();
        let seat = session.seat(participant)?;
        self.signal(round, seat.group)
            .ok_or(SessionError::NoSuchRound(round))
    }

    fn park<'a>(
        &self,
        signal: &Condvar,
        guard: MutexGuard<'a, Session>,
        deadline: Option<(Instant, Duration)>,
    ) -> Result<MutexGuard<'a, Session>, SessionError> {
        let Some((at, total)) = deadline else {
            return Ok(signal.wait(guard).unwrap_or_else(PoisonError::into_inner));
        };
        let remaining = at.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            log::warn!("wait abandoned after {:?}", total);
            return Err(SessionError::TurnTimeout(total));
        }
        let (guard, _) = signal
            .wait_timeout(guard, remaining)
            .unwrap_or_else(PoisonError::into_inner);
        Ok(guard)
    }
}
