#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread;

    use investment_arena::*;

    fn pid(n: usize) -> ParticipantId {
        ParticipantId(n)
    }

    /// Drive one round single-threaded; `pick` decides each choice.
    fn play_round(session: &mut Session, mut pick: impl FnMut(&DecisionView) -> Choice) {
        let round = session.current().clone();
        for group in &round.groups {
            for member in &group.members {
                let view = session.open_decision(member.participant).expect("in-turn open");
                let choice = pick(&view);
                session.submit_choice(member.participant, choice).expect("in-turn submit");
            }
        }
        for i in 0..session.participants().len() {
            session.acknowledge_results(pid(i)).expect("ack");
        }
    }

    // ========== Lifecycle ==========

    #[test]
    fn test_full_default_session() {
        let mut session = Session::sequential(ExperimentConfig::default(), 2024).expect("session");
        session.start().expect("start");
        for round in 1..=3 {
            assert_eq!(session.current_round(), round);
            assert!(session
                .current()
                .groups
                .iter()
                .all(|g| g.successful_option.is_some() && g.members.len() == 3));
            play_round(&mut session, |view| view.advice);
        }
        assert!(session.is_finished());
        assert_eq!(session.phase(), RoundPhase::Final);

        // Every round is a permutation of all nine participants.
        for round in session.rounds() {
            let mut seen: Vec<_> = round.grouping.cells().map(|(_, _, p)| p.index()).collect();
            seen.sort_unstable();
            assert_eq!(seen, (0..9).collect::<Vec<_>>());
        }

        // Following the advice every time means the follow count equals rounds played.
        for i in 0..9 {
            let summary = session.final_summary(pid(i)).expect("final summary");
            assert_eq!(summary.total_followed_adviser, 3);
        }
    }

    #[test]
    fn test_groups_change_between_rounds() {
        let mut session = Session::sequential(ExperimentConfig::default(), 1).expect("session");
        session.start().expect("start");
        play_round(&mut session, |_| Choice::A);
        let first = &session.rounds()[0].grouping;
        let second = &session.rounds()[1].grouping;
        assert_eq!(second, &first.redistribute());
        // In the 3x3 layout nobody keeps a former group mate.
        for group in second.groups() {
            let former: Vec<_> = group.iter().map(|p| first.locate(p).map(|(g, _)| g)).collect();
            let mut unique = former.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), former.len(), "group mates reunited: {group:?}");
        }
    }

    #[test]
    fn test_round_result_running_totals() {
        let config = ExperimentConfig {
            advisor_threshold_percent: 100,
            ..Default::default()
        };
        let mut session = Session::sequential(config, 8).expect("session");
        session.start().expect("start");
        play_round(&mut session, |view| view.advice);
        play_round(&mut session, |view| view.advice);

        let r1 = session.round_result(pid(4), 1).expect("round 1 result");
        let r2 = session.round_result(pid(4), 2).expect("round 2 result");
        assert!(r1.is_correct && r2.is_correct);
        assert_eq!(r1.total_payoff, Points::whole(10));
        assert_eq!(r2.total_payoff, Points::whole(20));
        assert_eq!(r2.total_followed_adviser, 2);
        assert_eq!(r2.advisor_option, Some(r2.successful_option));
    }

    #[test]
    fn test_negative_payoff_with_penalty() {
        let config = ExperimentConfig {
            num_groups: 1,
            players_per_group: 1,
            num_rounds: 1,
            incorrect_choice_penalty: Points::whole(2),
            transaction_cost: Points::whole(1),
            advisor_threshold_percent: 100,
            ..Default::default()
        };
        let mut session = Session::sequential(config, 0).expect("session");
        session.start().expect("start");
        let view = session.open_decision(pid(0)).expect("open");
        let wrong = if view.advice == Choice::A { Choice::B } else { Choice::A };
        session.submit_choice(pid(0), wrong).expect("submit");
        assert_eq!(session.total_payoff(pid(0)), Points::whole(-3));
        assert_eq!(session.total_advisor_followed(pid(0)), 0);
    }

    #[test]
    fn test_aggregates_are_idempotent() {
        let mut session = Session::sequential(ExperimentConfig::default(), 77).expect("session");
        session.start().expect("start");
        play_round(&mut session, |_| Choice::B);
        let first: Vec<_> = (0..9).map(|i| session.total_payoff(pid(i))).collect();
        let again: Vec<_> = (0..9).map(|i| session.total_payoff(pid(i))).collect();
        assert_eq!(first, again);
        let follows: Vec<_> = (0..9).map(|i| session.total_advisor_followed(pid(i))).collect();
        let follows_again: Vec<_> = (0..9).map(|i| session.total_advisor_followed(pid(i))).collect();
        assert_eq!(follows, follows_again);
    }

    // ========== Export ==========

    #[test]
    fn test_export_mid_round_keeps_every_row() {
        let mut session = Session::sequential(ExperimentConfig::default(), 5).expect("session");
        session.start().expect("start");
        // Only the first member of the first group decides.
        session.submit_choice(pid(0), Choice::A).expect("submit");

        let export = export(&session);
        assert_eq!(export.rows.len(), 9);
        for row in &export.rows {
            assert_eq!(row.num_correct + row.num_incorrect, 3);
            assert_eq!(row.total_payoff, Points::zero());
            assert!(!row.is_complete());
        }
        let outcome = session.current().groups[0].successful_option;
        let expected_correct = u32::from(outcome == Some(Choice::A));
        assert_eq!(export.rows[0].num_correct, expected_correct);
        assert_eq!(export.rows[1].num_correct, 0);
    }

    #[test]
    fn test_export_after_completion() {
        let mut session = Session::sequential(ExperimentConfig::default(), 12).expect("session");
        session.start().expect("start");
        for _ in 0..3 {
            play_round(&mut session, |_| Choice::A);
        }
        let export = export(&session);
        for (i, row) in export.rows.iter().enumerate() {
            assert!(row.is_complete());
            assert_eq!(row.id, format!("P{}", i + 1));
            assert_eq!(row.total_payoff, session.total_payoff(pid(i)));
            assert_eq!(row.total_payoff, Points::whole(10 * i64::from(row.num_correct)));
        }
        let json = serde_json::to_string(&export).expect("serialize export");
        assert!(json.contains(&export.session_code));
    }

    // ========== Concurrency ==========

    #[test]
    fn test_concurrent_players_respect_turn_order() {
        let config = ExperimentConfig {
            num_groups: 3,
            players_per_group: 4,
            num_rounds: 4,
            ..Default::default()
        };
        let shared = Arc::new(SharedSession::new(Session::sequential(config, 31).expect("session")));
        shared.start().expect("start");
        // (round, group, position) in submission order
        let log = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..12)
            .map(|i| {
                let shared = Arc::clone(&shared);
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for round in 1..=4 {
                        shared.wait_for_round(round).expect("round opens");
                        let view = shared.wait_for_turn(pid(i)).expect("turn arrives");
                        {
                            let mut log = log.lock().expect("log lock");
                            shared.submit_choice(pid(i), view.advice).expect("submit");
                            log.push((view.round, view.group, view.position));
                        }
                        shared.wait_for_results(pid(i)).expect("results");
                        shared.acknowledge_results(pid(i)).expect("ack");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("player thread");
        }

        let session = Arc::try_unwrap(shared).ok().expect("sole owner").into_inner();
        assert!(session.is_finished());

        let log = log.lock().expect("log lock");
        assert_eq!(log.len(), 12 * 4);
        for round in 1..=4 {
            for group in 0..3 {
                let order: Vec<usize> = log
                    .iter()
                    .filter(|(r, g, _)| *r == round && *g == group)
                    .map(|(_, _, p)| *p)
                    .collect();
                assert_eq!(order, vec![1, 2, 3, 4], "round {round} group {group}");
            }
        }
    }
}
