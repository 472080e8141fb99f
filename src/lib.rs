// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Group lifecycle engine for the social investment experiment.
//!
//! Participants are split into equal groups, decide in turn order between two
//! investment options with the help of a probabilistic advisor, are scored
//! against their group's hidden outcome and are reshuffled by a round-robin
//! permutation between rounds.

pub mod types;
pub mod config;
pub mod grouping;
pub mod round;
pub mod outcome;
pub mod advisor;
pub mod turn;
pub mod payoff;
pub mod session;
pub mod shared;
pub mod export;

pub use types::*;
pub use config::{ConfigError, ExperimentConfig};
pub use grouping::{Grouping, GroupingError};
pub use round::{GroupRound, PlayerRound, RoundPhase, RoundState, Seat};
pub use advisor::AdvisorOracle;
pub use payoff::{PayoffRules, SettleError};
pub use session::{
    DecisionView, FinalSummary, Participant, RoundResult, Session, SessionError, Submission,
};
pub use shared::SharedSession;
pub use export::{export, ExportRow, MissingData, SessionExport};
