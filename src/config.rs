// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Experiment configuration.
//!
//! One immutable [`ExperimentConfig`] is handed to the session at bootstrap
//! and shared by every component built from it. Defaults reproduce the
//! lab-standard three-by-three, three-round experiment.

use std::time::Duration;

use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::payoff::PayoffRules;
use crate::types::Points;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be at least 1")]
    Zero(&'static str),

    #[error("advisor threshold must be within 0..=100, got {0}")]
    ThresholdOutOfRange(u8),

    #[error("{field} must not be negative, got {value}")]
    NegativeAmount { field: &'static str, value: Points },

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// ExperimentConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Number of groups per round.
    pub num_groups: usize,
    /// Members of every group.
    pub players_per_group: usize,
    /// Total rounds played.
    pub num_rounds: u32,
    /// Paid for picking the group's successful option.
    pub correct_choice_reward: Points,
    /// Deducted for an incorrect choice (zero means "no reward").
    pub incorrect_choice_penalty: Points,
    /// Deducted from every payoff.
    pub transaction_cost: Points,
    /// Chance (0-100) that the advisor tells the truth.
    pub advisor_threshold_percent: u8,
    /// Upper bound on any blocking wait; `None` waits forever.
    #[serde(with = "humantime_serde")]
    pub turn_timeout: Option<Duration>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            num_groups: 3,
            players_per_group: 3,
            num_rounds: 3,
            correct_choice_reward: Points::from_decimal(dec!(10)),
            incorrect_choice_penalty: Points::zero(),
            transaction_cost: Points::zero(),
            advisor_threshold_percent: 70,
            turn_timeout: None,
        }
    }
}

impl ExperimentConfig {
    /// Parse a JSON document and validate it. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_groups == 0 {
            return Err(ConfigError::Zero("num_groups"));
        }
        if self.players_per_group == 0 {
            return Err(ConfigError::Zero("players_per_group"));
        }
        if self.num_rounds == 0 {
            return Err(ConfigError::Zero("num_rounds"));
        }
        if self.advisor_threshold_percent > 100 {
            return Err(ConfigError::ThresholdOutOfRange(self.advisor_threshold_percent));
        }
        for (field, value) in [
            ("correct_choice_reward", self.correct_choice_reward),
            ("incorrect_choice_penalty", self.incorrect_choice_penalty),
            ("transaction_cost", self.transaction_cost),
        ] {
            if value.is_negative() {
                return Err(ConfigError::NegativeAmount { field, value });
            }
        }
        Ok(())
    }

    pub fn total_players(&self) -> usize {
        self.num_groups * self.players_per_group
    }

    pub fn payoff_rules(&self) -> PayoffRules {
        PayoffRules {
            reward: self.correct_choice_reward,
            penalty: self.incorrect_choice_penalty,
            transaction_cost: self.transaction_cost,
        }
    }
}
