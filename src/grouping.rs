// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Group matrices and the round-robin redistribution between rounds.
//!
//! A [`Grouping`] is a rectangular matrix indexed as
//! `groups[group][position]`, both 0-based. Players see their position
//! 1-based; that offset is applied by the round layer, never here.
//!
//! Redistribution moves the occupant of cell `(g, p)` to group
//! `(g + p + 1) mod num_groups`. Source cells are visited group-major,
//! position-minor and appended to their target group, so within a target
//! the arrival order is the visit order. For a fixed `p` the source group is
//! `(t - p - 1) mod num_groups`, so every target receives exactly one
//! occupant per source position and the shape is preserved:
//!
//! ```text
//!   round N          round N+1
//!   G1: P1 P2 P3     G1: P3 P5 P7
//!   G2: P4 P5 P6  => G2: P1 P6 P8
//!   G3: P7 P8 P9     G3: P2 P4 P9
//! ```

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupingError {
    #[error("a grouping needs at least one non-empty group")]
    Empty,

    #[error("group {group} has {actual} members, expected {expected}")]
    Ragged { group: usize, expected: usize, actual: usize },

    #[error("{players} players cannot be split into groups of {group_size}")]
    Indivisible { players: usize, group_size: usize },
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grouping<T> {
    groups: Vec<Vec<T>>,
}

impl<T> Grouping<T> {
    /// Build from explicit rows, rejecting empty or ragged matrices.
    pub fn new(groups: Vec<Vec<T>>) -> Result<Self, GroupingError> {
        let expected = match groups.first() {
            Some(first) if !first.is_empty() => first.len(),
            _ => return Err(GroupingError::Empty),
        };
        if let Some((group, row)) = groups.iter().enumerate().find(|(_, row)| row.len() != expected) {
            return Err(GroupingError::Ragged { group, expected, actual: row.len() });
        }
        Ok(Self { groups })
    }

    /// Chunk an ordered list into consecutive groups of `group_size`.
    pub fn sequential(players: Vec<T>, group_size: usize) -> Result<Self, GroupingError> {
        if players.is_empty() || group_size == 0 {
            return Err(GroupingError::Empty);
        }
        if players.len() % group_size != 0 {
            return Err(GroupingError::Indivisible { players: players.len(), group_size });
        }
        let mut groups = Vec::with_capacity(players.len() / group_size);
        let mut row = Vec::with_capacity(group_size);
        for player in players {
            row.push(player);
            if row.len() == group_size {
                groups.push(std::mem::replace(&mut row, Vec::with_capacity(group_size)));
            }
        }
        Ok(Self { groups })
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn group_size(&self) -> usize {
        self.groups.first().map_or(0, Vec::len)
    }

    /// `(num_groups, group_size)`
    pub fn shape(&self) -> (usize, usize) {
        (self.num_groups(), self.group_size())
    }

    pub fn len(&self) -> usize {
        self.num_groups() * self.group_size()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, index: usize) -> Option<&[T]> {
        self.groups.get(index).map(Vec::as_slice)
    }

    pub fn groups(&self) -> impl Iterator<Item = &[T]> + '_ {
        self.groups.iter().map(Vec::as_slice)
    }

    /// Every cell as `(group, position, occupant)` in group-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, &T)> + '_ {
        self.groups
            .iter()
            .enumerate()
            .flat_map(|(g, row)| row.iter().enumerate().map(move |(p, occupant)| (g, p, occupant)))
    }

    pub fn into_groups(self) -> Vec<Vec<T>> {
        self.groups
    }
}

impl<T: PartialEq> Grouping<T> {
    /// 0-based `(group, position)` of an occupant.
    pub fn locate(&self, occupant: &T) -> Option<(usize, usize)> {
        self.cells().find(|(_, _, o)| *o == occupant).map(|(g, p, _)| (g, p))
    }
}

impl<T: Clone> Grouping<T> {
    /// Round-robin permutation for the next round. Pure and deterministic.
    pub fn redistribute(&self) -> Self {
        let num_groups = self.num_groups();
        let mut next: Vec<Vec<T>> =
            (0..num_groups).map(|_| Vec::with_capacity(self.group_size())).collect();
        for (g, p, occupant) in self.cells() {
            next[target_group(g, p, num_groups)].push(occupant.clone());
        }
        Self { groups: next }
    }
}

/// Group the occupant of `(group, position)` moves to.
pub fn target_group(group: usize, position: usize, num_groups: usize) -> usize {
    (group + position + 1) % num_groups
}
