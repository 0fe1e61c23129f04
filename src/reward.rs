//! Reward shaping for one simulated day
//!
//! The reward is an unclipped sum of independent terms. Each term is kept in
//! [`RewardBreakdown`] so callers (and tests) can see why a day scored what
//! it did.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::action::{TrainingAction, TrainingType};
use crate::state::{PhysiologicalState, HISTORY_WINDOW};

/// Weight of the performance change
pub const PERFORMANCE_WEIGHT: f64 = 10.0;
/// Penalty for a second long run inside the trailing week
pub const LONG_RUN_REPEAT_PENALTY: f64 = -5.0;
/// Bonus for long runs early in the preparation
pub const EARLY_LONG_RUN_BONUS: f64 = 4.0;
/// Long runs count as "early" while more than this many days remain
pub const EARLY_PREPARATION_DAYS: u32 = 60;
/// Bonus for finishing a favorable 3-day sequence
pub const SEQUENCE_BONUS: f64 = 2.0;
/// Penalty per over-represented type in a full week
pub const OVERUSE_PENALTY: f64 = -1.0;
/// A type appearing more often than this in a week is over-represented
pub const OVERUSE_LIMIT: usize = 2;
/// Bonus for training in an approved zone
pub const ZONE_BONUS: f64 = 2.0;
/// Bonus for an approved duration
pub const DURATION_BONUS: f64 = 1.0;
/// Fatigue above this multiple of fitness counts as overreaching
pub const OVERREACH_RATIO: f64 = 1.5;
/// Overreaching penalty
pub const OVERREACH_PENALTY: f64 = -5.0;

/// Three-day sequences that earn [`SEQUENCE_BONUS`], oldest first
pub const FAVORABLE_SEQUENCES: [[TrainingType; 3]; 3] = [
    [TrainingType::Endurance, TrainingType::Interval, TrainingType::Rest],
    [TrainingType::LongRun, TrainingType::Rest, TrainingType::Interval],
    [TrainingType::Interval, TrainingType::Rest, TrainingType::Endurance],
];

/// Individual reward terms for one step
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub performance_delta: f64,
    pub long_run_cadence: f64,
    pub sequence_bonus: f64,
    pub distribution_penalty: f64,
    pub constraint_bonus: f64,
    pub overreach_penalty: f64,
    pub unsafe_penalty: f64,
}

impl RewardBreakdown {
    /// Breakdown of a rejected session: only the safety penalty applies
    pub fn unsafe_action(penalty: f64) -> Self {
        RewardBreakdown {
            unsafe_penalty: penalty,
            ..RewardBreakdown::default()
        }
    }

    pub fn total(&self) -> f64 {
        self.performance_delta
            + self.long_run_cadence
            + self.sequence_bonus
            + self.distribution_penalty
            + self.constraint_bonus
            + self.overreach_penalty
            + self.unsafe_penalty
    }
}

/// Score the transition `before --action--> after`
pub fn shape(
    before: &PhysiologicalState,
    after: &PhysiologicalState,
    action: &TrainingAction,
) -> RewardBreakdown {
    RewardBreakdown {
        performance_delta: PERFORMANCE_WEIGHT * (after.performance() - before.performance()),
        long_run_cadence: long_run_cadence(before, action),
        sequence_bonus: sequence_bonus(after),
        distribution_penalty: distribution_penalty(after),
        constraint_bonus: constraint_bonus(action),
        overreach_penalty: if after.fatigue() > OVERREACH_RATIO * after.fitness() {
            OVERREACH_PENALTY
        } else {
            0.0
        },
        unsafe_penalty: 0.0,
    }
}

/// Long runs are judged against the week *before* today's session
fn long_run_cadence(before: &PhysiologicalState, action: &TrainingAction) -> f64 {
    if action.training_type() != TrainingType::LongRun {
        return 0.0;
    }

    let long_run_this_week = before
        .recent_training_types()
        .rev()
        .take(HISTORY_WINDOW)
        .any(|t| t == TrainingType::LongRun);

    if long_run_this_week {
        LONG_RUN_REPEAT_PENALTY
    } else if before.days_remaining() > EARLY_PREPARATION_DAYS {
        EARLY_LONG_RUN_BONUS
    } else {
        0.0
    }
}

fn sequence_bonus(after: &PhysiologicalState) -> f64 {
    let recent: Vec<TrainingType> = after.recent_training_types().collect();
    if recent.len() < 3 {
        return 0.0;
    }

    let last_three = &recent[recent.len() - 3..];
    if FAVORABLE_SEQUENCES.iter().any(|seq| seq.as_slice() == last_three) {
        SEQUENCE_BONUS
    } else {
        0.0
    }
}

/// Only scored once the window holds a full week
fn distribution_penalty(after: &PhysiologicalState) -> f64 {
    if after.recent_sessions().len() < HISTORY_WINDOW {
        return 0.0;
    }

    let mut counts: BTreeMap<TrainingType, usize> = BTreeMap::new();
    for training_type in after.recent_training_types() {
        *counts.entry(training_type).or_insert(0) += 1;
    }

    counts
        .values()
        .filter(|&&count| count > OVERUSE_LIMIT)
        .map(|_| OVERUSE_PENALTY)
        .sum()
}

/// Zone and duration bonus, read from the same table the action generator uses
fn constraint_bonus(action: &TrainingAction) -> f64 {
    let constraints = action.training_type().constraints();
    let mut bonus = 0.0;
    if constraints.allows_zone(action.zone()) {
        bonus += ZONE_BONUS;
    }
    if constraints.allows_duration(action.duration_minutes()) {
        bonus += DURATION_BONUS;
    }
    bonus
}
