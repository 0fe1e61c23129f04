//! Per-day plan records and greedy-policy plan reports

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::action::{TrainingAction, TrainingType};
use crate::agent::DynaQAgent;
use crate::environment::MarathonEnvironment;
use crate::error::Result;
use crate::state::PhysiologicalState;

/// One simulated day, flat enough for CSV export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    pub day: u32,
    pub date: Option<NaiveDate>,
    pub training_type: TrainingType,
    pub duration_minutes: u32,
    pub zone: u8,
    pub intensity: f64,
    pub fitness: f64,
    pub fatigue: f64,
    pub performance: f64,
    pub form: f64,
    pub reward: f64,
    /// Countdown after this day's session
    pub days_remaining: u32,
}

impl DayRecord {
    pub fn new(day: u32, action: &TrainingAction, after: &PhysiologicalState, reward: f64) -> Self {
        DayRecord {
            day,
            date: None,
            training_type: action.training_type(),
            duration_minutes: action.duration_minutes(),
            zone: action.zone().number(),
            intensity: action.intensity(),
            fitness: after.fitness(),
            fatigue: after.fatigue(),
            performance: after.performance(),
            form: after.form(),
            reward,
            days_remaining: after.days_remaining(),
        }
    }
}

/// Macro phase of the preparation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingPhase {
    /// First 40% of the horizon
    Base,
    /// Next 40%
    Specific,
    /// Final 20%
    Taper,
}

impl TrainingPhase {
    /// Phase of a 1-based day within a horizon
    pub fn for_day(day: u32, horizon_days: u32) -> Self {
        let horizon = u64::from(horizon_days.max(1));
        let day = u64::from(day);
        if day * 10 <= horizon * 4 {
            TrainingPhase::Base
        } else if day * 10 <= horizon * 8 {
            TrainingPhase::Specific
        } else {
            TrainingPhase::Taper
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingPhase::Base => "base",
            TrainingPhase::Specific => "specific",
            TrainingPhase::Taper => "taper",
        }
    }
}

/// Aggregate numbers of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub total_days: usize,
    pub training_days: usize,
    pub total_volume_minutes: u32,
    pub long_runs: usize,
    pub total_reward: f64,
    pub final_fitness: f64,
    pub final_fatigue: f64,
    pub final_performance: f64,
    /// The rollout was cut short by the safety gate
    pub unsafe_termination: bool,
}

/// Training plan produced by rolling out the greedy policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanReport {
    pub generated_at: DateTime<Utc>,
    pub horizon_days: u32,
    pub race_date: Option<NaiveDate>,
    pub days: Vec<DayRecord>,
    pub summary: PlanSummary,
}

impl PlanReport {
    /// Roll out the agent's greedy policy for one episode.
    ///
    /// Exploration is switched off for the rollout and restored afterwards.
    /// States the agent never visited still get a random action.
    pub fn generate(agent: &mut DynaQAgent, env: &mut MarathonEnvironment) -> Result<Self> {
        let epsilon = agent.epsilon();
        agent.set_epsilon(0.0);
        let rollout = Self::rollout(agent, env);
        agent.set_epsilon(epsilon);

        let (total_reward, unsafe_termination) = rollout?;
        let days = env.history().to_vec();
        let summary = Self::summarize(&days, env.state(), total_reward, unsafe_termination);

        info!(
            days = summary.total_days,
            total_reward = summary.total_reward,
            final_performance = summary.final_performance,
            unsafe_termination,
            "Generated training plan"
        );

        Ok(PlanReport {
            generated_at: Utc::now(),
            horizon_days: env.config().horizon_days,
            race_date: None,
            days,
            summary,
        })
    }

    fn rollout(agent: &mut DynaQAgent, env: &mut MarathonEnvironment) -> Result<(f64, bool)> {
        let mut state = env.reset();
        let mut total_reward = 0.0;

        loop {
            let action = agent.select_action(&state)?;
            let outcome = env.step(&action)?;
            total_reward += outcome.reward;
            if outcome.done {
                return Ok((total_reward, outcome.unsafe_reason.is_some()));
            }
            state = outcome.state;
        }
    }

    fn summarize(
        days: &[DayRecord],
        last: &PhysiologicalState,
        total_reward: f64,
        unsafe_termination: bool,
    ) -> PlanSummary {
        PlanSummary {
            total_days: days.len(),
            training_days: days
                .iter()
                .filter(|d| d.training_type != TrainingType::Rest)
                .count(),
            total_volume_minutes: days.iter().map(|d| d.duration_minutes).sum(),
            long_runs: days
                .iter()
                .filter(|d| d.training_type == TrainingType::LongRun)
                .count(),
            total_reward,
            final_fitness: last.fitness(),
            final_fatigue: last.fatigue(),
            final_performance: last.performance(),
            unsafe_termination,
        }
    }

    /// Date every day backwards from the race: the last simulated day is the eve of the race
    pub fn with_race_date(mut self, race_date: NaiveDate) -> Self {
        for record in &mut self.days {
            record.date = Some(race_date - Duration::days(i64::from(record.days_remaining) + 1));
        }
        self.race_date = Some(race_date);
        self
    }

    /// Training-type counts per phase
    pub fn phase_distribution(&self) -> BTreeMap<TrainingPhase, BTreeMap<TrainingType, usize>> {
        let mut distribution: BTreeMap<TrainingPhase, BTreeMap<TrainingType, usize>> =
            BTreeMap::new();
        for record in &self.days {
            let phase = TrainingPhase::for_day(record.day, self.horizon_days);
            *distribution
                .entry(phase)
                .or_default()
                .entry(record.training_type)
                .or_insert(0) += 1;
        }
        distribution
    }

    /// Records of one 1-based week
    pub fn week(&self, week: u32) -> &[DayRecord] {
        let start = (week.saturating_sub(1) as usize * 7).min(self.days.len());
        let end = (start + 7).min(self.days.len());
        &self.days[start..end]
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentConfig;
    use crate::environment::EnvironmentConfig;

    fn record(day: u32, training_type: TrainingType, days_remaining: u32) -> DayRecord {
        DayRecord {
            day,
            date: None,
            training_type,
            duration_minutes: if training_type == TrainingType::Rest { 0 } else { 60 },
            zone: 2,
            intensity: 0.7,
            fitness: 0.0,
            fatigue: 0.0,
            performance: 0.0,
            form: 0.0,
            reward: 0.0,
            days_remaining,
        }
    }

    fn report(days: Vec<DayRecord>, horizon_days: u32) -> PlanReport {
        PlanReport {
            generated_at: Utc::now(),
            horizon_days,
            race_date: None,
            summary: PlanReport::summarize(&days, &PhysiologicalState::default(), 0.0, false),
            days,
        }
    }

    #[test]
    fn test_phase_boundaries() {
        assert_eq!(TrainingPhase::for_day(1, 10), TrainingPhase::Base);
        assert_eq!(TrainingPhase::for_day(4, 10), TrainingPhase::Base);
        assert_eq!(TrainingPhase::for_day(5, 10), TrainingPhase::Specific);
        assert_eq!(TrainingPhase::for_day(8, 10), TrainingPhase::Specific);
        assert_eq!(TrainingPhase::for_day(9, 10), TrainingPhase::Taper);
        assert_eq!(TrainingPhase::for_day(120, 120), TrainingPhase::Taper);
    }

    #[test]
    fn test_phase_distribution() {
        let days = vec![
            record(1, TrainingType::Endurance, 9),
            record(2, TrainingType::Rest, 8),
            record(5, TrainingType::LongRun, 5),
            record(10, TrainingType::Rest, 0),
        ];
        let distribution = report(days, 10).phase_distribution();

        assert_eq!(distribution[&TrainingPhase::Base][&TrainingType::Endurance], 1);
        assert_eq!(distribution[&TrainingPhase::Base][&TrainingType::Rest], 1);
        assert_eq!(distribution[&TrainingPhase::Specific][&TrainingType::LongRun], 1);
        assert_eq!(distribution[&TrainingPhase::Taper][&TrainingType::Rest], 1);
    }

    #[test]
    fn test_race_date_assignment() {
        let race = NaiveDate::from_ymd_opt(2024, 10, 13).unwrap();
        let dated = report(
            vec![record(1, TrainingType::Rest, 1), record(2, TrainingType::Rest, 0)],
            2,
        )
        .with_race_date(race);

        assert_eq!(dated.days[0].date, NaiveDate::from_ymd_opt(2024, 10, 11));
        assert_eq!(dated.days[1].date, NaiveDate::from_ymd_opt(2024, 10, 12));
        assert_eq!(dated.race_date, Some(race));
    }

    #[test]
    fn test_summary_counts() {
        let days = vec![
            record(1, TrainingType::LongRun, 2),
            record(2, TrainingType::Rest, 1),
            record(3, TrainingType::Endurance, 0),
        ];
        let summary = report(days, 3).summary;

        assert_eq!(summary.total_days, 3);
        assert_eq!(summary.training_days, 2);
        assert_eq!(summary.long_runs, 1);
        assert_eq!(summary.total_volume_minutes, 120);
    }

    #[test]
    fn test_generate_restores_epsilon() {
        let mut agent = DynaQAgent::new(AgentConfig {
            epsilon: 0.4,
            seed: Some(5),
            ..AgentConfig::default()
        })
        .unwrap();
        let mut env = MarathonEnvironment::new(EnvironmentConfig {
            horizon_days: 14,
            ..EnvironmentConfig::default()
        })
        .unwrap();

        let plan = PlanReport::generate(&mut agent, &mut env).unwrap();

        assert_eq!(agent.epsilon(), 0.4);
        assert!(!plan.is_empty());
        assert!(plan.days.len() <= 14);
        assert_eq!(plan.summary.total_days, plan.days.len());
        assert_eq!(plan.week(1).len(), plan.days.len().min(7));
    }
}
