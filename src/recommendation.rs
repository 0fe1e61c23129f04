//! Next-session recommendation from a trained agent

use serde::Serialize;
use std::fmt;

use crate::action::TrainingAction;
use crate::agent::DynaQAgent;
use crate::error::Result;
use crate::state::PhysiologicalState;

/// A single prescribed session for the athlete's current state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingRecommendation {
    pub action: TrainingAction,
    pub description: &'static str,
    pub zone_label: &'static str,
    /// Heart-rate window (bpm) of the prescribed zone
    pub target_heart_rate: (u16, u16),
    /// Learned Q-value of the prescription
    pub confidence: f64,
}

impl fmt::Display for TrainingRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.action.is_rest() {
            return write!(f, "Rest day: {}", self.description);
        }
        write!(
            f,
            "{} for {} min at {:.0}% effort, {} ({}-{} bpm)",
            self.action.training_type(),
            self.action.duration_minutes(),
            self.action.intensity() * 100.0,
            self.zone_label,
            self.target_heart_rate.0,
            self.target_heart_rate.1
        )
    }
}

impl DynaQAgent {
    /// Greedy prescription for `state`, `None` if the agent never visited it
    pub fn recommend(&self, state: &PhysiologicalState) -> Result<Option<TrainingRecommendation>> {
        let Some(action) = self.greedy_action(state)? else {
            return Ok(None);
        };

        let key = state.discretize()?;
        Ok(Some(TrainingRecommendation {
            description: action.training_type().description(),
            zone_label: action.zone().label(),
            target_heart_rate: state.heart_rate_zones().bounds(action.zone()),
            confidence: self.q_value(&key, &action.key()),
            action,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::TrainingType;
    use crate::agent::AgentConfig;
    use crate::state::ImpulseResponse;

    #[test]
    fn test_recommendation_for_learned_state() {
        let mut agent = DynaQAgent::new(AgentConfig {
            n_planning_steps: 0,
            seed: Some(2),
            ..AgentConfig::default()
        })
        .unwrap();
        let state = PhysiologicalState::default();
        let long_run = TrainingAction::new(TrainingType::LongRun, 120, 0.7, 2).unwrap();
        let next = state.advance(&long_run, 0.1, &ImpulseResponse::default());
        agent.learn(&state, &long_run, 4.0, &next).unwrap();

        let recommendation = agent.recommend(&state).unwrap().unwrap();

        assert_eq!(recommendation.action, long_run);
        assert_eq!(recommendation.target_heart_rate, (116, 135));
        assert!((recommendation.confidence - 0.4).abs() < 1e-12);
        assert!(recommendation.to_string().contains("long-run"));
    }

    #[test]
    fn test_no_recommendation_for_unknown_state() {
        let agent = DynaQAgent::new(AgentConfig::default()).unwrap();
        assert!(agent
            .recommend(&PhysiologicalState::default())
            .unwrap()
            .is_none());
    }
}
