//! Tabular Dyna-Q agent with prioritized sweeping
//!
//! Every real transition triggers one direct Q-update followed by up to
//! `n_planning_steps` simulated updates. Simulated updates are drawn from the
//! learned model in priority order, and each one re-prioritizes the pairs
//! known to lead into the updated state, so value changes flow backwards
//! through the predecessor graph.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

use crate::action::{ActionKey, ActionSpace, TrainingAction};
use crate::error::{DynaRunError, Result};
use crate::planning::{PlanningStore, StateActionKey, Transition, DEFAULT_THETA};
use crate::state::{PhysiologicalState, StateKey};

/// Q-values of one state
pub type ActionValues = HashMap<ActionKey, f64>;

/// Agent hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Simulated updates after each real transition
    pub n_planning_steps: usize,
    pub learning_rate: f64,
    pub discount_factor: f64,
    /// Exploration rate at construction
    pub epsilon: f64,
    /// Minimum priority for a pair to enter the sweep queue
    pub priority_threshold: f64,
    /// RNG seed; `None` seeds from OS entropy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            n_planning_steps: 10,
            learning_rate: 0.1,
            discount_factor: 0.95,
            epsilon: 0.1,
            priority_threshold: DEFAULT_THETA,
            seed: None,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(DynaRunError::Configuration(format!(
                "learning_rate must be within (0, 1], got {}",
                self.learning_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.discount_factor) {
            return Err(DynaRunError::Configuration(format!(
                "discount_factor must be within [0, 1], got {}",
                self.discount_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(DynaRunError::Configuration(format!(
                "epsilon must be within [0, 1], got {}",
                self.epsilon
            )));
        }
        if !(self.priority_threshold >= 0.0) {
            return Err(DynaRunError::Configuration(format!(
                "priority_threshold must be non-negative, got {}",
                self.priority_threshold
            )));
        }
        Ok(())
    }
}

/// Counters for learning activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningStats {
    pub direct_updates: u64,
    pub planning_updates: u64,
    pub random_selections: u64,
    pub greedy_selections: u64,
}

/// Dyna-Q agent
#[derive(Debug)]
pub struct DynaQAgent {
    config: AgentConfig,
    epsilon: f64,
    q_table: HashMap<StateKey, ActionValues>,
    store: PlanningStore,
    actions: ActionSpace,
    rng: ChaCha8Rng,
    stats: LearningStats,
}

impl DynaQAgent {
    pub fn new(config: AgentConfig) -> Result<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::seed_from_u64(rand::random()),
        };

        Ok(DynaQAgent {
            epsilon: config.epsilon,
            store: PlanningStore::new(config.priority_threshold),
            actions: ActionSpace::generate(),
            q_table: HashMap::new(),
            rng,
            stats: LearningStats::default(),
            config,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Set the exploration rate, clamped to [0, 1]
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = if epsilon.is_nan() {
            0.0
        } else {
            epsilon.clamp(0.0, 1.0)
        };
    }

    pub fn action_space(&self) -> &ActionSpace {
        &self.actions
    }

    pub fn stats(&self) -> LearningStats {
        self.stats
    }

    /// Q-value of a pair, 0 when never updated
    pub fn q_value(&self, state: &StateKey, action: &ActionKey) -> f64 {
        self.q_table
            .get(state)
            .and_then(|values| values.get(action))
            .copied()
            .unwrap_or(0.0)
    }

    /// Best Q-value over the full action set (unseen entries count as 0)
    pub fn max_q_value(&self, state: &StateKey) -> f64 {
        match self.q_table.get(state) {
            Some(values) if !values.is_empty() => self
                .actions
                .keys()
                .iter()
                .map(|key| values.get(key).copied().unwrap_or(0.0))
                .fold(f64::NEG_INFINITY, f64::max),
            _ => 0.0,
        }
    }

    /// Whether the Q-table holds any entry for this state
    pub fn has_state(&self, state: &StateKey) -> bool {
        self.q_table
            .get(state)
            .map_or(false, |values| !values.is_empty())
    }

    pub fn state_count(&self) -> usize {
        self.q_table.len()
    }

    pub fn planning_store(&self) -> &PlanningStore {
        &self.store
    }

    /// Epsilon-greedy selection.
    ///
    /// States without any Q entry are explored uniformly at random.
    pub fn select_action(&mut self, state: &PhysiologicalState) -> Result<TrainingAction> {
        let key = state.discretize()?;

        if self.rng.gen::<f64>() < self.epsilon || !self.has_state(&key) {
            self.stats.random_selections += 1;
            return Ok(self.random_action());
        }

        self.stats.greedy_selections += 1;
        Ok(self.greedy_for_key(&key))
    }

    /// Greedy action for a state, or `None` if the state was never visited
    pub fn greedy_action(&self, state: &PhysiologicalState) -> Result<Option<TrainingAction>> {
        let key = state.discretize()?;
        if !self.has_state(&key) {
            return Ok(None);
        }
        Ok(Some(self.greedy_for_key(&key)))
    }

    /// Direct Q-update for a real transition, then a planning sweep
    pub fn learn(
        &mut self,
        state: &PhysiologicalState,
        action: &TrainingAction,
        reward: f64,
        next_state: &PhysiologicalState,
    ) -> Result<()> {
        let pair = StateActionKey::new(state.discretize()?, action.key());
        let next_key = next_state.discretize()?;

        let priority = self.update(pair, reward, next_key);
        self.stats.direct_updates += 1;

        self.store.record(
            pair,
            Transition {
                reward,
                next_state: next_key,
            },
        );
        self.store.push(priority, pair);

        self.plan();
        Ok(())
    }

    /// Up to `n_planning_steps` prioritized updates from the learned model
    pub fn plan(&mut self) {
        for _ in 0..self.config.n_planning_steps {
            let Some((priority, pair)) = self.store.pop() else {
                break;
            };
            let Some(transition) = self.store.transition(&pair).copied() else {
                continue;
            };

            trace!(state = %pair.state, action = %pair.action, priority, "Planning update");
            self.update(pair, transition.reward, transition.next_state);
            self.stats.planning_updates += 1;

            let state_value = self.max_q_value(&pair.state);
            let predecessors: Vec<(StateActionKey, f64)> = self
                .store
                .predecessors_of(&pair.state)
                .filter_map(|prev| {
                    let reward = self.store.transition(prev)?.reward;
                    let target = reward + self.config.discount_factor * state_value;
                    Some((*prev, (target - self.q_value(&prev.state, &prev.action)).abs()))
                })
                .collect();

            for (prev, priority) in predecessors {
                self.store.push(priority, prev);
            }
        }
    }

    /// One-step Q-update. Returns `|target - old|` measured before the update.
    fn update(&mut self, pair: StateActionKey, reward: f64, next_state: StateKey) -> f64 {
        let target = reward + self.config.discount_factor * self.max_q_value(&next_state);
        let entry = self
            .q_table
            .entry(pair.state)
            .or_default()
            .entry(pair.action)
            .or_insert(0.0);
        let td_error = target - *entry;
        *entry += self.config.learning_rate * td_error;
        td_error.abs()
    }

    fn random_action(&mut self) -> TrainingAction {
        let index = self.rng.gen_range(0..self.actions.len());
        self.actions.actions()[index]
    }

    /// First action with the strictly highest value wins ties
    fn greedy_for_key(&self, key: &StateKey) -> TrainingAction {
        let mut best_index = 0;
        let mut best_value = f64::NEG_INFINITY;
        for (index, action) in self.actions.keys().iter().enumerate() {
            let value = self.q_value(key, action);
            if value > best_value {
                best_value = value;
                best_index = index;
            }
        }
        self.actions.actions()[best_index]
    }

    pub(crate) fn q_table(&self) -> &HashMap<StateKey, ActionValues> {
        &self.q_table
    }

    /// Rebuild an agent from saved tables; predecessors are derived from the model
    pub(crate) fn from_parts(
        config: AgentConfig,
        epsilon: f64,
        q_table: HashMap<StateKey, ActionValues>,
        model: impl IntoIterator<Item = (StateActionKey, Transition)>,
    ) -> Result<Self> {
        let mut agent = DynaQAgent::new(config)?;
        agent.set_epsilon(epsilon);
        agent.q_table = q_table;
        for (pair, transition) in model {
            agent.store.record(pair, transition);
        }
        Ok(agent)
    }
}
