//! Versioned JSON snapshots of a trained agent
//!
//! Keys are written as structured objects, so loading never needs to
//! evaluate text. The predecessor graph is not stored; it is rebuilt from
//! the transition model on load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::action::{ActionKey, ActionSpace};
use crate::agent::{ActionValues, AgentConfig, DynaQAgent};
use crate::error::{PersistenceError, Result};
use crate::planning::{StateActionKey, Transition};
use crate::state::{StateKey, DAYS_REMAINING_CAP};

/// Snapshot layout revision written by this build
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QValueEntry {
    pub state: StateKey,
    pub action: ActionKey,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub state: StateKey,
    pub action: ActionKey,
    pub reward: f64,
    pub next_state: StateKey,
}

/// Serializable form of `{Q, model, params}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub format_version: u32,
    pub saved_at: DateTime<Utc>,
    pub params: AgentConfig,
    pub epsilon: f64,
    pub q_values: Vec<QValueEntry>,
    pub model: Vec<ModelEntry>,
}

impl AgentSnapshot {
    /// Capture an agent, entries sorted by key for stable output
    pub fn capture(agent: &DynaQAgent) -> Self {
        let mut q_values: Vec<QValueEntry> = agent
            .q_table()
            .iter()
            .flat_map(|(state, values)| {
                values.iter().map(move |(action, value)| QValueEntry {
                    state: *state,
                    action: *action,
                    value: *value,
                })
            })
            .collect();
        q_values.sort_by(|a, b| (a.state, a.action).cmp(&(b.state, b.action)));

        let mut model: Vec<ModelEntry> = agent
            .planning_store()
            .transitions()
            .map(|(pair, transition)| ModelEntry {
                state: pair.state,
                action: pair.action,
                reward: transition.reward,
                next_state: transition.next_state,
            })
            .collect();
        model.sort_by(|a, b| (a.state, a.action).cmp(&(b.state, b.action)));

        AgentSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            saved_at: Utc::now(),
            params: agent.config().clone(),
            epsilon: agent.epsilon(),
            q_values,
            model,
        }
    }

    /// Validate and rebuild the agent
    pub fn restore(self) -> Result<DynaQAgent> {
        self.validate()?;

        let mut q_table: HashMap<StateKey, ActionValues> = HashMap::new();
        for entry in &self.q_values {
            q_table
                .entry(entry.state)
                .or_default()
                .insert(entry.action, entry.value);
        }

        let model = self.model.iter().map(|entry| {
            (
                StateActionKey::new(entry.state, entry.action),
                Transition {
                    reward: entry.reward,
                    next_state: entry.next_state,
                },
            )
        });

        DynaQAgent::from_parts(self.params.clone(), self.epsilon, q_table, model)
    }

    fn validate(&self) -> std::result::Result<(), PersistenceError> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                found: self.format_version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(malformed(format!("epsilon {} outside [0, 1]", self.epsilon)));
        }

        let actions = ActionSpace::generate();
        let check_state = |state: &StateKey| {
            if state.days_remaining > DAYS_REMAINING_CAP {
                Err(malformed(format!("state key {} above day cap", state)))
            } else {
                Ok(())
            }
        };
        let check_action = |action: &ActionKey| {
            if actions.contains(action) {
                Ok(())
            } else {
                Err(malformed(format!("action {} is not in the action space", action)))
            }
        };

        for entry in &self.q_values {
            if !entry.value.is_finite() {
                return Err(malformed(format!(
                    "non-finite Q-value for {} / {}",
                    entry.state, entry.action
                )));
            }
            check_state(&entry.state)?;
            check_action(&entry.action)?;
        }

        for entry in &self.model {
            if !entry.reward.is_finite() {
                return Err(malformed(format!(
                    "non-finite reward for {} / {}",
                    entry.state, entry.action
                )));
            }
            check_state(&entry.state)?;
            check_state(&entry.next_state)?;
            check_action(&entry.action)?;
        }

        Ok(())
    }
}

fn malformed(reason: String) -> PersistenceError {
    PersistenceError::Malformed { reason }
}

/// Serialize an agent to pretty JSON
pub fn to_json(agent: &DynaQAgent) -> Result<String> {
    let json = serde_json::to_string_pretty(&AgentSnapshot::capture(agent))
        .map_err(PersistenceError::from)?;
    Ok(json)
}

/// Parse and validate a JSON snapshot
pub fn from_json(json: &str) -> Result<DynaQAgent> {
    let snapshot: AgentSnapshot = serde_json::from_str(json).map_err(PersistenceError::from)?;
    snapshot.restore()
}

/// Save an agent snapshot, creating parent directories as needed
pub fn save_agent<P: AsRef<Path>>(agent: &DynaQAgent, path: P) -> Result<()> {
    let path = path.as_ref();
    let json = to_json(agent)?;

    let file_error = |source: std::io::Error| PersistenceError::File {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(file_error)?;
        }
    }
    fs::write(path, json).map_err(file_error)?;

    info!(
        path = %path.display(),
        states = agent.state_count(),
        transitions = agent.planning_store().model_len(),
        "Saved agent snapshot"
    );
    Ok(())
}

/// Load an agent snapshot
pub fn load_agent<P: AsRef<Path>>(path: P) -> Result<DynaQAgent> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|source| PersistenceError::File {
        path: path.to_path_buf(),
        source,
    })?;

    let agent = from_json(&json)?;
    info!(
        path = %path.display(),
        states = agent.state_count(),
        transitions = agent.planning_store().model_len(),
        "Loaded agent snapshot"
    );
    Ok(agent)
}
