//! Episode driver for training an agent against the environment

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::time::Instant;
use tracing::{debug, info};

use crate::agent::DynaQAgent;
use crate::environment::MarathonEnvironment;
use crate::error::{DynaRunError, Result};

/// Training loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub episodes: usize,
    pub initial_epsilon: f64,
    pub final_epsilon: f64,
    /// Log a progress line every N episodes (0 disables)
    pub log_every: usize,
    pub show_progress: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            episodes: 5000,
            initial_epsilon: 0.9,
            final_epsilon: 0.1,
            log_every: 100,
            show_progress: false,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.episodes == 0 {
            return Err(DynaRunError::Configuration(
                "episodes must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("initial_epsilon", self.initial_epsilon),
            ("final_epsilon", self.final_epsilon),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DynaRunError::Configuration(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    pub fn schedule(&self) -> EpsilonSchedule {
        EpsilonSchedule::new(self.initial_epsilon, self.final_epsilon, self.episodes)
    }
}

/// Linear exploration decay across a training run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonSchedule {
    start: f64,
    end: f64,
    episodes: usize,
}

impl EpsilonSchedule {
    pub fn new(start: f64, end: f64, episodes: usize) -> Self {
        EpsilonSchedule {
            start,
            end,
            episodes,
        }
    }

    /// `start - episode * (start - end) / episodes`, never past `end`
    pub fn at(&self, episode: usize) -> f64 {
        if self.episodes == 0 || episode >= self.episodes {
            return self.end;
        }
        self.start - episode as f64 * (self.start - self.end) / self.episodes as f64
    }
}

/// Result of one training episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub episode: usize,
    pub total_reward: f64,
    pub days_completed: usize,
    pub unsafe_termination: bool,
    pub epsilon: f64,
}

/// Aggregate statistics of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub episodes: Vec<EpisodeSummary>,
    pub mean_reward: f64,
    pub reward_std_dev: f64,
    pub best_reward: f64,
    /// Share of episodes ended by the safety gate
    pub unsafe_rate: f64,
    pub states_visited: usize,
    pub model_transitions: usize,
    pub elapsed_secs: f64,
}

impl TrainingSummary {
    fn from_episodes(
        episodes: Vec<EpisodeSummary>,
        agent: &DynaQAgent,
        elapsed_secs: f64,
    ) -> Self {
        let rewards: Vec<f64> = episodes.iter().map(|e| e.total_reward).collect();
        let unsafe_count = episodes.iter().filter(|e| e.unsafe_termination).count();

        let (mean_reward, reward_std_dev) = match rewards.len() {
            0 => (0.0, 0.0),
            1 => (rewards[0], 0.0),
            _ => (rewards.iter().mean(), rewards.iter().std_dev()),
        };

        TrainingSummary {
            mean_reward,
            reward_std_dev,
            best_reward: rewards.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            unsafe_rate: if episodes.is_empty() {
                0.0
            } else {
                unsafe_count as f64 / episodes.len() as f64
            },
            states_visited: agent.state_count(),
            model_transitions: agent.planning_store().model_len(),
            elapsed_secs,
            episodes,
        }
    }

    /// Mean reward of the last `window` episodes
    pub fn recent_mean_reward(&self, window: usize) -> f64 {
        let start = self.episodes.len().saturating_sub(window);
        let recent = &self.episodes[start..];
        if recent.is_empty() {
            return 0.0;
        }
        recent.iter().map(|e| e.total_reward).sum::<f64>() / recent.len() as f64
    }
}

/// Runs `select_action -> step -> learn` episodes with annealed exploration
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Trainer { config })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train for the configured number of episodes.
    ///
    /// The agent is left at the final exploration rate.
    pub fn run(
        &self,
        agent: &mut DynaQAgent,
        env: &mut MarathonEnvironment,
    ) -> Result<TrainingSummary> {
        let started = Instant::now();
        let schedule = self.config.schedule();
        let mut episodes = Vec::with_capacity(self.config.episodes);

        info!(
            episodes = self.config.episodes,
            initial_epsilon = self.config.initial_epsilon,
            final_epsilon = self.config.final_epsilon,
            "Starting training"
        );

        let progress = self.progress_bar();

        for episode in 0..self.config.episodes {
            agent.set_epsilon(schedule.at(episode));
            let summary = Self::run_episode(episode, agent, env)?;
            episodes.push(summary);

            if let Some(ref pb) = progress {
                pb.inc(1);
            }

            if self.config.log_every > 0 && (episode + 1) % self.config.log_every == 0 {
                let window = &episodes[episodes.len() - self.config.log_every..];
                let mean = window.iter().map(|e| e.total_reward).sum::<f64>() / window.len() as f64;
                info!(
                    episode = episode + 1,
                    mean_reward = mean,
                    epsilon = agent.epsilon(),
                    states = agent.state_count(),
                    "Training progress"
                );
            }
        }

        if let Some(pb) = progress {
            pb.finish_with_message("Training complete");
        }
        agent.set_epsilon(self.config.final_epsilon);

        let summary =
            TrainingSummary::from_episodes(episodes, agent, started.elapsed().as_secs_f64());
        info!(
            mean_reward = summary.mean_reward,
            unsafe_rate = summary.unsafe_rate,
            states = summary.states_visited,
            elapsed_secs = summary.elapsed_secs,
            "Training finished"
        );
        Ok(summary)
    }

    /// One episode from a fresh environment reset
    pub fn run_episode(
        episode: usize,
        agent: &mut DynaQAgent,
        env: &mut MarathonEnvironment,
    ) -> Result<EpisodeSummary> {
        let mut state = env.reset();
        let mut total_reward = 0.0;
        let mut days_completed = 0;

        loop {
            let action = agent.select_action(&state)?;
            let outcome = env.step(&action)?;
            agent.learn(&state, &action, outcome.reward, &outcome.state)?;
            total_reward += outcome.reward;

            if outcome.unsafe_reason.is_none() {
                days_completed += 1;
            }
            if outcome.done {
                let summary = EpisodeSummary {
                    episode,
                    total_reward,
                    days_completed,
                    unsafe_termination: outcome.unsafe_reason.is_some(),
                    epsilon: agent.epsilon(),
                };
                debug!(?summary, "Episode finished");
                return Ok(summary);
            }
            state = outcome.state;
        }
    }

    fn progress_bar(&self) -> Option<ProgressBar> {
        if !self.config.show_progress {
            return None;
        }

        let pb = ProgressBar::new(self.config.episodes as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} episodes ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    }
}
