//! Marathon preparation environment
//!
//! Composes the physiological state model, the safety gate and the reward
//! shaper into a day-by-day simulation:
//!
//! 1. the safety gate accepts or rejects the session,
//! 2. the session is converted to a normalized training impulse,
//! 3. the impulse-response model advances the state one day,
//! 4. the transition is scored.
//!
//! An episode is `Running` until the countdown reaches zero or a session is
//! rejected, after which it is `Terminal` until the next `reset`.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::action::{TrainingAction, TrainingType};
use crate::error::{ContractViolation, DynaRunError, Result};
use crate::report::DayRecord;
use crate::reward::{self, RewardBreakdown};
use crate::state::{AthleteBaseline, ImpulseResponse, PhysiologicalState, DAYS_REMAINING_CAP};

/// Tag attached to outcomes of rejected sessions
pub const UNSAFE_ACTION_TAG: &str = "unsafe_action";

/// Largest achievable training load: 120 minutes in zone 4 with the long-run factor
pub fn max_training_load() -> f64 {
    (120.0 / 60.0) * 4.0f64.exp() * TrainingType::LongRun.load_factor()
}

/// Normalized training impulse of a session (1.0 for a two-hour zone-4 long run)
pub fn training_load(action: &TrainingAction) -> f64 {
    if action.is_rest() {
        return 0.0;
    }

    let raw = f64::from(action.duration_minutes()) / 60.0
        * action.zone().load_weight().exp()
        * action.training_type().load_factor();

    raw / max_training_load()
}

/// Safety gate thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Max ratio between the projected and the logged weekly volume
    pub volume_growth_limit: f64,
    /// Logged weekly volume never counts as less than this (minutes)
    pub volume_floor_minutes: f64,
    /// Below this form, hard or long sessions are rejected
    pub low_form_threshold: f64,
    pub low_form_max_intensity: f64,
    pub low_form_max_duration_minutes: u32,
    /// Below this form, only easy sessions are accepted
    pub critical_form_threshold: f64,
    pub critical_form_max_intensity: f64,
    /// Reward of a rejected session
    pub unsafe_penalty: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        SafetyConfig {
            volume_growth_limit: 1.2,
            volume_floor_minutes: 240.0,
            low_form_threshold: -0.3,
            low_form_max_intensity: 0.7,
            low_form_max_duration_minutes: 60,
            critical_form_threshold: -0.5,
            critical_form_max_intensity: 0.6,
            unsafe_penalty: -10.0,
        }
    }
}

/// Environment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Days from the first simulated day to the goal event
    pub horizon_days: u32,
    /// Fatigue time constant (days)
    pub tau_fatigue: f64,
    /// Fitness time constant (days)
    pub tau_fitness: f64,
    pub athlete: AthleteBaseline,
    pub safety: SafetyConfig,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        EnvironmentConfig {
            horizon_days: DAYS_REMAINING_CAP,
            tau_fatigue: ImpulseResponse::TAU_FATIGUE,
            tau_fitness: ImpulseResponse::TAU_FITNESS,
            athlete: AthleteBaseline::default(),
            safety: SafetyConfig::default(),
        }
    }
}

impl EnvironmentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.horizon_days == 0 || self.horizon_days > DAYS_REMAINING_CAP {
            return Err(DynaRunError::Configuration(format!(
                "horizon_days must be within 1..={}, got {}",
                DAYS_REMAINING_CAP, self.horizon_days
            )));
        }
        if !(self.tau_fatigue > 0.0 && self.tau_fitness > 0.0) {
            return Err(DynaRunError::Configuration(
                "time constants must be positive".to_string(),
            ));
        }
        if self.tau_fatigue >= self.tau_fitness {
            return Err(DynaRunError::Configuration(format!(
                "fatigue must decay faster than fitness (tau_fatigue={} >= tau_fitness={})",
                self.tau_fatigue, self.tau_fitness
            )));
        }
        if self.athlete.max_heart_rate <= self.athlete.resting_heart_rate {
            return Err(DynaRunError::Configuration(
                "max_heart_rate must exceed resting_heart_rate".to_string(),
            ));
        }
        if !(self.safety.volume_growth_limit > 0.0) || self.safety.volume_floor_minutes < 0.0 {
            return Err(DynaRunError::Configuration(
                "volume limits must be positive".to_string(),
            ));
        }
        if self.safety.critical_form_threshold > self.safety.low_form_threshold {
            return Err(DynaRunError::Configuration(
                "critical_form_threshold must not exceed low_form_threshold".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why a session was rejected
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum UnsafeReason {
    /// Weekly volume would grow too fast
    VolumeSpike { projected: f64, limit: f64 },
    /// Form too low for a hard or long session
    LowForm { form: f64 },
    /// Form so low that only easy sessions are allowed
    CriticalForm { form: f64 },
}

impl UnsafeReason {
    pub fn tag(&self) -> &'static str {
        UNSAFE_ACTION_TAG
    }
}

/// Verdict of the safety gate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SafetyVerdict {
    Safe,
    Unsafe(UnsafeReason),
}

impl SafetyVerdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, SafetyVerdict::Safe)
    }
}

/// Hard precondition on training sessions. Deterministic in (state, action).
#[derive(Debug, Clone)]
pub struct SafetyGate {
    config: SafetyConfig,
}

impl SafetyGate {
    pub fn new(config: SafetyConfig) -> Self {
        SafetyGate { config }
    }

    pub fn evaluate(&self, state: &PhysiologicalState, action: &TrainingAction) -> SafetyVerdict {
        if action.is_rest() {
            return SafetyVerdict::Safe;
        }

        let form = state.form();
        let intensity = action.intensity();

        if form < self.config.low_form_threshold
            && (intensity > self.config.low_form_max_intensity
                || action.duration_minutes() > self.config.low_form_max_duration_minutes)
        {
            return SafetyVerdict::Unsafe(UnsafeReason::LowForm { form });
        }

        if form < self.config.critical_form_threshold
            && intensity > self.config.critical_form_max_intensity
        {
            return SafetyVerdict::Unsafe(UnsafeReason::CriticalForm { form });
        }

        let projected = state.projected_weekly_volume(action.duration_minutes());
        let limit = self.config.volume_growth_limit
            * state.weekly_volume().max(self.config.volume_floor_minutes);
        if projected > limit {
            return SafetyVerdict::Unsafe(UnsafeReason::VolumeSpike { projected, limit });
        }

        SafetyVerdict::Safe
    }
}

/// Episode state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodeStatus {
    Running,
    Terminal,
}

/// Result of one simulated day
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub state: PhysiologicalState,
    pub reward: f64,
    pub done: bool,
    pub breakdown: RewardBreakdown,
    /// Set when the safety gate rejected the session
    pub unsafe_reason: Option<UnsafeReason>,
}

impl StepOutcome {
    /// `Some("unsafe_action")` for rejected sessions
    pub fn error_tag(&self) -> Option<&'static str> {
        self.unsafe_reason.as_ref().map(UnsafeReason::tag)
    }
}

/// Day-by-day marathon preparation simulator
#[derive(Debug, Clone)]
pub struct MarathonEnvironment {
    config: EnvironmentConfig,
    model: ImpulseResponse,
    gate: SafetyGate,
    state: PhysiologicalState,
    status: EpisodeStatus,
    history: Vec<DayRecord>,
}

impl MarathonEnvironment {
    pub fn new(config: EnvironmentConfig) -> Result<Self> {
        config.validate()?;

        let model = ImpulseResponse::new(config.tau_fatigue, config.tau_fitness);
        let gate = SafetyGate::new(config.safety.clone());
        let state = PhysiologicalState::new(config.horizon_days, &config.athlete);

        Ok(MarathonEnvironment {
            config,
            model,
            gate,
            state,
            status: EpisodeStatus::Running,
            history: Vec::new(),
        })
    }

    /// Start a new episode from the configured initial state
    pub fn reset(&mut self) -> PhysiologicalState {
        let initial = PhysiologicalState::new(self.config.horizon_days, &self.config.athlete);
        self.reset_to(initial)
    }

    /// Start a new episode from an arbitrary state
    pub fn reset_to(&mut self, state: PhysiologicalState) -> PhysiologicalState {
        self.status = if state.days_remaining() == 0 {
            EpisodeStatus::Terminal
        } else {
            EpisodeStatus::Running
        };
        self.state = state;
        self.history.clear();
        self.state.clone()
    }

    /// Simulate one day.
    ///
    /// Unsafe sessions end the episode with the configured penalty and leave
    /// the physiological state untouched. Stepping a terminal episode is a
    /// contract violation.
    pub fn step(&mut self, action: &TrainingAction) -> Result<StepOutcome> {
        if self.status == EpisodeStatus::Terminal {
            return Err(ContractViolation::EpisodeFinished.into());
        }

        if let SafetyVerdict::Unsafe(reason) = self.gate.evaluate(&self.state, action) {
            warn!(
                action = %action,
                days_remaining = self.state.days_remaining(),
                reason = ?reason,
                tag = UNSAFE_ACTION_TAG,
                "Rejected unsafe training session"
            );
            self.status = EpisodeStatus::Terminal;
            let breakdown = RewardBreakdown::unsafe_action(self.config.safety.unsafe_penalty);
            return Ok(StepOutcome {
                state: self.state.clone(),
                reward: breakdown.total(),
                done: true,
                breakdown,
                unsafe_reason: Some(reason),
            });
        }

        let effort = training_load(action);
        let next = self.state.advance(action, effort, &self.model);
        let breakdown = reward::shape(&self.state, &next, action);
        let reward = breakdown.total();
        let done = next.days_remaining() == 0;

        debug!(
            action = %action,
            effort,
            fitness = next.fitness(),
            fatigue = next.fatigue(),
            reward,
            "Simulated training day"
        );

        self.history.push(DayRecord::new(
            self.history.len() as u32 + 1,
            action,
            &next,
            reward,
        ));

        if done {
            self.status = EpisodeStatus::Terminal;
        }
        self.state = next;

        Ok(StepOutcome {
            state: self.state.clone(),
            reward,
            done,
            breakdown,
            unsafe_reason: None,
        })
    }

    pub fn state(&self) -> &PhysiologicalState {
        &self.state
    }

    pub fn status(&self) -> EpisodeStatus {
        self.status
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// Days simulated in the current episode
    pub fn history(&self) -> &[DayRecord] {
        &self.history
    }
}
