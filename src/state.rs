//! Physiological state of the simulated athlete
//!
//! Fitness and fatigue follow a Bannister impulse-response model: each day's
//! normalized training impulse is added to both accumulators, which then
//! decay exponentially with their own time constant. Fatigue decays faster
//! than fitness, so form recovers after a taper.
//!
//! The state is a value type. [`PhysiologicalState::advance`] returns the next
//! day's state and leaves the current one untouched.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::action::{HeartRateZone, TrainingAction, TrainingType};
use crate::error::ContractViolation;

/// Number of days kept in the training-history window
pub const HISTORY_WINDOW: usize = 7;

/// Days-remaining values above this share a discretized key
pub const DAYS_REMAINING_CAP: u32 = 120;

/// Weather on the simulated day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    #[default]
    Ideal,
    Hot,
    Cold,
    Rain,
    Wind,
}

/// Heart-rate bounds (bpm) for the five training zones
///
/// Zone boundaries as a share of maximum heart rate:
/// - Z1: 50-60% (recovery)
/// - Z2: 60-70% (aerobic endurance)
/// - Z3: 70-80% (aerobic threshold)
/// - Z4: 80-90% (anaerobic threshold)
/// - Z5: 90-100% (VO2max)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateZones {
    bounds: [(u16, u16); 5],
}

impl HeartRateZones {
    /// Derive zone bounds from a maximum heart rate, truncating to whole bpm
    pub fn from_max_hr(max_hr: u16) -> Self {
        let at = |percent: u32| (u32::from(max_hr) * percent / 100) as u16;
        HeartRateZones {
            bounds: [
                (at(50), at(60)),
                (at(60), at(70)),
                (at(70), at(80)),
                (at(80), at(90)),
                (at(90), max_hr),
            ],
        }
    }

    /// Lower and upper bound of a zone
    pub fn bounds(&self, zone: HeartRateZone) -> (u16, u16) {
        self.bounds[usize::from(zone.number() - 1)]
    }
}

/// Two-accumulator impulse-response model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpulseResponse {
    fatigue_decay: f64,
    fitness_decay: f64,
}

impl ImpulseResponse {
    /// Default fatigue time constant in days
    pub const TAU_FATIGUE: f64 = 15.0;
    /// Default fitness time constant in days
    pub const TAU_FITNESS: f64 = 45.0;

    pub fn new(tau_fatigue: f64, tau_fitness: f64) -> Self {
        ImpulseResponse {
            fatigue_decay: (-1.0 / tau_fatigue).exp(),
            fitness_decay: (-1.0 / tau_fitness).exp(),
        }
    }

    /// One day of the model: `x' = effort + x * exp(-1/tau)`.
    /// Returns `(fitness, fatigue)`.
    pub fn apply(&self, fitness: f64, fatigue: f64, effort: f64) -> (f64, f64) {
        (
            effort + fitness * self.fitness_decay,
            effort + fatigue * self.fatigue_decay,
        )
    }
}

impl Default for ImpulseResponse {
    fn default() -> Self {
        Self::new(Self::TAU_FATIGUE, Self::TAU_FITNESS)
    }
}

/// A completed day in the history window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLog {
    pub training_type: TrainingType,
    pub duration_minutes: u32,
}

/// Athlete values that are not driven by the impulse-response model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AthleteBaseline {
    pub max_heart_rate: u16,
    pub resting_heart_rate: u16,
    /// Speed at VO2max in km/h
    pub vo2_speed_kmh: f64,
    pub temperature_c: f64,
    pub weather: Weather,
}

impl Default for AthleteBaseline {
    fn default() -> Self {
        AthleteBaseline {
            max_heart_rate: 194,
            resting_heart_rate: 60,
            vo2_speed_kmh: 15.0,
            temperature_c: 20.0,
            weather: Weather::Ideal,
        }
    }
}

/// Physiological state for one simulated day
#[derive(Debug, Clone, PartialEq)]
pub struct PhysiologicalState {
    fitness: f64,
    fatigue: f64,
    performance: f64,
    form: f64,
    recent_sessions: VecDeque<SessionLog>,
    weekly_volume: f64,
    days_remaining: u32,
    resting_heart_rate: u16,
    vo2_speed_kmh: f64,
    injury_risk: f64,
    weather: Weather,
    temperature_c: f64,
    heart_rate_zones: HeartRateZones,
}

impl PhysiologicalState {
    /// Fresh athlete with no accumulated load
    pub fn new(days_remaining: u32, baseline: &AthleteBaseline) -> Self {
        PhysiologicalState {
            fitness: 0.0,
            fatigue: 0.0,
            performance: 0.0,
            form: 0.0,
            recent_sessions: VecDeque::with_capacity(HISTORY_WINDOW + 1),
            weekly_volume: 0.0,
            days_remaining,
            resting_heart_rate: baseline.resting_heart_rate,
            vo2_speed_kmh: baseline.vo2_speed_kmh,
            injury_risk: 0.0,
            weather: baseline.weather,
            temperature_c: baseline.temperature_c,
            heart_rate_zones: HeartRateZones::from_max_hr(baseline.max_heart_rate),
        }
    }

    /// Same state with the given fitness/fatigue pair; derived values follow
    pub fn with_load(mut self, fitness: f64, fatigue: f64) -> Self {
        self.fitness = fitness;
        self.fatigue = fatigue;
        self.refresh_derived();
        self
    }

    /// Same state with a different countdown
    pub fn with_days_remaining(mut self, days_remaining: u32) -> Self {
        self.days_remaining = days_remaining;
        self
    }

    /// Same state with a pre-filled history window (oldest first)
    pub fn with_history(mut self, sessions: impl IntoIterator<Item = SessionLog>) -> Self {
        for session in sessions {
            self.push_session(session);
        }
        self
    }

    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    pub fn fatigue(&self) -> f64 {
        self.fatigue
    }

    /// `(fitness - fatigue) / 2`
    pub fn performance(&self) -> f64 {
        self.performance
    }

    /// `fitness - 2 * fatigue`
    pub fn form(&self) -> f64 {
        self.form
    }

    pub fn days_remaining(&self) -> u32 {
        self.days_remaining
    }

    /// Minutes trained over the history window
    pub fn weekly_volume(&self) -> f64 {
        self.weekly_volume
    }

    pub fn resting_heart_rate(&self) -> u16 {
        self.resting_heart_rate
    }

    pub fn vo2_speed_kmh(&self) -> f64 {
        self.vo2_speed_kmh
    }

    pub fn injury_risk(&self) -> f64 {
        self.injury_risk
    }

    pub fn weather(&self) -> Weather {
        self.weather
    }

    pub fn temperature_c(&self) -> f64 {
        self.temperature_c
    }

    pub fn heart_rate_zones(&self) -> &HeartRateZones {
        &self.heart_rate_zones
    }

    /// Training types of the last (at most seven) days, oldest first
    pub fn recent_training_types(&self) -> impl DoubleEndedIterator<Item = TrainingType> + '_ {
        self.recent_sessions.iter().map(|s| s.training_type)
    }

    pub fn recent_sessions(&self) -> &VecDeque<SessionLog> {
        &self.recent_sessions
    }

    /// Weekly volume if a session of `duration_minutes` were logged today
    pub fn projected_weekly_volume(&self, duration_minutes: u32) -> f64 {
        let leaving = if self.recent_sessions.len() >= HISTORY_WINDOW {
            self.recent_sessions
                .front()
                .map_or(0.0, |s| f64::from(s.duration_minutes))
        } else {
            0.0
        };
        self.weekly_volume - leaving + f64::from(duration_minutes)
    }

    /// Next day's state after performing `action` with training impulse `effort`
    pub fn advance(
        &self,
        action: &TrainingAction,
        effort: f64,
        model: &ImpulseResponse,
    ) -> PhysiologicalState {
        let mut next = self.clone();

        next.push_session(SessionLog {
            training_type: action.training_type(),
            duration_minutes: action.duration_minutes(),
        });

        let (fitness, fatigue) = model.apply(self.fitness, self.fatigue, effort);
        next.fitness = fitness;
        next.fatigue = fatigue;
        next.refresh_derived();

        next.days_remaining = self.days_remaining.saturating_sub(1);
        next
    }

    /// Lossy table key for this state.
    ///
    /// Negative or non-finite physiology means a caller corrupted the state;
    /// such states are rejected instead of being mapped onto a valid key.
    pub fn discretize(&self) -> Result<StateKey, ContractViolation> {
        Self::check_non_negative("fitness", self.fitness)?;
        Self::check_non_negative("fatigue", self.fatigue)?;
        Self::check_non_negative("weekly_volume", self.weekly_volume)?;
        Self::check_non_negative("injury_risk", self.injury_risk)?;
        Self::check_finite("vo2_speed_kmh", self.vo2_speed_kmh)?;
        Self::check_finite("temperature_c", self.temperature_c)?;

        Ok(StateKey {
            fitness: (self.fitness * 10.0).round() as i64,
            fatigue: (self.fatigue * 10.0).round() as i64,
            performance: (self.performance * 10.0).round() as i64,
            speed: (self.vo2_speed_kmh * 2.0).round() as i64,
            weekly_volume: (self.weekly_volume / 10.0).round() as i64,
            injury_risk: (self.injury_risk * 10.0).round() as i64,
            days_remaining: self.days_remaining.min(DAYS_REMAINING_CAP),
            temperature: (self.temperature_c / 5.0).round() as i64,
        })
    }

    fn push_session(&mut self, session: SessionLog) {
        self.recent_sessions.push_back(session);
        while self.recent_sessions.len() > HISTORY_WINDOW {
            self.recent_sessions.pop_front();
        }
        self.weekly_volume = self
            .recent_sessions
            .iter()
            .map(|s| f64::from(s.duration_minutes))
            .sum();
    }

    fn refresh_derived(&mut self) {
        self.performance = (self.fitness - self.fatigue) / 2.0;
        self.form = self.fitness - 2.0 * self.fatigue;
    }

    fn check_finite(field: &'static str, value: f64) -> Result<(), ContractViolation> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(ContractViolation::MalformedState { field, value })
        }
    }

    fn check_non_negative(field: &'static str, value: f64) -> Result<(), ContractViolation> {
        Self::check_finite(field, value)?;
        if value < 0.0 {
            return Err(ContractViolation::MalformedState { field, value });
        }
        Ok(())
    }
}

impl Default for PhysiologicalState {
    fn default() -> Self {
        Self::new(DAYS_REMAINING_CAP, &AthleteBaseline::default())
    }
}

/// Discretized state used as Q-table and model index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    pub fitness: i64,
    pub fatigue: i64,
    pub performance: i64,
    pub speed: i64,
    pub weekly_volume: i64,
    pub injury_risk: i64,
    pub days_remaining: u32,
    pub temperature: i64,
}

impl StateKey {
    const TEXT_VERSION: &'static str = "v1";
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            Self::TEXT_VERSION,
            self.fitness,
            self.fatigue,
            self.performance,
            self.speed,
            self.weekly_volume,
            self.injury_risk,
            self.days_remaining,
            self.temperature
        )
    }
}

impl FromStr for StateKey {
    type Err = ContractViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: String| ContractViolation::MalformedKey {
            text: s.to_string(),
            reason,
        };

        let parts: Vec<&str> = s.split('|').collect();
        if parts.len() != 9 {
            return Err(malformed("expected 9 '|' separated fields".to_string()));
        }
        if parts[0] != Self::TEXT_VERSION {
            return Err(malformed("unsupported key version".to_string()));
        }

        let int = |index: usize, name: &str| {
            parts[index]
                .parse::<i64>()
                .map_err(|_| malformed(format!("{} is not an integer", name)))
        };

        let days_remaining = parts[7]
            .parse::<u32>()
            .map_err(|_| malformed("days_remaining is not an unsigned integer".to_string()))?;
        if days_remaining > DAYS_REMAINING_CAP {
            return Err(malformed(format!(
                "days_remaining above cap of {}",
                DAYS_REMAINING_CAP
            )));
        }

        let key = StateKey {
            fitness: int(1, "fitness")?,
            fatigue: int(2, "fatigue")?,
            performance: int(3, "performance")?,
            speed: int(4, "speed")?,
            weekly_volume: int(5, "weekly_volume")?,
            injury_risk: int(6, "injury_risk")?,
            days_remaining,
            temperature: int(8, "temperature")?,
        };
        if key.to_string() != s {
            return Err(malformed("not in canonical form".to_string()));
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endurance() -> TrainingAction {
        TrainingAction::new(TrainingType::Endurance, 60, 0.7, 2).unwrap()
    }

    #[test]
    fn test_default_state() {
        let state = PhysiologicalState::default();
        assert_eq!(state.fitness(), 0.0);
        assert_eq!(state.fatigue(), 0.0);
        assert_eq!(state.performance(), 0.0);
        assert_eq!(state.form(), 0.0);
        assert_eq!(state.days_remaining(), 120);
        assert_eq!(state.recent_training_types().count(), 0);
    }

    #[test]
    fn test_heart_rate_zones_from_max_hr() {
        let zones = HeartRateZones::from_max_hr(194);
        assert_eq!(zones.bounds(HeartRateZone::new(1).unwrap()), (97, 116));
        assert_eq!(zones.bounds(HeartRateZone::new(2).unwrap()), (116, 135));
        assert_eq!(zones.bounds(HeartRateZone::new(4).unwrap()), (155, 174));
        assert_eq!(zones.bounds(HeartRateZone::new(5).unwrap()), (174, 194));
    }

    #[test]
    fn test_impulse_response_update() {
        let model = ImpulseResponse::default();
        let (fitness, fatigue) = model.apply(1.0, 1.0, 0.5);

        assert!((fitness - (0.5 + (-1.0f64 / 45.0).exp())).abs() < 1e-12);
        assert!((fatigue - (0.5 + (-1.0f64 / 15.0).exp())).abs() < 1e-12);
    }

    #[test]
    fn test_fatigue_decays_faster_than_fitness() {
        let model = ImpulseResponse::default();
        let state = PhysiologicalState::default().with_load(1.0, 1.0);
        let next = state.advance(&TrainingAction::rest(), 0.0, &model);

        assert!(next.fatigue() < next.fitness());
        assert!(next.form() > state.form());
    }

    #[test]
    fn test_derived_values_follow_update() {
        let model = ImpulseResponse::default();
        let next = PhysiologicalState::default()
            .with_load(0.8, 0.3)
            .advance(&endurance(), 0.2, &model);

        assert!((next.performance() - (next.fitness() - next.fatigue()) / 2.0).abs() < 1e-12);
        assert!((next.form() - (next.fitness() - 2.0 * next.fatigue())).abs() < 1e-12);
    }

    #[test]
    fn test_advance_does_not_touch_original() {
        let model = ImpulseResponse::default();
        let state = PhysiologicalState::default();
        let next = state.advance(&endurance(), 0.3, &model);

        assert_eq!(state.fitness(), 0.0);
        assert_eq!(state.days_remaining(), 120);
        assert_eq!(next.days_remaining(), 119);
        assert_eq!(next.weekly_volume(), 60.0);
    }

    #[test]
    fn test_history_window_keeps_last_seven() {
        let model = ImpulseResponse::default();
        let mut state = PhysiologicalState::default();
        state = state.advance(
            &TrainingAction::new(TrainingType::LongRun, 120, 0.7, 2).unwrap(),
            0.1,
            &model,
        );
        for _ in 0..7 {
            state = state.advance(&TrainingAction::rest(), 0.0, &model);
        }

        let types: Vec<TrainingType> = state.recent_training_types().collect();
        assert_eq!(types, vec![TrainingType::Rest; 7]);
        assert_eq!(state.weekly_volume(), 0.0);
    }

    #[test]
    fn test_projected_weekly_volume_drops_oldest_session() {
        let sessions = std::iter::repeat(SessionLog {
            training_type: TrainingType::Endurance,
            duration_minutes: 60,
        })
        .take(7);
        let state = PhysiologicalState::default().with_history(sessions);

        assert_eq!(state.weekly_volume(), 420.0);
        assert_eq!(state.projected_weekly_volume(90), 450.0);
    }

    #[test]
    fn test_discretize_rounds_and_caps() {
        let state = PhysiologicalState::default()
            .with_load(1.24, 0.36)
            .with_days_remaining(150);
        let key = state.discretize().unwrap();

        assert_eq!(key.fitness, 12);
        assert_eq!(key.fatigue, 4);
        assert_eq!(key.performance, 4);
        assert_eq!(key.speed, 30);
        assert_eq!(key.days_remaining, 120);
        assert_eq!(key.temperature, 4);
    }

    #[test]
    fn test_nearby_states_collide() {
        let a = PhysiologicalState::default().with_load(0.501, 0.199);
        let b = PhysiologicalState::default().with_load(0.504, 0.196);
        assert_eq!(a.discretize().unwrap(), b.discretize().unwrap());
    }

    #[test]
    fn test_discretize_rejects_malformed_state() {
        let state = PhysiologicalState::default().with_load(f64::NAN, 0.0);
        assert!(matches!(
            state.discretize(),
            Err(ContractViolation::MalformedState { field: "fitness", .. })
        ));

        let state = PhysiologicalState::default().with_load(0.5, -0.1);
        assert!(matches!(
            state.discretize(),
            Err(ContractViolation::MalformedState { field: "fatigue", .. })
        ));
    }

    #[test]
    fn test_state_key_text_round_trip() {
        let key = PhysiologicalState::default()
            .with_load(2.0, 3.0)
            .discretize()
            .unwrap();
        let text = key.to_string();

        assert!(text.starts_with("v1|20|30|-5|"));
        assert_eq!(text.parse::<StateKey>().unwrap(), key);
        assert!("v1|1|2|3".parse::<StateKey>().is_err());
        assert!("v1|a|0|0|30|0|0|120|4".parse::<StateKey>().is_err());
        assert!("v1|0|0|0|30|0|0|121|4".parse::<StateKey>().is_err());
        assert!("v1|0|0|0|30|0|0|120|4".parse::<StateKey>().is_ok());
        assert!("v1|+5|0|0|30|0|0|120|4".parse::<StateKey>().is_err());
        assert!("v1|05|0|0|30|0|0|120|4".parse::<StateKey>().is_err());
        assert!("v1|-0|0|0|30|0|0|120|4".parse::<StateKey>().is_err());
    }
}
