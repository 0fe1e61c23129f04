//! Discrete training actions and the per-type constraint table
//!
//! Every action is a (type, duration, intensity, heart-rate zone) tuple. Which
//! combinations make sense is decided by a single table,
//! [`TrainingType::constraints`], that both the action generator and the
//! reward shaper read from.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ContractViolation;

/// Kinds of training session the planner can schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrainingType {
    Rest,
    Endurance,
    Threshold,
    Interval,
    HillRepeats,
    Fartlek,
    LongRun,
    CrossBike,
    CrossSwim,
    Strength,
}

impl TrainingType {
    /// All training types in action-generation order
    pub const ALL: [TrainingType; 10] = [
        TrainingType::Rest,
        TrainingType::Endurance,
        TrainingType::Threshold,
        TrainingType::Interval,
        TrainingType::HillRepeats,
        TrainingType::Fartlek,
        TrainingType::LongRun,
        TrainingType::CrossBike,
        TrainingType::CrossSwim,
        TrainingType::Strength,
    ];

    /// Stable machine name, also used in key text and CSV exports
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingType::Rest => "rest",
            TrainingType::Endurance => "endurance",
            TrainingType::Threshold => "threshold",
            TrainingType::Interval => "interval",
            TrainingType::HillRepeats => "hill-repeats",
            TrainingType::Fartlek => "fartlek",
            TrainingType::LongRun => "long-run",
            TrainingType::CrossBike => "cross-bike",
            TrainingType::CrossSwim => "cross-swim",
            TrainingType::Strength => "strength",
        }
    }

    /// Multiplier applied to the raw session load
    pub fn load_factor(&self) -> f64 {
        match self {
            TrainingType::Interval | TrainingType::HillRepeats => 1.1,
            TrainingType::LongRun => 1.3,
            TrainingType::Endurance => 1.2,
            TrainingType::CrossBike => 0.9,
            TrainingType::CrossSwim => 0.8,
            TrainingType::Strength => 0.6,
            TrainingType::Rest | TrainingType::Threshold | TrainingType::Fartlek => 1.0,
        }
    }

    /// Human readable session description
    pub fn description(&self) -> &'static str {
        match self {
            TrainingType::Rest => "Rest day for recovery",
            TrainingType::Endurance => "Endurance run at a conversational pace",
            TrainingType::Threshold => "Anaerobic threshold session",
            TrainingType::Interval => "High-intensity interval session",
            TrainingType::HillRepeats => "Hill repeats",
            TrainingType::Fartlek => "Fartlek speed play",
            TrainingType::LongRun => "Long run",
            TrainingType::CrossBike => "Cross-training on the bike",
            TrainingType::CrossSwim => "Cross-training in the pool",
            TrainingType::Strength => "Strength and conditioning",
        }
    }

    /// Allowed durations, zones and intensity for this type.
    ///
    /// The match is exhaustive, so adding a training type without a
    /// constraint record does not compile.
    pub fn constraints(&self) -> TypeConstraints {
        match self {
            TrainingType::Rest => TypeConstraints {
                durations: &[0],
                zones: &[1],
                requires_effort: false,
            },
            TrainingType::Endurance => TypeConstraints {
                durations: &[45, 60, 90],
                zones: &[2, 3],
                requires_effort: true,
            },
            TrainingType::Threshold => TypeConstraints {
                durations: &[30, 45],
                zones: &[4],
                requires_effort: true,
            },
            TrainingType::Interval | TrainingType::HillRepeats => TypeConstraints {
                durations: &[30, 45],
                zones: &[4, 5],
                requires_effort: true,
            },
            TrainingType::Fartlek => TypeConstraints {
                durations: &[30, 45],
                zones: &[3, 4],
                requires_effort: true,
            },
            TrainingType::LongRun => TypeConstraints {
                durations: &[90, 120],
                zones: &[2],
                requires_effort: true,
            },
            TrainingType::CrossBike => TypeConstraints {
                durations: &[30, 45, 60],
                zones: &[2, 3],
                requires_effort: true,
            },
            TrainingType::CrossSwim => TypeConstraints {
                durations: &[30, 45],
                zones: &[2, 3],
                requires_effort: true,
            },
            TrainingType::Strength => TypeConstraints {
                durations: &[30, 45],
                zones: &[1, 2],
                requires_effort: true,
            },
        }
    }
}

impl fmt::Display for TrainingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrainingType {
    type Err = ContractViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrainingType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ContractViolation::UnknownTrainingType {
                name: s.to_string(),
            })
    }
}

/// Constraint record for one training type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeConstraints {
    /// Approved session durations in minutes
    pub durations: &'static [u32],
    /// Approved heart-rate zones
    pub zones: &'static [u8],
    /// Training sessions need a non-zero intensity, rest needs exactly zero
    pub requires_effort: bool,
}

impl TypeConstraints {
    pub fn allows_duration(&self, minutes: u32) -> bool {
        self.durations.contains(&minutes)
    }

    pub fn allows_zone(&self, zone: HeartRateZone) -> bool {
        self.zones.contains(&zone.number())
    }

    pub fn allows_intensity(&self, intensity: f64) -> bool {
        if self.requires_effort {
            intensity > 0.0
        } else {
            intensity == 0.0
        }
    }
}

/// Heart-rate zone, always within 1..=5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct HeartRateZone(u8);

impl HeartRateZone {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(zone: u8) -> Result<Self, ContractViolation> {
        if (Self::MIN..=Self::MAX).contains(&zone) {
            Ok(HeartRateZone(zone))
        } else {
            Err(ContractViolation::InvalidZone { zone })
        }
    }

    pub fn number(&self) -> u8 {
        self.0
    }

    /// Exponent weight of the zone in the training-load formula
    pub fn load_weight(&self) -> f64 {
        f64::from(self.0)
    }

    pub fn label(&self) -> &'static str {
        match self.0 {
            1 => "Zone 1 (active recovery)",
            2 => "Zone 2 (aerobic endurance)",
            3 => "Zone 3 (aerobic threshold)",
            4 => "Zone 4 (anaerobic threshold)",
            _ => "Zone 5 (VO2max)",
        }
    }

    /// Iterate over all five zones
    pub fn all() -> impl Iterator<Item = HeartRateZone> {
        (Self::MIN..=Self::MAX).map(HeartRateZone)
    }
}

impl TryFrom<u8> for HeartRateZone {
    type Error = ContractViolation;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        HeartRateZone::new(value)
    }
}

impl From<HeartRateZone> for u8 {
    fn from(zone: HeartRateZone) -> Self {
        zone.0
    }
}

/// One day's training prescription
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingAction {
    training_type: TrainingType,
    duration_minutes: u32,
    intensity: f64,
    zone: HeartRateZone,
}

impl TrainingAction {
    /// Build an action. The fields are range-checked here; whether the
    /// combination suits the type is a separate question, see [`is_valid`](Self::is_valid).
    pub fn new(
        training_type: TrainingType,
        duration_minutes: u32,
        intensity: f64,
        zone: u8,
    ) -> Result<Self, ContractViolation> {
        if !intensity.is_finite() || !(0.0..=1.0).contains(&intensity) {
            return Err(ContractViolation::InvalidIntensity { value: intensity });
        }

        Ok(TrainingAction {
            training_type,
            duration_minutes,
            intensity,
            zone: HeartRateZone::new(zone)?,
        })
    }

    /// The single rest action: no duration, no intensity, zone 1
    pub fn rest() -> Self {
        TrainingAction {
            training_type: TrainingType::Rest,
            duration_minutes: 0,
            intensity: 0.0,
            zone: HeartRateZone(1),
        }
    }

    pub fn training_type(&self) -> TrainingType {
        self.training_type
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub fn zone(&self) -> HeartRateZone {
        self.zone
    }

    pub fn is_rest(&self) -> bool {
        self.training_type == TrainingType::Rest
    }

    /// Type-specific validity predicate
    pub fn is_valid(&self) -> bool {
        let constraints = self.training_type.constraints();
        constraints.allows_duration(self.duration_minutes)
            && constraints.allows_zone(self.zone)
            && constraints.allows_intensity(self.intensity)
    }

    /// Table key for this action
    pub fn key(&self) -> ActionKey {
        ActionKey {
            training_type: self.training_type,
            duration_minutes: self.duration_minutes,
            intensity_tenths: (self.intensity * 10.0).round() as u8,
            zone: self.zone,
        }
    }
}

impl fmt::Display for TrainingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_rest() {
            return write!(f, "rest");
        }
        write!(
            f,
            "{} {}min @{:.0}% Z{}",
            self.training_type,
            self.duration_minutes,
            self.intensity * 100.0,
            self.zone.number()
        )
    }
}

/// Q-table and model index for an action.
///
/// Intensity is stored in tenths, which is exact for every generated action,
/// so distinct actions of the action space never share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionKey {
    pub training_type: TrainingType,
    pub duration_minutes: u32,
    pub intensity_tenths: u8,
    pub zone: HeartRateZone,
}

impl ActionKey {
    const TEXT_VERSION: &'static str = "v1";

    /// Rebuild the action this key denotes
    pub fn to_action(&self) -> Result<TrainingAction, ContractViolation> {
        if self.intensity_tenths > 10 {
            return Err(ContractViolation::InvalidIntensity {
                value: f64::from(self.intensity_tenths) / 10.0,
            });
        }
        TrainingAction::new(
            self.training_type,
            self.duration_minutes,
            f64::from(self.intensity_tenths) / 10.0,
            self.zone.number(),
        )
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}",
            Self::TEXT_VERSION,
            self.training_type,
            self.duration_minutes,
            self.intensity_tenths,
            self.zone.number()
        )
    }
}

impl FromStr for ActionKey {
    type Err = ContractViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| ContractViolation::MalformedKey {
            text: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.split('|').collect();
        if parts.len() != 5 {
            return Err(malformed("expected 5 '|' separated fields"));
        }
        if parts[0] != Self::TEXT_VERSION {
            return Err(malformed("unsupported key version"));
        }

        let training_type = parts[1].parse::<TrainingType>()?;
        let duration_minutes = parts[2]
            .parse::<u32>()
            .map_err(|_| malformed("duration is not an unsigned integer"))?;
        let intensity_tenths = parts[3]
            .parse::<u8>()
            .map_err(|_| malformed("intensity is not an unsigned integer"))?;
        if intensity_tenths > 10 {
            return Err(malformed("intensity above 10 tenths"));
        }
        let zone = parts[4]
            .parse::<u8>()
            .map_err(|_| malformed("zone is not an unsigned integer"))
            .and_then(HeartRateZone::new)?;

        let key = ActionKey {
            training_type,
            duration_minutes,
            intensity_tenths,
            zone,
        };
        if key.to_string() != s {
            return Err(malformed("not in canonical form"));
        }
        Ok(key)
    }
}

/// The fixed set of valid actions an agent chooses from
#[derive(Debug, Clone)]
pub struct ActionSpace {
    actions: Vec<TrainingAction>,
    keys: Vec<ActionKey>,
    index: HashMap<ActionKey, usize>,
}

impl ActionSpace {
    /// Candidate durations for training sessions (minutes)
    pub const DURATIONS: [u32; 5] = [30, 45, 60, 90, 120];

    /// Candidate intensities for training sessions
    pub const INTENSITIES: [f64; 4] = [0.6, 0.7, 0.8, 0.9];

    /// Enumerate every valid action: one rest action followed by the
    /// filtered product of type × duration × intensity × zone.
    pub fn generate() -> Self {
        let mut actions = vec![TrainingAction::rest()];

        for training_type in TrainingType::ALL
            .iter()
            .copied()
            .filter(|t| *t != TrainingType::Rest)
        {
            for duration in Self::DURATIONS {
                for intensity in Self::INTENSITIES {
                    for zone in HeartRateZone::all() {
                        let action = TrainingAction {
                            training_type,
                            duration_minutes: duration,
                            intensity,
                            zone,
                        };
                        if action.is_valid() {
                            actions.push(action);
                        }
                    }
                }
            }
        }

        let keys: Vec<ActionKey> = actions.iter().map(TrainingAction::key).collect();
        let index = keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();

        tracing::debug!(count = actions.len(), "Generated action space");

        ActionSpace {
            actions,
            keys,
            index,
        }
    }

    pub fn actions(&self) -> &[TrainingAction] {
        &self.actions
    }

    /// Keys in the same order as [`actions`](Self::actions)
    pub fn keys(&self) -> &[ActionKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TrainingAction> {
        self.actions.get(index)
    }

    pub fn index_of(&self, key: &ActionKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn contains(&self, key: &ActionKey) -> bool {
        self.index.contains_key(key)
    }
}

impl Default for ActionSpace {
    fn default() -> Self {
        Self::generate()
    }
}
