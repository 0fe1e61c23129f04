// Library interface for dynarun modules
// This allows integration tests and benches to access the core functionality

pub mod action;
pub mod agent;
pub mod config;
pub mod environment;
pub mod error;
pub mod export;
pub mod logging;
pub mod persistence;
pub mod planning;
pub mod recommendation;
pub mod report;
pub mod reward;
pub mod state;
pub mod trainer;

// Re-export commonly used types for convenience
pub use action::{ActionKey, ActionSpace, HeartRateZone, TrainingAction, TrainingType};
pub use agent::{AgentConfig, DynaQAgent};
pub use config::PlannerConfig;
pub use environment::{
    EnvironmentConfig, EpisodeStatus, MarathonEnvironment, SafetyConfig, SafetyGate,
    SafetyVerdict, StepOutcome, UnsafeReason,
};
pub use error::{ContractViolation, DynaRunError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use planning::{ModelPriorityQueue, PlanningStore, StateActionKey, Transition};
pub use recommendation::TrainingRecommendation;
pub use report::{DayRecord, PlanReport, TrainingPhase};
pub use reward::RewardBreakdown;
pub use state::{AthleteBaseline, ImpulseResponse, PhysiologicalState, StateKey};
pub use trainer::{Trainer, TrainingConfig, TrainingSummary};
