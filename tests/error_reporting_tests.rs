//! Integration tests for error classification and contract enforcement

use dynarun::error::{ErrorSeverity, PersistenceError};
use dynarun::persistence::from_json;
use dynarun::{
    ActionKey, ContractViolation, DynaRunError, EnvironmentConfig, MarathonEnvironment,
    PhysiologicalState, StateKey, TrainingAction, TrainingType,
};

#[test]
fn test_invalid_zone_fails_fast() {
    let result = TrainingAction::new(TrainingType::Endurance, 60, 0.7, 6);
    assert_eq!(result, Err(ContractViolation::InvalidZone { zone: 6 }));

    let result = TrainingAction::new(TrainingType::Endurance, 60, 0.7, 0);
    assert!(result.is_err());
}

#[test]
fn test_invalid_intensity_fails_fast() {
    let result = TrainingAction::new(TrainingType::Interval, 30, 1.2, 5);
    assert!(matches!(
        result,
        Err(ContractViolation::InvalidIntensity { .. })
    ));
    assert!(TrainingAction::new(TrainingType::Interval, 30, f64::NAN, 5).is_err());
}

#[test]
fn test_unknown_training_type() {
    let result = "yoga".parse::<TrainingType>();
    assert_eq!(
        result,
        Err(ContractViolation::UnknownTrainingType {
            name: "yoga".to_string()
        })
    );
}

#[test]
fn test_malformed_key_text() {
    assert!("v2|rest|0|0|1".parse::<ActionKey>().is_err());
    assert!("v1|rest|0|0|6".parse::<ActionKey>().is_err());
    assert!("v1|rest|0|11|1".parse::<ActionKey>().is_err());
    assert!("v1|rest|0|0".parse::<ActionKey>().is_err());
    assert!("v1|0|0|0|30|0|0|120".parse::<StateKey>().is_err());
}

#[test]
fn test_step_after_episode_end_is_critical() {
    let mut env = MarathonEnvironment::new(EnvironmentConfig {
        horizon_days: 1,
        ..EnvironmentConfig::default()
    })
    .unwrap();
    env.reset();
    env.step(&TrainingAction::rest()).unwrap();

    let err = env.step(&TrainingAction::rest()).unwrap_err();
    assert_eq!(err.severity(), ErrorSeverity::Critical);
    assert_eq!(err.severity().to_tracing_level(), tracing::Level::ERROR);
}

#[test]
fn test_unsafe_action_is_an_outcome_not_an_error() {
    let mut env = MarathonEnvironment::new(EnvironmentConfig::default()).unwrap();
    env.reset_to(PhysiologicalState::default().with_load(0.2, 0.5));

    let hard = TrainingAction::new(TrainingType::Interval, 45, 0.9, 5).unwrap();
    let outcome = env.step(&hard).unwrap();

    assert!(outcome.done);
    assert_eq!(outcome.error_tag(), Some("unsafe_action"));
}

#[test]
fn test_corrupted_snapshot_messages() {
    let err = from_json("{ not json").unwrap_err();
    assert!(matches!(
        err,
        DynaRunError::Persistence(PersistenceError::Json(_))
    ));
    assert_eq!(err.severity(), ErrorSeverity::Error);
    assert!(err.user_message().contains("corrupted"));
}

#[test]
fn test_configuration_errors() {
    let err = MarathonEnvironment::new(EnvironmentConfig {
        horizon_days: 500,
        ..EnvironmentConfig::default()
    })
    .unwrap_err();

    assert!(matches!(err, DynaRunError::Configuration(_)));
    assert!(err.user_message().starts_with("Invalid configuration"));
}
