//! Property-based tests for the simulation and planning invariants

use dynarun::environment::{training_load, SafetyConfig, SafetyGate};
use dynarun::reward;
use dynarun::state::SessionLog;
use dynarun::{
    ActionSpace, AgentConfig, DynaQAgent, ImpulseResponse, ModelPriorityQueue,
    PhysiologicalState, TrainingAction, TrainingType,
};
use proptest::prelude::*;

fn action_index() -> impl Strategy<Value = usize> {
    0..ActionSpace::generate().len()
}

fn session() -> impl Strategy<Value = SessionLog> {
    let durations = prop::sample::select(vec![0u32, 30, 45, 60, 90, 120]);
    (0..TrainingType::ALL.len(), durations).prop_map(|(index, duration_minutes)| SessionLog {
        training_type: TrainingType::ALL[index],
        duration_minutes,
    })
}

proptest! {
    #[test]
    fn test_rest_strictly_decays_load(
        fitness in 0.001f64..50.0,
        fatigue in 0.001f64..50.0
    ) {
        let model = ImpulseResponse::default();
        let state = PhysiologicalState::default().with_load(fitness, fatigue);
        let next = state.advance(&TrainingAction::rest(), 0.0, &model);

        prop_assert!(next.fitness() < fitness);
        prop_assert!(next.fatigue() < fatigue);
        prop_assert!(next.fitness() > 0.0);
        prop_assert!(next.fatigue() > 0.0);
    }

    #[test]
    fn test_performance_term_is_monotonic(
        fitness in 0.0f64..10.0,
        fatigue in 0.0f64..10.0,
        gain in 0.001f64..5.0
    ) {
        let before = PhysiologicalState::default();
        let lower = PhysiologicalState::default().with_load(fitness, fatigue);
        let higher = PhysiologicalState::default().with_load(fitness + gain, fatigue);
        let rest = TrainingAction::rest();

        let low = reward::shape(&before, &lower, &rest).performance_delta;
        let high = reward::shape(&before, &higher, &rest).performance_delta;
        prop_assert!(high > low);
    }

    #[test]
    fn test_safety_gate_is_deterministic(
        fitness in 0.0f64..3.0,
        fatigue in 0.0f64..3.0,
        history in prop::collection::vec(session(), 0..10),
        index in action_index()
    ) {
        let gate = SafetyGate::new(SafetyConfig::default());
        let state = PhysiologicalState::default()
            .with_load(fitness, fatigue)
            .with_history(history);
        let action = ActionSpace::generate().actions()[index];

        let first = gate.evaluate(&state, &action);
        for _ in 0..3 {
            prop_assert_eq!(gate.evaluate(&state, &action), first);
        }
        if action.is_rest() {
            prop_assert!(first.is_safe());
        }
    }

    #[test]
    fn test_training_load_bounds(index in action_index()) {
        let action = ActionSpace::generate().actions()[index];
        let load = training_load(&action);

        prop_assert!(load >= 0.0);
        prop_assert_eq!(load == 0.0, action.is_rest());
    }

    #[test]
    fn test_discretization_is_deterministic(
        fitness in 0.0f64..20.0,
        fatigue in 0.0f64..20.0,
        days in 0u32..200
    ) {
        let state = PhysiologicalState::default()
            .with_load(fitness, fatigue)
            .with_days_remaining(days);
        let key = state.discretize().unwrap();

        prop_assert_eq!(state.clone().discretize().unwrap(), key);
        prop_assert!(key.days_remaining <= 120);
        prop_assert_eq!(key.to_string().parse::<dynarun::StateKey>().unwrap(), key);
    }

    #[test]
    fn test_colliding_states_share_learned_values(
        jitter in 0.0f64..0.004,
        days_a in 121u32..400,
        days_b in 121u32..400
    ) {
        // fitness 1.01..1.014 with fatigue 0.4 stays in one bucket
        let a = PhysiologicalState::default()
            .with_load(1.01, 0.4)
            .with_days_remaining(days_a);
        let b = PhysiologicalState::default()
            .with_load(1.01 + jitter, 0.4)
            .with_days_remaining(days_b);
        prop_assert_eq!(a.discretize().unwrap(), b.discretize().unwrap());

        let mut agent = DynaQAgent::new(AgentConfig {
            seed: Some(5),
            ..AgentConfig::default()
        })
        .unwrap();
        let long_run = TrainingAction::new(TrainingType::LongRun, 120, 0.7, 2).unwrap();
        let next = a.advance(&long_run, 0.2, &ImpulseResponse::default());
        agent.learn(&a, &long_run, 5.0, &next).unwrap();

        let key_b = b.discretize().unwrap();
        let learned = agent.q_value(&a.discretize().unwrap(), &long_run.key());
        prop_assert!(learned > 0.0);
        prop_assert_eq!(agent.q_value(&key_b, &long_run.key()), learned);
        prop_assert!(agent.has_state(&key_b));
        prop_assert_eq!(agent.greedy_action(&b).unwrap(), Some(long_run));
    }

    #[test]
    fn test_queue_never_holds_duplicates(
        pushes in prop::collection::vec((0.0f64..10.0, 0u8..8), 1..60)
    ) {
        let mut queue = ModelPriorityQueue::new(1e-4);
        for (priority, key) in &pushes {
            queue.push(*priority, *key);
        }

        let mut seen = std::collections::HashSet::new();
        let mut last = f64::INFINITY;
        while let Some((priority, key)) = queue.pop() {
            prop_assert!(seen.insert(key));
            prop_assert!(priority <= last);
            prop_assert!(priority > 1e-4);
            last = priority;
        }
    }
}
