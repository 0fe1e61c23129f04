use dynarun::persistence::{load_agent, save_agent};
use dynarun::{
    AgentConfig, DynaQAgent, EnvironmentConfig, EpisodeStatus, MarathonEnvironment,
    PhysiologicalState, PlanReport, Trainer, TrainingAction, TrainingConfig, TrainingType,
};

/// Integration tests that exercise complete planner workflows

#[cfg(test)]
mod integration_tests {
    use super::*;
    use tempfile::tempdir;

    fn seeded_agent(seed: u64) -> DynaQAgent {
        DynaQAgent::new(AgentConfig {
            seed: Some(seed),
            ..AgentConfig::default()
        })
        .unwrap()
    }

    fn environment(horizon_days: u32) -> MarathonEnvironment {
        MarathonEnvironment::new(EnvironmentConfig {
            horizon_days,
            ..EnvironmentConfig::default()
        })
        .unwrap()
    }

    fn long_run() -> TrainingAction {
        TrainingAction::new(TrainingType::LongRun, 120, 0.7, 2).unwrap()
    }

    #[test]
    fn test_action_space_size_and_validity() {
        let agent = seeded_agent(1);
        let space = agent.action_space();

        assert_eq!(space.len(), 145);
        assert_eq!(space.actions()[0], TrainingAction::rest());
        assert!(space.actions().iter().all(TrainingAction::is_valid));

        let mut keys: Vec<_> = space.keys().to_vec();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), space.len());
    }

    #[test]
    fn test_rest_day_from_fresh_athlete() {
        let mut env = environment(120);
        env.reset();

        let outcome = env.step(&TrainingAction::rest()).unwrap();

        assert_eq!(outcome.state.fitness(), 0.0);
        assert_eq!(outcome.state.fatigue(), 0.0);
        assert_eq!(outcome.state.days_remaining(), 119);
        assert!(!outcome.done);
        // rest in zone 1 with its approved duration
        assert_eq!(outcome.breakdown.constraint_bonus, 3.0);
    }

    #[test]
    fn test_long_run_cadence_over_a_week() {
        let mut env = environment(120);
        env.reset_to(PhysiologicalState::default().with_days_remaining(90));

        let first = env.step(&long_run()).unwrap();
        assert_eq!(first.breakdown.long_run_cadence, 4.0);

        for _ in 0..3 {
            env.step(&TrainingAction::rest()).unwrap();
        }

        let second = env.step(&long_run()).unwrap();
        assert!(second.unsafe_reason.is_none());
        assert_eq!(second.breakdown.long_run_cadence, -5.0);

        // once the second long run leaves the window the bonus is back
        for _ in 0..7 {
            env.step(&TrainingAction::rest()).unwrap();
        }
        let third = env.step(&long_run()).unwrap();
        assert_eq!(third.breakdown.long_run_cadence, 4.0);
    }

    #[test]
    fn test_episode_terminates_by_horizon() {
        let mut env = environment(30);
        env.reset();
        let mut steps = 0;

        let state = loop {
            let outcome = env.step(&TrainingAction::rest()).unwrap();
            steps += 1;
            if outcome.done {
                break outcome.state;
            }
        };

        assert_eq!(steps, 30);
        assert_eq!(state.days_remaining(), 0);
        assert_eq!(env.status(), EpisodeStatus::Terminal);
        assert!(env.step(&TrainingAction::rest()).is_err());
    }

    #[test]
    fn test_training_run_statistics() {
        let mut agent = seeded_agent(2024);
        let mut env = environment(28);
        let trainer = Trainer::new(TrainingConfig {
            episodes: 150,
            log_every: 50,
            ..TrainingConfig::default()
        })
        .unwrap();

        let summary = trainer.run(&mut agent, &mut env).unwrap();

        assert_eq!(summary.episodes.len(), 150);
        assert!(summary.states_visited > 0);
        assert!(summary.model_transitions > 0);
        assert!(agent.stats().planning_updates > 0);
        assert!(summary
            .episodes
            .iter()
            .all(|e| e.days_completed <= 28));
    }

    #[test]
    fn test_train_save_load_plan_workflow() {
        let dir = tempdir().unwrap();
        let model_path = dir.path().join("agent.json");

        let mut agent = seeded_agent(77);
        let mut env = environment(21);
        Trainer::new(TrainingConfig {
            episodes: 60,
            log_every: 0,
            ..TrainingConfig::default()
        })
        .unwrap()
        .run(&mut agent, &mut env)
        .unwrap();

        save_agent(&agent, &model_path).unwrap();
        let mut loaded = load_agent(&model_path).unwrap();
        assert_eq!(loaded.state_count(), agent.state_count());

        let start = PhysiologicalState::new(21, &env.config().athlete);
        assert_eq!(
            agent.greedy_action(&start).unwrap(),
            loaded.greedy_action(&start).unwrap()
        );

        let plan = PlanReport::generate(&mut loaded, &mut env).unwrap();
        assert!(!plan.days.is_empty());
        assert!(plan.days.len() <= 21);
        assert_eq!(plan.days[0].day, 1);

        let csv_path = dir.path().join("plan.csv");
        dynarun::export::export_plan(&plan, dynarun::export::ExportFormat::Csv, &csv_path)
            .unwrap();
        let content = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(content.lines().count(), plan.days.len() + 1);
    }

    #[test]
    fn test_recommendation_after_training() {
        let mut agent = seeded_agent(5);
        let mut env = environment(14);
        Trainer::new(TrainingConfig {
            episodes: 40,
            log_every: 0,
            ..TrainingConfig::default()
        })
        .unwrap()
        .run(&mut agent, &mut env)
        .unwrap();

        // every episode starts from the same state, so it is always learned
        let start = PhysiologicalState::new(14, &env.config().athlete);
        let recommendation = agent.recommend(&start).unwrap().unwrap();

        assert!(recommendation.action.is_valid());
        assert!(recommendation.target_heart_rate.0 < recommendation.target_heart_rate.1);
    }
}
