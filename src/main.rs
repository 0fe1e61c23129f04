use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};

use dynarun::export::{self, ExportFormat};
use dynarun::logging::init_logging;
use dynarun::persistence::{load_agent, save_agent};
use dynarun::report::TrainingPhase;
use dynarun::state::SessionLog;
use dynarun::{
    DynaQAgent, MarathonEnvironment, PhysiologicalState, PlanReport, PlannerConfig, Trainer,
    TrainingType,
};

/// dynarun - Marathon Training Planner
///
/// Learns a day-by-day marathon preparation policy with Dyna-Q and
/// prioritized sweeping over a simulated fitness/fatigue model.
#[derive(Parser)]
#[command(name = "dynarun")]
#[command(version)]
#[command(about = "Model-based marathon training planner", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train an agent and save it
    Train {
        /// Number of episodes (overrides config)
        #[arg(short, long)]
        episodes: Option<usize>,

        /// RNG seed (overrides config)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Where to save the trained agent
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show a progress bar
        #[arg(short, long)]
        progress: bool,
    },

    /// Roll out the trained policy into a training plan
    Plan {
        /// Trained agent file
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Race date (YYYY-MM-DD) used to date each day
        #[arg(short, long)]
        race_date: Option<String>,

        /// Export the plan (format from extension: .csv or .json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of days to print
        #[arg(short, long, default_value = "14")]
        limit: usize,
    },

    /// Recommend the next session for a given athlete state
    Recommend {
        /// Trained agent file
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Current fitness
        #[arg(long, default_value = "0.0")]
        fitness: f64,

        /// Current fatigue
        #[arg(long, default_value = "0.0")]
        fatigue: f64,

        /// Days until the race
        #[arg(short, long)]
        days: u32,

        /// Recent sessions, oldest first, as type:minutes (e.g. long-run:120)
        #[arg(long, value_delimiter = ',')]
        recent: Vec<String>,
    },

    /// Show or initialize the configuration
    Config {
        /// Print the effective configuration
        #[arg(short, long)]
        list: bool,

        /// Write the default configuration to the config path
        #[arg(long)]
        init: bool,
    },
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Day")]
    day: u32,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Session")]
    session: String,
    #[tabled(rename = "Minutes")]
    minutes: u32,
    #[tabled(rename = "Zone")]
    zone: u8,
    #[tabled(rename = "Fitness")]
    fitness: String,
    #[tabled(rename = "Fatigue")]
    fatigue: String,
    #[tabled(rename = "Form")]
    form: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config_path, mut config) = match cli.config.clone() {
        Some(path) => {
            let config = PlannerConfig::load_from_file(&path)?;
            (path, config)
        }
        None => {
            let path = PlannerConfig::default_config_path();
            let config = PlannerConfig::load_or_default(&path);
            (path, config)
        }
    };

    let mut log_config = config.logging.clone();
    log_config.level = log_config.level.with_verbosity(cli.verbose);
    init_logging(&log_config)?;

    match cli.command {
        Commands::Train {
            episodes,
            seed,
            output,
            progress,
        } => {
            if let Some(episodes) = episodes {
                config.training.episodes = episodes;
            }
            if seed.is_some() {
                config.agent.seed = seed;
            }
            config.training.show_progress |= progress;
            let output = output.unwrap_or_else(|| config.model_path.clone());

            println!("{}", "Training agent...".green().bold());
            println!("  Episodes: {}", config.training.episodes);
            println!("  Horizon: {} days", config.environment.horizon_days);

            let mut agent = DynaQAgent::new(config.agent.clone())?;
            let mut env = MarathonEnvironment::new(config.environment.clone())?;
            let trainer = Trainer::new(config.training.clone())?;
            let summary = trainer.run(&mut agent, &mut env)?;

            save_agent(&agent, &output)?;

            println!("{}", "✓ Training completed".green());
            println!(
                "  Mean reward: {:.2} (σ {:.2})",
                summary.mean_reward, summary.reward_std_dev
            );
            println!(
                "  Last 100 episodes: {:.2}",
                summary.recent_mean_reward(100)
            );
            println!("  Unsafe terminations: {:.1}%", summary.unsafe_rate * 100.0);
            println!(
                "  States visited: {}, model transitions: {}",
                summary.states_visited, summary.model_transitions
            );
            println!("  Saved to {}", output.display());
        }

        Commands::Plan {
            model,
            race_date,
            output,
            limit,
        } => {
            let model = model.unwrap_or_else(|| config.model_path.clone());
            let mut agent = load_agent(&model)?;
            let mut env = MarathonEnvironment::new(config.environment.clone())?;

            println!("{}", "Generating training plan...".cyan().bold());
            let mut plan = PlanReport::generate(&mut agent, &mut env)?;
            if let Some(date) = race_date {
                let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .with_context(|| format!("Invalid race date: {}", date))?;
                plan = plan.with_race_date(date);
            }

            print_plan(&plan, limit);

            if let Some(output) = output {
                let format = ExportFormat::from_path(&output).unwrap_or(ExportFormat::Csv);
                export::export_plan(&plan, format, &output)?;
                println!("{} {}", "✓ Plan exported to".cyan(), output.display());
            }
        }

        Commands::Recommend {
            model,
            fitness,
            fatigue,
            days,
            recent,
        } => {
            let model = model.unwrap_or_else(|| config.model_path.clone());
            let agent = load_agent(&model)?;

            let sessions = recent
                .iter()
                .map(|entry| parse_session(entry))
                .collect::<Result<Vec<_>>>()?;
            let state = PhysiologicalState::new(days, &config.environment.athlete)
                .with_load(fitness, fatigue)
                .with_history(sessions);

            println!("{}", "Recommending next session...".magenta().bold());
            match agent.recommend(&state)? {
                Some(recommendation) => {
                    println!("  {}", recommendation.to_string().bold());
                    println!("  {}", recommendation.description);
                    println!("  Expected value: {:.3}", recommendation.confidence);
                }
                None => {
                    println!(
                        "{}",
                        "  The agent has not learned this state yet; train longer or adjust the inputs."
                            .yellow()
                    );
                }
            }
        }

        Commands::Config { list, init } => {
            if init {
                config.save_to_file(&config_path)?;
                println!(
                    "{} {}",
                    "✓ Configuration written to".white().bold(),
                    config_path.display()
                );
            }
            if list || !init {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

fn parse_session(entry: &str) -> Result<SessionLog> {
    let (name, minutes) = entry
        .split_once(':')
        .with_context(|| format!("Expected type:minutes, got '{}'", entry))?;
    Ok(SessionLog {
        training_type: name.trim().parse::<TrainingType>()?,
        duration_minutes: minutes
            .trim()
            .parse()
            .with_context(|| format!("Invalid minutes in '{}'", entry))?,
    })
}

fn print_plan(plan: &PlanReport, limit: usize) {
    let rows: Vec<PlanRow> = plan
        .days
        .iter()
        .take(limit)
        .map(|d| PlanRow {
            day: d.day,
            date: d.date.map(|date| date.to_string()).unwrap_or_default(),
            session: d.training_type.to_string(),
            minutes: d.duration_minutes,
            zone: d.zone,
            fitness: format!("{:.3}", d.fitness),
            fatigue: format!("{:.3}", d.fatigue),
            form: format!("{:.3}", d.form),
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()));

    let summary = &plan.summary;
    println!("\n{}", "Plan summary".bold());
    println!("  Days: {} ({} training days)", summary.total_days, summary.training_days);
    println!("  Long runs: {}", summary.long_runs);
    println!("  Total volume: {} min", summary.total_volume_minutes);
    println!("  Final performance: {:.3}", summary.final_performance);
    if summary.unsafe_termination {
        println!("{}", "  Rollout stopped by the safety gate".red());
    }

    for (phase, counts) in plan.phase_distribution() {
        let mix: Vec<String> = counts
            .iter()
            .map(|(training_type, count)| format!("{} {}", training_type, count))
            .collect();
        println!("  {:<9} {}", label(phase), mix.join(", "));
    }
}

fn label(phase: TrainingPhase) -> String {
    format!("{}:", phase.as_str())
}
