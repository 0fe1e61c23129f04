use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::agent::AgentConfig;
use crate::environment::EnvironmentConfig;
use crate::logging::LogConfig;
use crate::trainer::TrainingConfig;

/// Main planner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Where trained agents are stored
    pub model_path: PathBuf,

    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// Simulation, athlete and safety settings
    pub environment: EnvironmentConfig,

    /// Agent hyperparameters
    pub agent: AgentConfig,

    /// Training loop settings
    pub training: TrainingConfig,

    /// Logging settings
    pub logging: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Default for ConfigMetadata {
    fn default() -> Self {
        let now = Utc::now();
        ConfigMetadata {
            version: "1.0".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            model_path: Self::default_data_dir().join("agent.json"),
            metadata: ConfigMetadata::default(),
            environment: EnvironmentConfig::default(),
            agent: AgentConfig::default(),
            training: TrainingConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

/// Configuration management implementation
impl PlannerConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: PlannerConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Check every section
    pub fn validate(&self) -> crate::error::Result<()> {
        self.environment.validate()?;
        self.agent.validate()?;
        self.training.validate()?;
        Ok(())
    }

    /// `~/.dynarun`
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dynarun")
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default<P: AsRef<Path>>(config_path: P) -> Self {
        let config_path = config_path.as_ref();

        match Self::load_from_file(config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(
                    path = %config_path.display(),
                    error = %e,
                    "Using default configuration"
                );
                Self::default()
            }
        }
    }
}
