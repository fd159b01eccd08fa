use std::fs;
use std::path::Path;
use std::time::Duration;

use eyre::{Error, WrapErr, ensure};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub board: BoardConfig,
    #[serde(default)]
    pub team: TeamRules,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
    pub url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BoardConfig {
    pub url: String,
    #[serde(default = "default_board_timeout")]
    pub timeout_minutes: u64,
}

/// Composition rules applied to every selected team.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TeamRules {
    pub minimum_size: usize,
    pub require_admin: bool,
    pub require_uiux_designer: bool,
    pub require_product_manager: bool,
    pub require_developer_mix: bool,
}

impl Default for TeamRules {
    fn default() -> Self {
        TeamRules {
            minimum_size: 2,
            require_admin: true,
            require_uiux_designer: true,
            require_product_manager: false,
            require_developer_mix: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_interval_minutes: u64,
    pub max_pending_hours: i64,
    pub new_project_max_age_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            tick_interval_minutes: 15,
            max_pending_hours: 96,
            new_project_max_age_days: 30,
        }
    }
}

fn default_board_timeout() -> u64 {
    5
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, Error> {
        let raw = fs::read_to_string(path)
            .wrap_err_with(|| format!("cannot load configuration file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .wrap_err_with(|| format!("cannot parse configuration file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        ensure!(!self.storage.url.is_empty(), "storage.url must not be empty");
        ensure!(!self.board.url.is_empty(), "board.url must not be empty");
        ensure!(
            self.board.timeout_minutes > 0,
            "board.timeout_minutes must be positive"
        );
        ensure!(
            self.team.minimum_size > 0,
            "team.minimum_size must be positive"
        );
        ensure!(
            self.scheduler.tick_interval_minutes > 0,
            "scheduler.tick_interval_minutes must be positive"
        );
        ensure!(
            self.scheduler.max_pending_hours > 0,
            "scheduler.max_pending_hours must be positive"
        );
        ensure!(
            self.scheduler.new_project_max_age_days > 0,
            "scheduler.new_project_max_age_days must be positive"
        );
        Ok(())
    }
}

impl BoardConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes * 60)
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_minutes * 60)
    }
}
