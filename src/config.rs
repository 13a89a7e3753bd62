use std::time::Duration;

use crate::cli::Cli;
use crate::config_file::ConfigFile;
use crate::job::ErrorStrategy;
use crate::parallel::PoolConfig;

/// Resolved settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct RecordflowConfig {
    pub pool: PoolConfig,
    pub on_error: ErrorStrategy,
    pub read_timeout: Option<Duration>,
    pub json: bool,
    pub verbosity: u8,
}

impl Default for RecordflowConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            on_error: ErrorStrategy::default(),
            read_timeout: None,
            json: false,
            verbosity: 0,
        }
    }
}

impl RecordflowConfig {
    /// Create configuration from CLI arguments layered over file settings
    pub fn from_cli(cli: &Cli, file: &ConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            pool: PoolConfig {
                workers: cli.threads.or(file.threads).unwrap_or(defaults.pool.workers),
            },
            on_error: cli.on_error.or(file.on_error).unwrap_or(defaults.on_error),
            read_timeout: cli.read_timeout.or(file.read_timeout),
            json: cli.json,
            verbosity: cli.verbose,
        }
    }

    /// Pool for a run whose jobs block on each other: at least one worker per job
    pub fn pool_for(&self, dependent_jobs: usize) -> PoolConfig {
        PoolConfig {
            workers: self.pool.workers.max(dependent_jobs),
        }
    }
}
