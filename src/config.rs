use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::dao::UserPolicy;
use crate::db::{DatabaseOptions, MigrationStrategy, Schema};

#[derive(Parser, Debug)]
#[command(name = "postboard", about = "Open and inspect the postboard store")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// What to do when the on-disk schema version differs
    #[arg(long, value_enum)]
    pub migration: Option<MigrationStrategy>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub users: UserPolicy,
    pub notifications: NotificationConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub pool_size: u32,
    pub migration: MigrationStrategy,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct NotificationConfig {
    /// Pending change events per table before slow subscribers lag.
    pub channel_capacity: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: 4,
            migration: MigrationStrategy::default(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel_capacity: crate::db::notify::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(migration) = cli.migration {
            config.database.migration = migration;
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("postboard.db"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".postboard")
        })
    }

    /// Falls back to `postboard.db` in the working directory for a config
    /// that never went through [`Config::load`].
    pub fn db_path(&self) -> &Path {
        self.database
            .path
            .as_deref()
            .unwrap_or_else(|| Path::new("postboard.db"))
    }

    pub fn database_options(&self) -> DatabaseOptions {
        DatabaseOptions {
            pool_size: self.database.pool_size,
            migration: self.database.migration,
            schema: Schema::current(),
            channel_capacity: self.notifications.channel_capacity,
        }
    }
}
