//! Configuration management for the unicfg server
//!
//! Settings are layered lowest to highest: the YAML file, `UNICFG_*`
//! environment variables, then command line flags.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use config::{Config, Environment, File};

use unicfg_config::ServiceSettings;
use unicfg_config::settings::{
    DEFAULT_ACTOR, DEFAULT_CACHE_MAX_CAPACITY, DEFAULT_CACHE_TTL, DEFAULT_DRIFT_INTERVAL,
    DEFAULT_ENVIRONMENT, DEFAULT_STORE_TIMEOUT, DEFAULT_SUBSCRIBE_INTERVAL,
};

use crate::startup::LoggingConfig;

pub const DEFAULT_CONFIG_FILE: &str = "conf/unicfg.yml";
pub const ENV_PREFIX: &str = "UNICFG";

pub const ENVIRONMENT: &str = "environment";
pub const DEFAULT_ACTOR_PROPERTY: &str = "default_actor";
pub const CACHE_TTL_SECS: &str = "cache_ttl_secs";
pub const CACHE_MAX_CAPACITY: &str = "cache_max_capacity";
pub const DRIFT_INTERVAL_SECS: &str = "drift_interval_secs";
pub const SUBSCRIBE_INTERVAL_SECS: &str = "subscribe_interval_secs";
pub const STORE_TIMEOUT_SECS: &str = "store_timeout_secs";
pub const SCHEMA_FILE: &str = "schema_file";
pub const LOG_LEVEL: &str = "log_level";
pub const LOG_DIR: &str = "log_dir";
pub const LOG_CONSOLE: &str = "log_console";
pub const LOG_FILE: &str = "log_file";

/// Command line arguments for the server
#[derive(Debug, Parser)]
#[command(name = "unicfg-server", version, about = "Unified configuration service")]
pub struct Cli {
    /// Settings file; missing files are skipped
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,
    #[arg(short = 'e', long = "environment")]
    pub environment: Option<String>,
    /// Schema file (YAML, or JSON with a .json extension)
    #[arg(short = 's', long = "schema")]
    pub schema: Option<String>,
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut builder = Config::builder()
            .add_source(File::with_name(&cli.config).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        if let Some(v) = &cli.environment {
            builder = builder.set_override(ENVIRONMENT, v.as_str())?;
        }
        if let Some(v) = &cli.schema {
            builder = builder.set_override(SCHEMA_FILE, v.as_str())?;
        }
        if let Some(v) = &cli.log_level {
            builder = builder.set_override(LOG_LEVEL, v.as_str())?;
        }

        let config = builder
            .build()
            .with_context(|| format!("failed to build configuration from {}", cli.config))?;
        Ok(Configuration { config })
    }

    pub fn environment(&self) -> String {
        self.config
            .get_string(ENVIRONMENT)
            .unwrap_or(DEFAULT_ENVIRONMENT.to_string())
    }

    pub fn default_actor(&self) -> String {
        self.config
            .get_string(DEFAULT_ACTOR_PROPERTY)
            .unwrap_or(DEFAULT_ACTOR.to_string())
    }

    pub fn cache_ttl(&self) -> Duration {
        self.seconds(CACHE_TTL_SECS, DEFAULT_CACHE_TTL)
    }

    pub fn cache_max_capacity(&self) -> u64 {
        self.config
            .get_int(CACHE_MAX_CAPACITY)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(DEFAULT_CACHE_MAX_CAPACITY)
    }

    pub fn drift_interval(&self) -> Duration {
        self.seconds(DRIFT_INTERVAL_SECS, DEFAULT_DRIFT_INTERVAL)
    }

    pub fn subscribe_interval(&self) -> Duration {
        self.seconds(SUBSCRIBE_INTERVAL_SECS, DEFAULT_SUBSCRIBE_INTERVAL)
    }

    pub fn store_timeout(&self) -> Duration {
        self.seconds(STORE_TIMEOUT_SECS, DEFAULT_STORE_TIMEOUT)
    }

    pub fn schema_file(&self) -> Option<PathBuf> {
        self.config.get_string(SCHEMA_FILE).ok().map(PathBuf::from)
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings::default()
            .with_environment(self.environment())
            .with_default_actor(self.default_actor())
            .with_cache_ttl(self.cache_ttl())
            .with_cache_max_capacity(self.cache_max_capacity())
            .with_drift_interval(self.drift_interval())
            .with_subscribe_interval(self.subscribe_interval())
            .with_store_timeout(self.store_timeout())
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_config(
            self.config.get_string(LOG_DIR).ok(),
            self.config.get_bool(LOG_CONSOLE).unwrap_or(true),
            self.config.get_bool(LOG_FILE).unwrap_or(false),
            self.config
                .get_string(LOG_LEVEL)
                .unwrap_or("info".to_string()),
        )
    }

    // zero and negative values fall back to the default
    fn seconds(&self, key: &str, default: Duration) -> Duration {
        self.config
            .get_int(key)
            .ok()
            .filter(|v| *v > 0)
            .map(|v| Duration::from_secs(v as u64))
            .unwrap_or(default)
    }
}
