use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use anyhow::{Context, Result};
use shared::protocol::{DEFAULT_USER, SSH_PORT};
use crate::session::QueryId;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Runtime worker threads, also the number of scrapes run at once
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    /// Bounds TCP connect, SSH handshake and authentication
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Per-query TTLs keyed by `status`, `peers` or `aggregate`
    #[serde(default)]
    pub cache_ttl_overrides: HashMap<String, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_strategy")]
    pub strategy: RetryStrategy,
    /// Total connection attempts, including the final one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Cap for the exponential strategy
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

pub const DEFAULT_CONFIG_PATH: &str = "/etc/airos-exporter/exporter.toml";

fn default_listen() -> String {
    "0.0.0.0:8890".to_string()
}

fn default_workers() -> usize {
    8
}

fn default_scrape_timeout() -> u64 {
    60
}

fn default_username() -> String {
    DEFAULT_USER.to_string()
}

fn default_password() -> String {
    "ubnt".to_string()
}

fn default_ssh_port() -> u16 {
    SSH_PORT
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_command_timeout() -> u64 {
    20
}

fn default_cache_ttl() -> u64 {
    5
}

fn default_strategy() -> RetryStrategy {
    RetryStrategy::Fixed
}

fn default_max_attempts() -> u32 {
    10
}

fn default_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            workers: default_workers(),
            scrape_timeout_secs: default_scrape_timeout(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: default_password(),
            ssh_port: default_ssh_port(),
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            cache_ttl_secs: default_cache_ttl(),
            cache_ttl_overrides: HashMap::new(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl ServerConfig {
    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }
}

impl DeviceConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Overrides naming a known query; `Config::validate` rejects the rest.
    pub fn cache_ttl_overrides(&self) -> impl Iterator<Item = (QueryId, Duration)> + '_ {
        self.cache_ttl_overrides
            .iter()
            .filter_map(|(name, secs)| Some((QueryId::from_name(name)?, Duration::from_secs(*secs))))
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load the file at `path` if one was given explicitly or exists at the
    /// default location, then apply environment overrides.
    pub fn resolve(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for name in self.device.cache_ttl_overrides.keys() {
            if QueryId::from_name(name).is_none() {
                anyhow::bail!("Unknown query in cache_ttl_overrides: {name}");
            }
        }
        Ok(())
    }

    /// Worst-case time spent connecting to an unreachable host: every
    /// attempt runs into the connect timeout, plus the waits between them.
    ///
    /// With the defaults this is 10 x 30 s + 9 x 2 s, well past the 60 s
    /// scrape timeout, so a dead host is reported as a timed-out scrape
    /// rather than an exhausted connection.
    pub fn connect_budget(&self) -> Duration {
        let policy = self.retry.policy();
        let attempts = policy.max_attempts();
        let waits: Duration = (1..attempts).map(|attempt| policy.delay(attempt)).sum();
        self.device
            .connect_timeout()
            .saturating_mul(attempts)
            .saturating_add(waits)
    }

    /// `PORT`, `WORKERS` and `UBNT_PASSWORD` take precedence over the file.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = var("PORT") {
            let port: u16 = port
                .parse()
                .with_context(|| format!("Invalid PORT: {port}"))?;
            self.server.listen = format!("0.0.0.0:{port}");
        }
        if let Some(workers) = var("WORKERS") {
            self.server.workers = workers
                .parse()
                .with_context(|| format!("Invalid WORKERS: {workers}"))?;
        }
        if let Some(password) = var("UBNT_PASSWORD") {
            self.device.password = password;
        }
        Ok(())
    }
}
