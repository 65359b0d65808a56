use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Daemon configuration, loaded from an optional YAML file with
/// environment-variable overrides (`TRON_EVENTS__<SECTION>__<KEY>`).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tron: TronConfig,

    #[serde(default)]
    pub redis: RedisConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    /// Log level: `debug`, `info` or `error`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional Prometheus listener address (e.g. `0.0.0.0:9090`).
    /// Metrics are disabled when unset.
    #[serde(default)]
    pub metrics_addr: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TronConfig {
    /// Base URL of the TRON node's HTTP gateway.
    #[serde(default = "default_node_url")]
    pub node_url: String,

    /// Per-call timeout in seconds.
    #[serde(default = "default_node_timeout_secs")]
    pub timeout: u64,

    /// Idle connections kept warm towards the node.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Upper bound on pooled connections towards the node.
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_addr")]
    pub addr: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub db: i64,

    /// Key prefix for the cursor store and task queues.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Total worker concurrency across all queue classes.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_priority_workers")]
    pub priority_workers: usize,

    #[serde(default = "default_backlog_workers")]
    pub backlog_workers: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_node_url() -> String {
    "http://localhost:8090".to_string()
}

fn default_node_timeout_secs() -> u64 {
    10
}

fn default_pool_size() -> usize {
    5
}

fn default_max_pool_size() -> usize {
    10
}

fn default_redis_addr() -> String {
    "127.0.0.1:6379".to_string()
}

fn default_redis_prefix() -> String {
    "tron".to_string()
}

fn default_max_workers() -> usize {
    15
}

fn default_priority_workers() -> usize {
    2
}

fn default_backlog_workers() -> usize {
    12
}

impl Default for TronConfig {
    fn default() -> Self {
        Self {
            node_url: default_node_url(),
            timeout: default_node_timeout_secs(),
            pool_size: default_pool_size(),
            max_pool_size: default_max_pool_size(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            addr: default_redis_addr(),
            password: String::new(),
            db: 0,
            prefix: default_redis_prefix(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            priority_workers: default_priority_workers(),
            backlog_workers: default_backlog_workers(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tron: TronConfig::default(),
            redis: RedisConfig::default(),
            queue: QueueConfig::default(),
            log_level: default_log_level(),
            metrics_addr: None,
        }
    }
}

impl Config {
    /// Loads configuration from the given YAML file (if any), then applies
    /// `TRON_EVENTS__`-prefixed environment variables on top. Double
    /// underscores separate nesting so single underscores remain part of
    /// the key (`TRON_EVENTS__REDIS__ADDR` maps to `redis.addr`).
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder
            .add_source(
                config::Environment::with_prefix("TRON_EVENTS")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

impl TronConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl RedisConfig {
    /// Connection URL in the form `redis://[:password@]addr/db`.
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}/{}", self.addr, self.db)
        } else {
            format!("redis://:{}@{}/{}", self.password, self.addr, self.db)
        }
    }
}

impl QueueConfig {
    /// Worker slots left for the `default` queue class after the priority
    /// and backlog quotas are taken, never less than one.
    pub fn default_workers(&self) -> usize {
        self.max_workers
            .saturating_sub(self.priority_workers + self.backlog_workers)
            .max(1)
    }
}
