use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_grpc_addr")]
    pub grpc_addr: String, // e.g. 127.0.0.1:50051
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: default_grpc_addr(),
        }
    }
}

fn default_grpc_addr() -> String {
    "127.0.0.1:50051".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    /// Redis address as "host:port".
    #[serde(default = "default_redis_addr")]
    pub addr: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            addr: default_redis_addr(),
        }
    }
}

fn default_redis_addr() -> String {
    "127.0.0.1:6379".to_string()
}

/// Lifecycle tuning shared by the gateway and the watchdog.
#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    /// Seconds between watchdog sweeps.
    #[serde(default = "default_watchdog_interval_secs")]
    pub watchdog_interval_secs: u64,
    /// Seconds a lease may be held before the watchdog reclaims it.
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,
    /// Retry budget for submissions that do not specify one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            watchdog_interval_secs: default_watchdog_interval_secs(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_watchdog_interval_secs() -> u64 {
    10
}

fn default_visibility_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    crate::task::DEFAULT_MAX_RETRIES
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Seconds between polls when the queue is idle.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Maximum tasks fetched per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    #[serde(default = "default_topic")]
    pub topic: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            batch_size: default_batch_size(),
            topic: default_topic(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_batch_size() -> i64 {
    10
}

fn default_topic() -> String {
    "default".to_string()
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let data = fs::read_to_string(p)?;
                let cfg: Self = toml::from_str(&data)?;
                Ok(cfg)
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_a_file() {
        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg.server.grpc_addr, "127.0.0.1:50051");
        assert_eq!(cfg.redis.addr, "127.0.0.1:6379");
        assert_eq!(cfg.queue.watchdog_interval_secs, 10);
        assert_eq!(cfg.queue.visibility_timeout_secs, 30);
        assert_eq!(cfg.queue.max_retries, 3);
        assert_eq!(cfg.worker.poll_interval_secs, 1);
    }

    #[test]
    fn partial_toml_fills_missing_sections() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [queue]
            visibility_timeout_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(cfg.queue.visibility_timeout_secs, 60);
        assert_eq!(cfg.queue.watchdog_interval_secs, 10);
        assert_eq!(cfg.server.grpc_addr, "127.0.0.1:50051");
    }
}
