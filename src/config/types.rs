use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub tools: Vec<ToolConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Worker pool and bookkeeping settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Concurrent conversions. Defaults to the number of CPU cores.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Jobs allowed to wait before submissions are rejected.
    #[serde(default = "default_max_queued")]
    pub max_queued: usize,

    /// How long finished jobs stay queryable. 0 keeps them forever.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Processing-time samples kept per tool for wait estimates.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Estimate used for a tool with no completed runs yet.
    #[serde(default = "default_estimate_secs")]
    pub default_estimate_secs: u64,

    /// Timeout for tools that don't set their own.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
}

impl QueueConfig {
    pub fn retention(&self) -> Option<Duration> {
        (self.retention_secs > 0).then(|| Duration::from_secs(self.retention_secs))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn default_estimate(&self) -> Duration {
        Duration::from_secs(self.default_estimate_secs)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_queued: default_max_queued(),
            retention_secs: default_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            history_capacity: default_history_capacity(),
            default_estimate_secs: default_estimate_secs(),
            default_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_max_queued() -> usize {
    100
}

fn default_retention_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_history_capacity() -> usize {
    crate::queue::DEFAULT_HISTORY_CAPACITY
}

fn default_estimate_secs() -> u64 {
    crate::queue::DEFAULT_FALLBACK_ESTIMATE.as_secs()
}

fn default_timeout_secs() -> u64 {
    600
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory converted files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./converted")
}

/// An external program registered under a tool name.
///
/// ```toml
/// [[tools]]
/// name = "pdf"
/// program = "pandoc"
/// args = ["{input}", "-o", "{output}"]
/// output_extension = "pdf"
/// timeout_secs = 120
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolConfig {
    pub name: String,

    pub program: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,

    pub output_extension: String,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ToolConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
