use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for bci
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Search strategy defaults
    #[serde(default)]
    pub search: SearchConfig,

    /// Worker dispatcher configuration
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Binary availability probing
    #[serde(default)]
    pub availability: AvailabilityConfig,

    /// Result store configuration
    #[serde(default)]
    pub results: ResultsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Search strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SearchConfig {
    /// Strategy name: bin_seq, bin_search or comp_search
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Maximum number of concurrent workers (1-64)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Number of samples taken by the fixed-sampling pass
    #[serde(default = "default_sequence_limit")]
    pub sequence_limit: usize,

    /// Branching factor of the adaptive search. Defaults to the concurrency
    /// (at least 2) when unset.
    #[serde(default)]
    pub branching_factor: Option<usize>,
}

fn default_strategy() -> String {
    "comp_search".to_string()
}

const fn default_concurrency() -> usize {
    4
}

const fn default_sequence_limit() -> usize {
    100
}

impl SearchConfig {
    pub fn effective_branching_factor(&self) -> usize {
        self.branching_factor.unwrap_or(self.concurrency).max(2)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            concurrency: default_concurrency(),
            sequence_limit: default_sequence_limit(),
            branching_factor: None,
        }
    }
}

/// Worker dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DispatcherConfig {
    /// Container image of the evaluation worker
    #[serde(default = "default_image")]
    pub image: String,

    /// Container network the workers join
    #[serde(default = "default_network")]
    pub network: String,

    /// Memory cap per worker (docker syntax)
    #[serde(default = "default_memory_limit")]
    pub memory_limit: String,

    /// Shared memory size per worker (docker syntax)
    #[serde(default = "default_shm_size")]
    pub shm_size: String,

    /// Label used to count running workers
    #[serde(default = "default_label")]
    pub label: String,

    /// Entry point executed inside the worker
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,

    /// Interval of the capacity and idle polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause after each launch so the new worker shows up in the running count
    #[serde(default = "default_launch_grace_ms")]
    pub launch_grace_ms: u64,

    /// How long to wait for a stale worker with the same name to disappear
    #[serde(default = "default_removal_timeout_ms")]
    pub removal_timeout_ms: u64,

    /// Bind mounts, `host:container`
    #[serde(default)]
    pub volumes: Vec<String>,

    /// Environment variables forwarded from the host to each worker
    #[serde(default)]
    pub env_passthrough: Vec<String>,
}

fn default_image() -> String {
    "bci_worker".to_string()
}

fn default_network() -> String {
    "bci_net".to_string()
}

fn default_memory_limit() -> String {
    "1g".to_string()
}

fn default_shm_size() -> String {
    "2gb".to_string()
}

fn default_label() -> String {
    "bci_worker".to_string()
}

fn default_entrypoint() -> String {
    "./worker.sh".to_string()
}

const fn default_poll_interval_ms() -> u64 {
    5000
}

const fn default_launch_grace_ms() -> u64 {
    5000
}

const fn default_removal_timeout_ms() -> u64 {
    30_000
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            network: default_network(),
            memory_limit: default_memory_limit(),
            shm_size: default_shm_size(),
            label: default_label(),
            entrypoint: default_entrypoint(),
            poll_interval_ms: default_poll_interval_ms(),
            launch_grace_ms: default_launch_grace_ms(),
            removal_timeout_ms: default_removal_timeout_ms(),
            volumes: vec!["/dev/shm:/dev/shm".to_string()],
            env_passthrough: vec![],
        }
    }
}

/// Binary availability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AvailabilityConfig {
    /// Folder holding `downloaded/` and `artisanal/` binaries
    #[serde(default = "default_bin_folder")]
    pub bin_folder: PathBuf,

    /// Executable name inside a revision's binary folder
    #[serde(default = "default_executable_name")]
    pub executable_name: String,

    /// Online snapshot URL, `{id}` is replaced by the revision id
    #[serde(default)]
    pub snapshot_url_template: Option<String>,

    /// Maximum online probes per second
    #[serde(default = "default_probes_per_second")]
    pub probes_per_second: u32,

    /// Timeout of one online probe in seconds
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_bin_folder() -> PathBuf {
    PathBuf::from("binaries/chromium")
}

fn default_executable_name() -> String {
    "chrome".to_string()
}

const fn default_probes_per_second() -> u32 {
    20
}

const fn default_probe_timeout_secs() -> u64 {
    10
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            bin_folder: default_bin_folder(),
            executable_name: default_executable_name(),
            snapshot_url_template: None,
            probes_per_second: default_probes_per_second(),
            timeout_secs: default_probe_timeout_secs(),
        }
    }
}

/// Result store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResultsConfig {
    /// Path to the `SQLite` result database
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_database_path() -> String {
    ".bci/results.db".to_string()
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rotated JSON log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation of the log files: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
