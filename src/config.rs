//! Configuration management for Tollgate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main configuration for the Tollgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TollgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Sliding-window rate limiter configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Failed-attempt tracker configuration
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Downstream lookup configuration
    #[serde(default)]
    pub lookup: LookupConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Interval between stale-record sweeps, in seconds. Zero disables
    /// the sweeper; stale records are then only evicted lazily.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

fn default_sweep_interval() -> u64 {
    300
}

/// Rate limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Requests allowed per window; the next request is refused
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,

    /// Message returned to limited callers
    #[serde(default = "default_rate_limit_message")]
    pub message: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
            message: default_rate_limit_message(),
        }
    }
}

impl RateLimitConfig {
    /// The window length as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_requests() -> u64 {
    5
}

fn default_rate_limit_message() -> String {
    "Too many requests, please try again later.".to_string()
}

/// Failed-attempt tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Failures tolerated before an IP is blocked
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial lockout length in milliseconds; doubles per escalation
    #[serde(default = "default_base_block_ms")]
    pub base_block_ms: u64,

    /// Message returned to blocked callers
    #[serde(default = "default_block_message")]
    pub message: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_block_ms: default_base_block_ms(),
            message: default_block_message(),
        }
    }
}

impl TrackerConfig {
    /// The base block duration as a [`Duration`].
    pub fn base_block(&self) -> Duration {
        Duration::from_millis(self.base_block_ms)
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_block_ms() -> u64 {
    60_000
}

fn default_block_message() -> String {
    "Too many failed attempts, access temporarily blocked.".to_string()
}

/// Downstream lookup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Deadline for the username lookup in milliseconds
    #[serde(default = "default_lookup_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_lookup_timeout_ms(),
        }
    }
}

impl LookupConfig {
    /// The lookup deadline as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_lookup_timeout_ms() -> u64 {
    5_000
}

impl TollgateConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| crate::error::TollgateError::Config(e.to_string()))
    }
}
