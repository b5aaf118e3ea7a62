// Quota, cache, backend and storage configuration

use std::path::PathBuf;

use serde::Deserialize;

fn default_max_requests_per_hour() -> u32 {
    60
}

fn default_max_characters_per_hour() -> u64 {
    200_000
}

fn default_window_secs() -> u64 {
    3600
}

/// Real-time checks may be issued three times as often...
fn default_realtime_request_multiplier() -> f64 {
    3.0
}

/// ...but may only send half as many characters
fn default_realtime_character_multiplier() -> f64 {
    0.5
}

fn default_quota_memory_ttl_secs() -> u64 {
    60
}

fn default_flush_delay_ms() -> u64 {
    5000
}

fn default_memory_capacity() -> usize {
    256
}

fn default_cache_memory_ttl_secs() -> u64 {
    600
}

/// Quota section
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_max_requests_per_hour")]
    pub max_requests_per_hour: u32,
    #[serde(default = "default_max_characters_per_hour")]
    pub max_characters_per_hour: u64,
    /// Length of the usage window
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_realtime_request_multiplier")]
    pub realtime_request_multiplier: f64,
    #[serde(default = "default_realtime_character_multiplier")]
    pub realtime_character_multiplier: f64,
    /// How long a loaded record is trusted before re-reading the store
    #[serde(default = "default_quota_memory_ttl_secs")]
    pub memory_ttl_secs: u64,
    /// Delay before batched real-time increments are written
    #[serde(default = "default_flush_delay_ms")]
    pub flush_delay_ms: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        QuotaConfig {
            max_requests_per_hour: default_max_requests_per_hour(),
            max_characters_per_hour: default_max_characters_per_hour(),
            window_secs: default_window_secs(),
            realtime_request_multiplier: default_realtime_request_multiplier(),
            realtime_character_multiplier: default_realtime_character_multiplier(),
            memory_ttl_secs: default_quota_memory_ttl_secs(),
            flush_delay_ms: default_flush_delay_ms(),
        }
    }
}

/// Suggestion cache section
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Entries kept in the in-process tier
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
    /// Lifetime of an entry in the in-process tier
    #[serde(default = "default_cache_memory_ttl_secs")]
    pub memory_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            memory_capacity: default_memory_capacity(),
            memory_ttl_secs: default_cache_memory_ttl_secs(),
        }
    }
}

/// Analysis backend section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    /// URL the analysis request is POSTed to (required)
    pub endpoint: Option<String>,
    /// Sent as a bearer token when present
    pub api_key: Option<String>,
}

/// Durable storage section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Store file; defaults to the user data directory
    pub path: Option<PathBuf>,
    /// Keep everything in memory for this session only
    #[serde(default)]
    pub ephemeral: bool,
}
