// Configuration type definitions

use serde::Deserialize;

use super::service_types::{BackendConfig, CacheConfig, QuotaConfig, StorageConfig};
use crate::analysis::AnalysisOptions;

/// Default debounce delay in milliseconds
fn default_debounce_ms() -> u64 {
    1000
}

/// Default upper bound on characters sent in one request
fn default_max_text_chars() -> usize {
    50_000
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    4000
}

/// Default lifetime of cached analysis results
fn default_cache_ttl_hours() -> u64 {
    24
}

/// Short phrases get the word-boundary filter ("is" must not match inside "this")
fn default_short_text_threshold() -> usize {
    3
}

fn default_sweep_interval_ms() -> u64 {
    10_000
}

/// Analysis scheduling section
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Quiet period before a real-time analysis starts
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Texts longer than this are rejected before scheduling
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    /// Timeout of a single backend attempt
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries for transient backend failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: u64,
    /// Checks requested from the backend
    #[serde(default)]
    pub options: AnalysisOptions,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            debounce_ms: default_debounce_ms(),
            max_text_chars: default_max_text_chars(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            cache_ttl_hours: default_cache_ttl_hours(),
            options: AnalysisOptions::default(),
        }
    }
}

/// Anchor resolution section
#[derive(Debug, Clone, Deserialize)]
pub struct AnchorConfig {
    #[serde(default = "default_short_text_threshold")]
    pub short_text_threshold: usize,
    /// Maximum distance between the stated and the matched start offset.
    /// Unset means any distance is accepted.
    #[serde(default)]
    pub max_distance: Option<usize>,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        AnchorConfig {
            short_text_threshold: default_short_text_threshold(),
            max_distance: None,
        }
    }
}

/// Suggestion lifecycle section
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Interval of the staleness sweep
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Suggestions below this confidence are not displayed
    #[serde(default)]
    pub min_confidence: f32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        LifecycleConfig {
            sweep_interval_ms: default_sweep_interval_ms(),
            min_confidence: 0.0,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub anchor: AnchorConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}
