// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::errors::ArenaError;
use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArenaConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Optional engine-level bound on a whole run phase, in seconds.
    /// Absent means no engine-level timeout; each provider call is still
    /// bounded by `providers.timeout_seconds`.
    pub run_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Per-call HTTP timeout applied to every provider request.
    pub timeout_seconds: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per model call. 2 means one automatic retry.
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub edit_quality_weight: f64,
    pub structural_clarity_weight: f64,
    pub publish_ready_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            edit_quality_weight: 1.0,
            structural_clarity_weight: 1.0,
            publish_ready_weight: 1.0,
        }
    }
}

impl ArenaConfig {
    /// Load from the default config path, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self, ArenaError> {
        let path = paths::config_file_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ArenaError> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| ArenaError::Config(format!("{}: {}", path.display(), e)))
    }
}
