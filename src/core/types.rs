// src/core/types.rs — Shared types for the orchestration core

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infra::errors::ArenaError;

/// Hard cap on concurrent model calls per experiment.
pub const MAX_MODELS_PER_EXPERIMENT: usize = 3;

#[derive(Debug, Error)]
#[error("unrecognized value '{0}'")]
pub struct UnknownVariant(pub String);

// -- Experiment lifecycle --

/// Lifecycle states for one experiment. `Failed` and `Complete` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Running,
    AwaitingDecision,
    Failed,
    Complete,
}

impl ExperimentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Running => "running",
            ExperimentStatus::AwaitingDecision => "awaiting_decision",
            ExperimentStatus::Failed => "failed",
            ExperimentStatus::Complete => "complete",
        }
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperimentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(ExperimentStatus::Running),
            "awaiting_decision" => Ok(ExperimentStatus::AwaitingDecision),
            "failed" => Ok(ExperimentStatus::Failed),
            "complete" => Ok(ExperimentStatus::Complete),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl ToSql for ExperimentStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for ExperimentStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: UnknownVariant| FromSqlError::Other(Box::new(e)))
    }
}

/// The human verdict that finalizes an experiment. Distinct from the engine's
/// advisory recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Ship,
    Iterate,
    Rollback,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Ship => "ship",
            Decision::Iterate => "iterate",
            Decision::Rollback => "rollback",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ship" => Ok(Decision::Ship),
            "iterate" => Ok(Decision::Iterate),
            "rollback" => Ok(Decision::Rollback),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl ToSql for Decision {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Decision {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: UnknownVariant| FromSqlError::Other(Box::new(e)))
    }
}

// -- Run configuration --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    /// Best-effort inference from a model name, for boundary layers (CLI)
    /// that accept bare model names. The engine itself always receives an
    /// explicit provider.
    pub fn infer(model_name: &str) -> Option<Self> {
        let name = model_name.to_lowercase();
        if name.contains("claude") {
            Some(ProviderKind::Anthropic)
        } else if name.contains("gpt") || name.starts_with("o1") || name.starts_with("o3") {
            Some(ProviderKind::OpenAi)
        } else {
            None
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Caller-supplied configuration for one model call. Ephemeral: lives only
/// for the duration of one orchestration call and is never persisted.
#[derive(Clone)]
pub struct ModelRunConfig {
    pub model_name: String,
    pub provider: ProviderKind,
    pub api_key: String,
}

// The credential never reaches logs.
impl fmt::Debug for ModelRunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRunConfig")
            .field("model_name", &self.model_name)
            .field("provider", &self.provider)
            .field("api_key", &"[redacted]")
            .finish()
    }
}

// -- Experiment input --

/// What the experiment edits: normalized text, or an audio file that is
/// transcribed at the start of the run phase.
#[derive(Debug, Clone)]
pub enum ExperimentSource {
    Text(String),
    Audio(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ExperimentInput {
    /// Media/text identifier recorded on the experiment row.
    pub media_id: String,
    pub source: ExperimentSource,
    pub configs: Vec<ModelRunConfig>,
}

impl ExperimentInput {
    /// Boundary validation. Rejected inputs never create an experiment row.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.media_id.trim().is_empty() {
            return Err(ArenaError::Validation("media_id must not be empty".into()));
        }
        if let ExperimentSource::Text(text) = &self.source {
            if text.trim().is_empty() {
                return Err(ArenaError::Validation("input text must not be empty".into()));
            }
        }
        if self.configs.is_empty() {
            return Err(ArenaError::Validation(
                "at least one model config is required".into(),
            ));
        }
        if self.configs.len() > MAX_MODELS_PER_EXPERIMENT {
            return Err(ArenaError::Validation(format!(
                "at most {} models allowed per experiment, got {}",
                MAX_MODELS_PER_EXPERIMENT,
                self.configs.len()
            )));
        }
        if let Some(cfg) = self.configs.iter().find(|c| c.model_name.trim().is_empty()) {
            return Err(ArenaError::Validation(format!(
                "empty model name in config for provider '{}'",
                cfg.provider
            )));
        }
        Ok(())
    }
}

// -- Scoring --

/// One named heuristic score on the 1–5 scale, with its rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricScore {
    pub metric_name: String,
    pub score: u8,
    pub reasoning: String,
}

// -- Run phase results --

/// One model's successful execution, as produced by the run coordinator.
#[derive(Debug, Clone)]
pub struct CompletedRun {
    pub run_id: String,
    pub model_name: String,
    pub raw_output: String,
    pub latency_ms: u64,
    pub cost_usd: f64,
}

/// One model's permanent failure after the retry policy was exhausted.
#[derive(Debug, Clone)]
pub struct RunFailure {
    pub model_name: String,
    pub reason: String,
}

/// The coordinator's settled contract: every configured model resolved to
/// exactly one side.
#[derive(Debug, Default)]
pub struct RunPhaseOutcome {
    pub completed: Vec<CompletedRun>,
    pub failures: Vec<RunFailure>,
}

/// Human-readable error log naming each failed model and why.
pub fn format_error_log(failures: &[RunFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.model_name, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str) -> ModelRunConfig {
        ModelRunConfig {
            model_name: name.into(),
            provider: ProviderKind::OpenAi,
            api_key: "sk-test".into(),
        }
    }

    fn input(configs: Vec<ModelRunConfig>) -> ExperimentInput {
        ExperimentInput {
            media_id: "episode-42".into(),
            source: ExperimentSource::Text("Some transcript.".into()),
            configs,
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            ExperimentStatus::Running,
            ExperimentStatus::AwaitingDecision,
            ExperimentStatus::Failed,
            ExperimentStatus::Complete,
        ] {
            assert_eq!(status.as_str().parse::<ExperimentStatus>().unwrap(), status);
        }
        assert!("paused".parse::<ExperimentStatus>().is_err());
    }

    #[test]
    fn decision_round_trips_through_str() {
        for decision in [Decision::Ship, Decision::Iterate, Decision::Rollback] {
            assert_eq!(decision.as_str().parse::<Decision>().unwrap(), decision);
        }
    }

    #[test]
    fn provider_inference_from_model_names() {
        assert_eq!(
            ProviderKind::infer("claude-3-haiku-20240307"),
            Some(ProviderKind::Anthropic)
        );
        assert_eq!(ProviderKind::infer("gpt-4o"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::infer("mystery-model"), None);
    }

    #[test]
    fn debug_redacts_api_key() {
        let rendered = format!("{:?}", config("gpt-4o"));
        assert!(rendered.contains("[redacted]"));
        assert!(!rendered.contains("sk-test"));
    }

    #[test]
    fn validate_rejects_empty_and_oversized_config_lists() {
        assert!(matches!(
            input(vec![]).validate(),
            Err(ArenaError::Validation(_))
        ));

        let four = input(vec![config("a"), config("b"), config("c"), config("d")]);
        assert!(matches!(four.validate(), Err(ArenaError::Validation(_))));

        let three = input(vec![config("a"), config("b"), config("c")]);
        assert!(three.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_model_name_and_empty_text() {
        assert!(input(vec![config("  ")]).validate().is_err());

        let blank_text = ExperimentInput {
            media_id: "m".into(),
            source: ExperimentSource::Text("   ".into()),
            configs: vec![config("gpt-4o")],
        };
        assert!(blank_text.validate().is_err());
    }

    #[test]
    fn error_log_names_every_failed_model() {
        let log = format_error_log(&[
            RunFailure {
                model_name: "gpt-4o".into(),
                reason: "HTTP 500".into(),
            },
            RunFailure {
                model_name: "claude-3-haiku-20240307".into(),
                reason: "timeout".into(),
            },
        ]);
        assert_eq!(log, "gpt-4o: HTTP 500; claude-3-haiku-20240307: timeout");
    }
}
