// src/provider/mod.rs — Model provider capability layer

pub mod anthropic;
pub mod openai;
pub mod resolver;
pub mod retry;

use async_trait::async_trait;
use std::path::Path;

use crate::infra::errors::ArenaError;

/// Generation capability: one editing call against one remote model.
/// Implementations measure latency around the call and account cost from
/// reported token usage.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn id(&self) -> &str;

    async fn generate(&self, prompt: &str, input: &str) -> Result<Generation, ArenaError>;
}

/// Transcription capability: audio file to text.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<Transcript, ArenaError>;
}

#[derive(Debug, Clone)]
pub struct Generation {
    /// Model identifier the provider actually served (may be more specific
    /// than the configured name).
    pub model_id: String,
    pub output: String,
    pub latency_ms: u64,
    pub cost_usd: f64,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Dollar cost at per-million-token prices.
    pub fn cost_usd(&self, input_per_mtok: f64, output_per_mtok: f64) -> f64 {
        self.input_tokens as f64 / 1e6 * input_per_mtok
            + self.output_tokens as f64 / 1e6 * output_per_mtok
    }
}

#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    pub latency_ms: u64,
    pub cost_usd: f64,
}

/// Frame one user message from the editing prompt and the source text.
pub(crate) fn compose_user_message(prompt: &str, input: &str) -> String {
    format!("{prompt}\n\nTRANSCRIPT:\n{input}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_cost_at_mtok_prices() {
        let usage = TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 500_000,
        };
        let cost = usage.cost_usd(3.0, 15.0);
        assert!((cost - 10.5).abs() < 1e-9);
    }

    #[test]
    fn user_message_frames_transcript() {
        let msg = compose_user_message("Edit this.", "raw text");
        assert!(msg.starts_with("Edit this."));
        assert!(msg.ends_with("TRANSCRIPT:\nraw text"));
    }
}
