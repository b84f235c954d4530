// src/provider/openai.rs — OpenAI Chat Completions provider + Whisper transcription

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{
    compose_user_message, Generation, GenerationProvider, TokenUsage, Transcript,
    TranscriptionProvider,
};
use crate::infra::errors::ArenaError;

pub struct OpenAiProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, ArenaError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArenaError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_key,
            model,
            client,
            base_url: "https://api.openai.com/v1".into(),
        })
    }
}

/// Per-mtok (input, output) prices for cost accounting.
fn pricing(model: &str) -> (f64, f64) {
    if model.contains("mini") {
        (0.4, 1.6)
    } else if model.contains("gpt-4o") {
        (2.5, 10.0)
    } else if model.starts_with("o1") || model.starts_with("o3") {
        (1.1, 4.4)
    } else {
        (2.0, 8.0)
    }
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
    fn id(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str, input: &str) -> Result<Generation, ArenaError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": compose_user_message(prompt, input),
            }],
        });

        let started = Instant::now();
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ArenaError::Provider {
                provider: "openai".into(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ArenaError::RateLimited {
                provider: "openai".into(),
                retry_after_ms: 5000,
            });
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ArenaError::Provider {
                provider: "openai".into(),
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error(),
            });
        }

        let resp: serde_json::Value =
            response.json().await.map_err(|e| ArenaError::Provider {
                provider: "openai".into(),
                message: format!("Failed to parse response: {}", e),
                retriable: false,
            })?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let output = resp["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ArenaError::Provider {
                provider: "openai".into(),
                message: "response contained no message content".into(),
                retriable: false,
            })?;

        let usage = TokenUsage {
            input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        };
        let model_id = resp["model"].as_str().unwrap_or(&self.model).to_string();
        let (input_price, output_price) = pricing(&model_id);

        Ok(Generation {
            cost_usd: usage.cost_usd(input_price, output_price),
            model_id,
            output,
            latency_ms,
            usage,
        })
    }
}

/// Whisper-backed transcription. Uses the server-side OpenAI key, not a
/// caller-supplied run credential.
pub struct WhisperTranscriber {
    api_key: String,
    client: reqwest::Client,
}

impl WhisperTranscriber {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, ArenaError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArenaError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { api_key, client })
    }

    pub fn from_env(timeout: Duration) -> Result<Self, ArenaError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            ArenaError::Config("OPENAI_API_KEY not set; required for audio transcription".into())
        })?;
        Self::new(api_key, timeout)
    }
}

#[async_trait]
impl TranscriptionProvider for WhisperTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<Transcript, ArenaError> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio")
            .to_string();

        let form = reqwest::multipart::Form::new()
            .text("model", "whisper-1")
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name));

        let started = Instant::now();
        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ArenaError::Provider {
                provider: "openai-whisper".into(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ArenaError::Provider {
                provider: "openai-whisper".into(),
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error(),
            });
        }

        let resp: serde_json::Value =
            response.json().await.map_err(|e| ArenaError::Provider {
                provider: "openai-whisper".into(),
                message: format!("Failed to parse response: {}", e),
                retriable: false,
            })?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let text = resp["text"].as_str().unwrap_or("").to_string();
        // Rough estimate: $0.006 per audio minute, approximated from call latency.
        let cost_usd = 0.006 * (latency_ms as f64 / 60_000.0);

        Ok(Transcript {
            text,
            latency_ms,
            cost_usd,
        })
    }
}
