// src/provider/anthropic.rs — Anthropic Messages API provider

use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{compose_user_message, Generation, GenerationProvider, TokenUsage};
use crate::infra::errors::ArenaError;

pub struct AnthropicProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, ArenaError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArenaError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_key,
            model,
            client,
        })
    }

    fn api_url(&self) -> &str {
        "https://api.anthropic.com/v1/messages"
    }
}

/// Per-mtok (input, output) prices for cost accounting.
fn pricing(model: &str) -> (f64, f64) {
    if model.contains("opus") {
        (15.0, 75.0)
    } else if model.contains("haiku") {
        (0.8, 4.0)
    } else {
        // sonnet-class default
        (3.0, 15.0)
    }
}

#[async_trait]
impl GenerationProvider for AnthropicProvider {
    fn id(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, prompt: &str, input: &str) -> Result<Generation, ArenaError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 4096,
            "messages": [{
                "role": "user",
                "content": [{ "type": "text", "text": compose_user_message(prompt, input) }],
            }],
        });

        let started = Instant::now();
        let response = self
            .client
            .post(self.api_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ArenaError::Provider {
                provider: "anthropic".into(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5);
            return Err(ArenaError::RateLimited {
                provider: "anthropic".into(),
                retry_after_ms: retry_after * 1000,
            });
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ArenaError::Provider {
                provider: "anthropic".into(),
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error(),
            });
        }

        let resp: serde_json::Value =
            response.json().await.map_err(|e| ArenaError::Provider {
                provider: "anthropic".into(),
                message: format!("Failed to parse response: {}", e),
                retriable: false,
            })?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let output = resp["content"]
            .as_array()
            .and_then(|blocks| blocks.iter().find_map(|b| b["text"].as_str()))
            .map(str::to_string)
            .ok_or_else(|| ArenaError::Provider {
                provider: "anthropic".into(),
                message: "response contained no text content".into(),
                retriable: false,
            })?;

        let usage = TokenUsage {
            input_tokens: resp["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: resp["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
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
