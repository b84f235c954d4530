// src/provider/resolver.rs — Build providers from run configs

use std::sync::Arc;
use std::time::Duration;

use super::anthropic::AnthropicProvider;
use super::openai::OpenAiProvider;
use super::GenerationProvider;
use crate::core::types::{ModelRunConfig, ProviderKind};
use crate::infra::errors::ArenaError;

/// Capability for turning one run config into a live provider. The run
/// coordinator depends only on this trait, so tests substitute mock
/// providers without touching the network.
pub trait ProviderFactory: Send + Sync {
    fn make(&self, config: &ModelRunConfig) -> Result<Arc<dyn GenerationProvider>, ArenaError>;
}

/// Live API resolver used outside tests.
pub struct Resolver {
    timeout: Duration,
}

impl Resolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ProviderFactory for Resolver {
    fn make(&self, config: &ModelRunConfig) -> Result<Arc<dyn GenerationProvider>, ArenaError> {
        if config.api_key.trim().is_empty() {
            // A missing key is an isolated per-model failure, not input
            // validation: sibling models with keys still run.
            return Err(ArenaError::Provider {
                provider: config.provider.as_str().into(),
                message: format!("no API key supplied for model '{}'", config.model_name),
                retriable: false,
            });
        }

        match config.provider {
            ProviderKind::OpenAi => Ok(Arc::new(OpenAiProvider::new(
                config.api_key.clone(),
                config.model_name.clone(),
                self.timeout,
            )?)),
            ProviderKind::Anthropic => Ok(Arc::new(AnthropicProvider::new(
                config.api_key.clone(),
                config.model_name.clone(),
                self.timeout,
            )?)),
        }
    }
}
