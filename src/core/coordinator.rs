// src/core/coordinator.rs — Parallel run fan-out with failure isolation
//
// One task per configured model; no ordering between siblings and no shared
// mutable state across them. A model's permanent failure is recorded and
// never prevents a sibling from completing or being scored. Successful runs
// are persisted as they complete, so pollers see partial results before the
// whole fan-out settles.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use super::types::{CompletedRun, ModelRunConfig, RunFailure, RunPhaseOutcome};
use crate::provider::resolver::ProviderFactory;
use crate::provider::retry::RetryPolicy;
use crate::store::{self, ModelRunRow, SharedStore};

/// One settled model call.
#[derive(Debug)]
pub enum RunEvent {
    Completed(CompletedRun),
    Failed(RunFailure),
}

pub struct RunCoordinator {
    store: SharedStore,
    factory: Arc<dyn ProviderFactory>,
    retry: RetryPolicy,
}

impl RunCoordinator {
    pub fn new(store: SharedStore, factory: Arc<dyn ProviderFactory>, retry: RetryPolicy) -> Self {
        Self {
            store,
            factory,
            retry,
        }
    }

    /// Launch every model call and return the settled-event stream. The
    /// channel closes once every configured model has resolved to exactly
    /// one event.
    pub fn stream(
        &self,
        experiment_id: &str,
        prompt: &str,
        input: &str,
        configs: Vec<ModelRunConfig>,
    ) -> mpsc::UnboundedReceiver<RunEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let prompt: Arc<str> = prompt.into();
        let input: Arc<str> = input.into();

        for config in configs {
            let tx = tx.clone();
            let store = self.store.clone();
            let factory = self.factory.clone();
            let retry = self.retry.clone();
            let experiment_id = experiment_id.to_string();
            let prompt = prompt.clone();
            let input = input.clone();

            tokio::spawn(async move {
                let event =
                    run_one(store, factory.as_ref(), &retry, &experiment_id, &prompt, &input, config)
                        .await;
                // A dropped receiver means the run phase was abandoned.
                let _ = tx.send(event);
            });
        }

        rx
    }

    /// Contract form of `stream`: does not return until every model's
    /// attempts (success, retry-exhausted failure, or first-attempt success)
    /// have resolved.
    pub async fn execute(
        &self,
        experiment_id: &str,
        prompt: &str,
        input: &str,
        configs: Vec<ModelRunConfig>,
    ) -> RunPhaseOutcome {
        let mut rx = self.stream(experiment_id, prompt, input, configs);
        let mut outcome = RunPhaseOutcome::default();
        while let Some(event) = rx.recv().await {
            match event {
                RunEvent::Completed(run) => outcome.completed.push(run),
                RunEvent::Failed(failure) => outcome.failures.push(failure),
            }
        }
        outcome
    }
}

async fn run_one(
    store: SharedStore,
    factory: &dyn ProviderFactory,
    retry: &RetryPolicy,
    experiment_id: &str,
    prompt: &str,
    input: &str,
    config: ModelRunConfig,
) -> RunEvent {
    let configured_name = config.model_name.clone();

    let provider = match factory.make(&config) {
        Ok(provider) => provider,
        Err(e) => {
            tracing::warn!(model = %configured_name, "provider setup failed: {e}");
            return RunEvent::Failed(RunFailure {
                model_name: configured_name,
                reason: e.to_string(),
            });
        }
    };

    let result = retry
        .run(|_attempt| {
            let provider = provider.clone();
            async move { provider.generate(prompt, input).await }
        })
        .await;

    match result {
        Ok(generation) => {
            let model_name = if generation.model_id.is_empty() {
                configured_name
            } else {
                generation.model_id
            };
            let run = CompletedRun {
                run_id: uuid::Uuid::new_v4().to_string(),
                model_name,
                raw_output: generation.output,
                latency_ms: generation.latency_ms,
                cost_usd: generation.cost_usd,
            };

            let row = ModelRunRow {
                run_id: run.run_id.clone(),
                experiment_id: experiment_id.to_string(),
                model_name: run.model_name.clone(),
                raw_output: run.raw_output.clone(),
                latency_ms: run.latency_ms as i64,
                cost_usd: run.cost_usd,
                created_at: Utc::now().to_rfc3339(),
            };
            match store::lock(&store).and_then(|s| s.insert_model_run(&row)) {
                Ok(()) => {
                    tracing::info!(
                        model = %run.model_name,
                        latency_ms = run.latency_ms,
                        "model run complete"
                    );
                    RunEvent::Completed(run)
                }
                Err(e) => {
                    tracing::error!(model = %run.model_name, "failed to persist run: {e}");
                    RunEvent::Failed(RunFailure {
                        model_name: run.model_name,
                        reason: format!("failed to persist run: {e}"),
                    })
                }
            }
        }
        Err(e) => {
            tracing::warn!(model = %configured_name, "model run failed after retries: {e}");
            RunEvent::Failed(RunFailure {
                model_name: configured_name,
                reason: e.to_string(),
            })
        }
    }
}
