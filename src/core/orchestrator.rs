// src/core/orchestrator.rs — Orchestration engine
//
// Owns the experiment lifecycle: create in RUNNING, hand the run phase off
// to its own task, score completed runs as they land, settle into
// AWAITING_DECISION or FAILED, and apply the human decision that alone
// finalizes an experiment.

use std::sync::Arc;
use std::time::Duration;

use super::coordinator::{RunCoordinator, RunEvent};
use super::recommend::{RecommendationEngine, ScoredRun};
use super::state;
use super::types::{
    format_error_log, Decision, ExperimentInput, ExperimentSource, ExperimentStatus, RunFailure,
};
use crate::evaluator::HeuristicEvaluator;
use crate::infra::config::ArenaConfig;
use crate::infra::errors::ArenaError;
use crate::provider::resolver::{ProviderFactory, Resolver};
use crate::provider::retry::RetryPolicy;
use crate::provider::TranscriptionProvider;
use crate::store::{self, ExperimentRow, ExperimentSnapshot, SharedStore};

/// Fixed editing instruction sent to every model.
const EDIT_PROMPT: &str = "You are an expert editor. Edit the following transcript for \
    clarity, conciseness, and impact. Maintain the original meaning but improve the flow.";

#[derive(Clone)]
pub struct OrchestrationEngine {
    store: SharedStore,
    factory: Arc<dyn ProviderFactory>,
    transcriber: Option<Arc<dyn TranscriptionProvider>>,
    evaluator: HeuristicEvaluator,
    recommender: RecommendationEngine,
    retry: RetryPolicy,
    run_timeout: Option<Duration>,
}

impl OrchestrationEngine {
    pub fn new(store: SharedStore, config: &ArenaConfig) -> Self {
        Self {
            store,
            factory: Arc::new(Resolver::new(Duration::from_secs(
                config.providers.timeout_seconds,
            ))),
            transcriber: None,
            evaluator: HeuristicEvaluator::new(),
            recommender: RecommendationEngine::new(config.scoring.clone()),
            retry: RetryPolicy::from_config(&config.retry),
            run_timeout: config.engine.run_timeout_seconds.map(Duration::from_secs),
        }
    }

    /// Substitute the provider factory (tests inject mock providers).
    pub fn with_provider_factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn TranscriptionProvider>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Validate, create the experiment in RUNNING, hand the run phase off to
    /// its own task, and return the identifier immediately. Callers poll
    /// `get_experiment` for progress.
    pub async fn start_experiment(&self, input: ExperimentInput) -> Result<String, ArenaError> {
        input.validate()?;

        let experiment_id = uuid::Uuid::new_v4().to_string();
        store::lock(&self.store)?.insert_experiment(&experiment_id, &input.media_id)?;
        tracing::info!(
            experiment = %experiment_id,
            models = input.configs.len(),
            "experiment started"
        );

        let engine = self.clone();
        let id = experiment_id.clone();
        tokio::spawn(async move {
            engine.run_phase(id, input).await;
        });

        Ok(experiment_id)
    }

    /// Read-only snapshot, safe mid-run: returns whatever subset of runs and
    /// metrics has been persisted so far.
    pub async fn get_experiment(
        &self,
        experiment_id: &str,
    ) -> Result<ExperimentSnapshot, ArenaError> {
        store::lock(&self.store)?
            .experiment_details(experiment_id)?
            .ok_or_else(|| ArenaError::ExperimentNotFound {
                experiment_id: experiment_id.to_string(),
            })
    }

    pub async fn list_experiments(&self, limit: u32) -> Result<Vec<ExperimentRow>, ArenaError> {
        Ok(store::lock(&self.store)?.list_experiments(limit)?)
    }

    /// Apply the human decision. Valid only in AWAITING_DECISION with a
    /// non-empty reason; anything else is rejected without mutation.
    pub async fn submit_decision(
        &self,
        experiment_id: &str,
        decision: Decision,
        reason: &str,
    ) -> Result<(), ArenaError> {
        if reason.trim().is_empty() {
            return Err(ArenaError::Validation(
                "a decision requires a non-empty reason".into(),
            ));
        }

        let store = store::lock(&self.store)?;
        if store.complete_with_decision(experiment_id, decision, reason)? {
            tracing::info!(experiment = %experiment_id, decision = %decision, "experiment complete");
            return Ok(());
        }

        // Refused: distinguish an unknown experiment from an illegal state.
        match store.get_experiment(experiment_id)? {
            None => Err(ArenaError::ExperimentNotFound {
                experiment_id: experiment_id.to_string(),
            }),
            Some(row) => Err(ArenaError::DecisionConflict {
                experiment_id: experiment_id.to_string(),
                status: row.status.to_string(),
            }),
        }
    }

    /// The detached run phase. Any error here fails the experiment; the
    /// error never propagates past this task.
    async fn run_phase(self, experiment_id: String, input: ExperimentInput) {
        let work = self.run_phase_inner(&experiment_id, input);
        let result = match self.run_timeout {
            Some(bound) => match tokio::time::timeout(bound, work).await {
                Ok(result) => result,
                Err(_) => Err(ArenaError::Other(anyhow::anyhow!(
                    "run phase exceeded {}s timeout",
                    bound.as_secs()
                ))),
            },
            None => work.await,
        };

        if let Err(e) = result {
            tracing::error!(experiment = %experiment_id, "run phase failed: {e}");
            match store::lock(&self.store)
                .and_then(|s| s.mark_failed(&experiment_id, &e.to_string()))
            {
                Ok(true) => {}
                Ok(false) => tracing::warn!(
                    experiment = %experiment_id,
                    "experiment already settled; failure not recorded"
                ),
                Err(persist_err) => tracing::error!(
                    experiment = %experiment_id,
                    "failed to record run-phase failure: {persist_err}"
                ),
            }
        }
    }

    async fn run_phase_inner(
        &self,
        experiment_id: &str,
        input: ExperimentInput,
    ) -> Result<(), ArenaError> {
        // Phase 0: resolve the source text.
        let transcript = match input.source {
            ExperimentSource::Text(text) => text,
            ExperimentSource::Audio(path) => {
                let transcriber = self.transcriber.as_ref().ok_or_else(|| {
                    ArenaError::Config("no transcription provider configured for audio input".into())
                })?;
                let transcript = transcriber.transcribe(&path).await?;
                tracing::info!(
                    experiment = %experiment_id,
                    latency_ms = transcript.latency_ms,
                    "transcription complete"
                );
                transcript.text
            }
        };
        if transcript.trim().is_empty() {
            return Err(ArenaError::Validation(
                "transcription produced no text".into(),
            ));
        }

        // Phase 1: fan out, scoring each run as it lands so partial results
        // are visible to pollers before settlement.
        let coordinator = RunCoordinator::new(
            self.store.clone(),
            self.factory.clone(),
            self.retry.clone(),
        );
        let mut rx = coordinator.stream(experiment_id, EDIT_PROMPT, &transcript, input.configs);

        let mut scored: Vec<ScoredRun> = Vec::new();
        let mut failures: Vec<RunFailure> = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                RunEvent::Completed(run) => {
                    let metrics = self.evaluator.evaluate(&transcript, &run.raw_output);
                    let eval_id = uuid::Uuid::new_v4().to_string();
                    store::lock(&self.store)?.insert_eval_metrics(
                        &eval_id,
                        &run.run_id,
                        &metrics,
                    )?;
                    scored.push(ScoredRun {
                        model_name: run.model_name,
                        scores: metrics,
                        latency_ms: run.latency_ms,
                        cost_usd: run.cost_usd,
                    });
                }
                RunEvent::Failed(failure) => failures.push(failure),
            }
        }

        // Phase 2: settle.
        let error_log = (!failures.is_empty()).then(|| format_error_log(&failures));

        if state::settled_status(scored.len()) == ExperimentStatus::Failed {
            let log = error_log.unwrap_or_else(|| "all model runs failed".into());
            store::lock(&self.store)?.mark_failed(experiment_id, &log)?;
            tracing::warn!(experiment = %experiment_id, "experiment failed: {log}");
            return Ok(());
        }

        if let Some(rec) = self.recommender.recommend(&scored) {
            store::lock(&self.store)?.set_recommendation(
                experiment_id,
                &rec.winning_model,
                &rec.reason,
                &rec.tradeoffs,
            )?;
            tracing::info!(
                experiment = %experiment_id,
                winner = %rec.winning_model,
                "recommendation recorded"
            );
        }

        let moved =
            store::lock(&self.store)?.mark_awaiting_decision(experiment_id, error_log.as_deref())?;
        if !moved {
            tracing::warn!(
                experiment = %experiment_id,
                "experiment was not in RUNNING at settlement; transition refused"
            );
        }
        Ok(())
    }
}
