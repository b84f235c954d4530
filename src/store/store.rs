// src/store/store.rs — SQLite operations for experiments, runs, and metrics
//
// Status transitions are single conditional UPDATE statements; the returned
// affected-row count is the transition guard. Rows are append-mostly and
// never deleted.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;

use super::schema;
use crate::core::types::{Decision, ExperimentStatus, MetricScore};

/// One persisted experiment.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentRow {
    pub experiment_id: String,
    pub created_at: String,
    pub media_id: String,
    pub status: ExperimentStatus,
    pub decision: Option<Decision>,
    pub decision_reason: Option<String>,
    pub recommendation: Option<String>,
    pub recommendation_reason: Option<String>,
    pub tradeoffs: Option<serde_json::Value>,
    pub error_log: Option<String>,
}

/// One persisted model run.
#[derive(Debug, Clone, Serialize)]
pub struct ModelRunRow {
    pub run_id: String,
    pub experiment_id: String,
    pub model_name: String,
    pub raw_output: String,
    pub latency_ms: i64,
    pub cost_usd: f64,
    pub created_at: String,
}

/// One persisted score set. Immutable once inserted.
#[derive(Debug, Clone, Serialize)]
pub struct EvalMetricRow {
    pub eval_id: String,
    pub run_id: String,
    pub scores: Vec<MetricScore>,
    pub created_at: String,
}

/// A run joined with its metrics (absent while scoring is in flight).
#[derive(Debug, Clone, Serialize)]
pub struct RunWithMetrics {
    pub run: ModelRunRow,
    pub metrics: Option<EvalMetricRow>,
}

/// Full drill-down for one experiment.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentSnapshot {
    pub experiment: ExperimentRow,
    pub runs: Vec<RunWithMetrics>,
}

/// Low-level SQLite operations for all three tables.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        // WAL for concurrent readers while the run phase writes
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::run_migrations(&conn)?;
        Ok(Self::new(conn))
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::run_migrations(&conn)?;
        Ok(Self::new(conn))
    }

    // -- Experiments --

    pub fn insert_experiment(&self, experiment_id: &str, media_id: &str) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO experiments (experiment_id, created_at, media_id, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![experiment_id, now, media_id, ExperimentStatus::Running],
        )?;
        Ok(())
    }

    pub fn get_experiment(&self, experiment_id: &str) -> anyhow::Result<Option<ExperimentRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT experiment_id, created_at, media_id, status, decision,
                        decision_reason, recommendation, recommendation_reason,
                        tradeoffs, error_log
                 FROM experiments WHERE experiment_id = ?1",
                params![experiment_id],
                map_experiment_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_experiments(&self, limit: u32) -> anyhow::Result<Vec<ExperimentRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT experiment_id, created_at, media_id, status, decision,
                    decision_reason, recommendation, recommendation_reason,
                    tradeoffs, error_log
             FROM experiments ORDER BY created_at DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], map_experiment_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn set_recommendation(
        &self,
        experiment_id: &str,
        winning_model: &str,
        reason: &str,
        tradeoffs: &serde_json::Value,
    ) -> anyhow::Result<()> {
        self.conn.execute(
            "UPDATE experiments SET recommendation = ?1, recommendation_reason = ?2,
             tradeoffs = ?3 WHERE experiment_id = ?4",
            params![
                winning_model,
                reason,
                serde_json::to_string(tradeoffs)?,
                experiment_id
            ],
        )?;
        Ok(())
    }

    /// RUNNING -> AWAITING_DECISION. Returns false when the experiment was
    /// not in RUNNING (transition refused, nothing written).
    pub fn mark_awaiting_decision(
        &self,
        experiment_id: &str,
        error_log: Option<&str>,
    ) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE experiments SET status = ?1, error_log = ?2
             WHERE experiment_id = ?3 AND status = ?4",
            params![
                ExperimentStatus::AwaitingDecision,
                error_log,
                experiment_id,
                ExperimentStatus::Running
            ],
        )?;
        Ok(changed > 0)
    }

    /// RUNNING -> FAILED, recording every failure reason.
    pub fn mark_failed(&self, experiment_id: &str, error_log: &str) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE experiments SET status = ?1, error_log = ?2
             WHERE experiment_id = ?3 AND status = ?4",
            params![
                ExperimentStatus::Failed,
                error_log,
                experiment_id,
                ExperimentStatus::Running
            ],
        )?;
        Ok(changed > 0)
    }

    /// AWAITING_DECISION -> COMPLETE, in one statement so a racing caller
    /// can never double-apply or overwrite a decision.
    pub fn complete_with_decision(
        &self,
        experiment_id: &str,
        decision: Decision,
        reason: &str,
    ) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE experiments SET status = ?1, decision = ?2, decision_reason = ?3
             WHERE experiment_id = ?4 AND status = ?5",
            params![
                ExperimentStatus::Complete,
                decision,
                reason,
                experiment_id,
                ExperimentStatus::AwaitingDecision
            ],
        )?;
        Ok(changed > 0)
    }

    // -- Model runs --

    pub fn insert_model_run(&self, run: &ModelRunRow) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO model_runs (run_id, experiment_id, model_name, raw_output,
             latency_ms, cost_usd, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run.run_id,
                run.experiment_id,
                run.model_name,
                run.raw_output,
                run.latency_ms,
                run.cost_usd,
                run.created_at
            ],
        )?;
        Ok(())
    }

    pub fn runs_for_experiment(&self, experiment_id: &str) -> anyhow::Result<Vec<ModelRunRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, experiment_id, model_name, raw_output, latency_ms,
                    cost_usd, created_at
             FROM model_runs WHERE experiment_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt
            .query_map(params![experiment_id], |row| {
                Ok(ModelRunRow {
                    run_id: row.get(0)?,
                    experiment_id: row.get(1)?,
                    model_name: row.get(2)?,
                    raw_output: row.get(3)?,
                    latency_ms: row.get(4)?,
                    cost_usd: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // -- Eval metrics --

    pub fn insert_eval_metrics(
        &self,
        eval_id: &str,
        run_id: &str,
        scores: &[MetricScore],
    ) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO eval_metrics (eval_id, run_id, scores, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![eval_id, run_id, serde_json::to_string(scores)?, now],
        )?;
        Ok(())
    }

    pub fn metrics_for_run(&self, run_id: &str) -> anyhow::Result<Option<EvalMetricRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT eval_id, run_id, scores, created_at
                 FROM eval_metrics WHERE run_id = ?1",
                params![run_id],
                map_eval_metric_row,
            )
            .optional()?;
        Ok(row)
    }

    // -- Views --

    /// Experiment plus every run joined with its metrics. Safe mid-run:
    /// returns whatever subset has been persisted so far.
    pub fn experiment_details(
        &self,
        experiment_id: &str,
    ) -> anyhow::Result<Option<ExperimentSnapshot>> {
        let Some(experiment) = self.get_experiment(experiment_id)? else {
            return Ok(None);
        };

        let mut runs = Vec::new();
        for run in self.runs_for_experiment(experiment_id)? {
            let metrics = self.metrics_for_run(&run.run_id)?;
            runs.push(RunWithMetrics { run, metrics });
        }

        Ok(Some(ExperimentSnapshot { experiment, runs }))
    }
}

fn map_experiment_row(row: &Row<'_>) -> rusqlite::Result<ExperimentRow> {
    let tradeoffs = row
        .get::<_, Option<String>>(8)?
        .map(|raw| {
            serde_json::from_str(&raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    8,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
        })
        .transpose()?;

    Ok(ExperimentRow {
        experiment_id: row.get(0)?,
        created_at: row.get(1)?,
        media_id: row.get(2)?,
        status: row.get(3)?,
        decision: row.get(4)?,
        decision_reason: row.get(5)?,
        recommendation: row.get(6)?,
        recommendation_reason: row.get(7)?,
        tradeoffs,
        error_log: row.get(9)?,
    })
}

fn map_eval_metric_row(row: &Row<'_>) -> rusqlite::Result<EvalMetricRow> {
    let raw: String = row.get(2)?;
    let scores = serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(EvalMetricRow {
        eval_id: row.get(0)?,
        run_id: row.get(1)?,
        scores,
        created_at: row.get(3)?,
    })
}
