// src/main.rs — EditArena entry point

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use clap::{Parser, Subcommand};

use editarena::core::orchestrator::OrchestrationEngine;
use editarena::core::state;
use editarena::core::types::{
    Decision, ExperimentInput, ExperimentSource, ExperimentStatus, ModelRunConfig, ProviderKind,
};
use editarena::infra::config::ArenaConfig;
use editarena::infra::{logger, paths};
use editarena::provider::openai::WhisperTranscriber;
use editarena::store::{self, ExperimentSnapshot, Store};

#[derive(Parser)]
#[command(
    name = "editarena",
    version,
    about = "Compare AI editing models on one task and gate the result on a human decision"
)]
struct Cli {
    /// Path to an alternate config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an experiment and poll it to settlement
    Run {
        /// Text file to edit ("-" reads stdin)
        #[arg(long, conflicts_with = "audio")]
        text: Option<PathBuf>,

        /// Audio file to transcribe and edit
        #[arg(long)]
        audio: Option<PathBuf>,

        /// Model to run, as `name` or `provider:name`; repeat up to 3 times
        #[arg(long = "model", required = true)]
        models: Vec<String>,

        /// Identifier recorded on the experiment (defaults to the file name)
        #[arg(long)]
        media_id: Option<String>,
    },

    /// List recent experiments
    List {
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },

    /// Show one experiment with its runs and metrics, as JSON
    Show { experiment_id: String },

    /// Submit the human decision for an experiment
    Decide {
        experiment_id: String,

        /// ship | iterate | rollback
        decision: String,

        #[arg(long)]
        reason: String,
    },
}

#[tokio::main]
async fn main() {
    // Respects RUST_LOG
    logger::init_logging("warn");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        ArenaConfig::load_from(path)?
    } else {
        ArenaConfig::load()?
    };

    match cli.command {
        Commands::Run {
            text,
            audio,
            models,
            media_id,
        } => run_experiment(&config, text, audio, models, media_id).await,
        Commands::List { limit } => {
            let engine = init_engine(&config, false).await?;
            for row in engine.list_experiments(limit).await? {
                println!(
                    "{}  {}  {:<17}  {}  {}",
                    row.experiment_id,
                    row.created_at,
                    row.status,
                    row.recommendation.as_deref().unwrap_or("-"),
                    row.decision.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
                );
            }
            Ok(())
        }
        Commands::Show { experiment_id } => {
            let engine = init_engine(&config, false).await?;
            let snapshot = engine.get_experiment(&experiment_id).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Commands::Decide {
            experiment_id,
            decision,
            reason,
        } => {
            let engine = init_engine(&config, false).await?;
            let decision: Decision = decision.parse()?;
            engine.submit_decision(&experiment_id, decision, &reason).await?;
            println!("{experiment_id} -> complete ({decision})");
            Ok(())
        }
    }
}

async fn init_engine(
    config: &ArenaConfig,
    with_transcriber: bool,
) -> anyhow::Result<OrchestrationEngine> {
    paths::ensure_dirs().await?;
    let store = store::shared(Store::open(&paths::db_path())?);
    let mut engine = OrchestrationEngine::new(store, config);
    if with_transcriber {
        let timeout = Duration::from_secs(config.providers.timeout_seconds);
        engine = engine.with_transcriber(Arc::new(WhisperTranscriber::from_env(timeout)?));
    }
    Ok(engine)
}

async fn run_experiment(
    config: &ArenaConfig,
    text: Option<PathBuf>,
    audio: Option<PathBuf>,
    models: Vec<String>,
    media_id: Option<String>,
) -> anyhow::Result<()> {
    let (source, default_media_id) = match (text, &audio) {
        (Some(path), None) => {
            let content = if path == Path::new("-") {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&path)?
            };
            let name = file_label(&path, "manual_text");
            (ExperimentSource::Text(content), name)
        }
        (None, Some(path)) => (ExperimentSource::Audio(path.clone()), file_label(path, "audio")),
        (None, None) => bail!("either --text or --audio is required"),
        (Some(_), Some(_)) => unreachable!("clap rejects --text with --audio"),
    };

    let configs = models
        .iter()
        .map(|m| parse_model_arg(m))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let needs_transcriber = matches!(source, ExperimentSource::Audio(_));
    let engine = init_engine(config, needs_transcriber).await?;

    let input = ExperimentInput {
        media_id: media_id.unwrap_or(default_media_id),
        source,
        configs,
    };
    let experiment_id = engine.start_experiment(input).await?;
    println!("experiment {experiment_id}");

    // Poll until the run phase settles.
    let mut seen_runs = 0;
    let snapshot = loop {
        let snapshot = engine.get_experiment(&experiment_id).await?;
        for item in snapshot.runs.iter().skip(seen_runs) {
            println!(
                "  {} finished in {}ms (${:.4})",
                item.run.model_name, item.run.latency_ms, item.run.cost_usd
            );
        }
        seen_runs = snapshot.runs.len();

        let status = snapshot.experiment.status;
        if state::is_terminal(status) || status == ExperimentStatus::AwaitingDecision {
            break snapshot;
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    };

    print_settled(&snapshot);
    Ok(())
}

fn file_label(path: &Path, fallback: &str) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(fallback)
        .to_string()
}

/// Parse `name` or `provider:name`. Keys come from the provider's usual
/// environment variable; a missing key becomes an isolated run failure.
fn parse_model_arg(arg: &str) -> anyhow::Result<ModelRunConfig> {
    let (provider, model_name) = match arg.split_once(':') {
        Some((p, m)) => (p.parse::<ProviderKind>()?, m.to_string()),
        None => {
            let provider = ProviderKind::infer(arg).ok_or_else(|| {
                anyhow::anyhow!("cannot infer provider for '{arg}'; use provider:model")
            })?;
            (provider, arg.to_string())
        }
    };

    let env_var = match provider {
        ProviderKind::OpenAi => "OPENAI_API_KEY",
        ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
    };
    let api_key = std::env::var(env_var).unwrap_or_default();
    if api_key.is_empty() {
        eprintln!("warning: {env_var} not set; the '{model_name}' run will fail");
    }

    Ok(ModelRunConfig {
        model_name,
        provider,
        api_key,
    })
}

fn print_settled(snapshot: &ExperimentSnapshot) {
    let experiment = &snapshot.experiment;
    println!("\nstatus: {}", experiment.status);

    if experiment.status == ExperimentStatus::Failed {
        if let Some(ref log) = experiment.error_log {
            println!("errors: {log}");
        }
        return;
    }

    if !snapshot.runs.is_empty() {
        println!(
            "\n{:<28} {:>5} {:>7} {:>8} {:>10} {:>9}",
            "model", "edit", "struct", "publish", "cost", "latency"
        );
        for item in &snapshot.runs {
            let score = |name: &str| -> String {
                item.metrics
                    .as_ref()
                    .and_then(|m| m.scores.iter().find(|s| s.metric_name == name))
                    .map(|s| s.score.to_string())
                    .unwrap_or_else(|| "-".into())
            };
            println!(
                "{:<28} {:>5} {:>7} {:>8} {:>10} {:>9}",
                item.run.model_name,
                score(editarena::evaluator::METRIC_EDIT_QUALITY),
                score(editarena::evaluator::METRIC_STRUCTURAL_CLARITY),
                score(editarena::evaluator::METRIC_PUBLISH_READY),
                format!("${:.4}", item.run.cost_usd),
                format!("{}ms", item.run.latency_ms),
            );
        }
    }

    if let Some(ref log) = experiment.error_log {
        println!("\npartial failures: {log}");
    }

    if let Some(ref winner) = experiment.recommendation {
        println!("\nrecommendation: {winner}");
        if let Some(ref reason) = experiment.recommendation_reason {
            println!("  {reason}");
        }
        if let Some(ref tradeoffs) = experiment.tradeoffs {
            println!("  tradeoffs: {tradeoffs}");
        }
    }

    if experiment.status == ExperimentStatus::AwaitingDecision {
        println!(
            "\nawaiting decision; finalize with:\n  editarena decide {} <ship|iterate|rollback> --reason \"...\"",
            experiment.experiment_id
        );
    }
}
