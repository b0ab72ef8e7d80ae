//! Command-line front end.
//!
//! Usage:
//!   credit-risk train --data german_credit.jsonl [--config train.json] [--cv] [--artifact model.bin]
//!   credit-risk predict applicant.json [--artifact model.bin] [--explain]
//!   credit-risk predict-batch applicants.jsonl scored.jsonl [--artifact model.bin]
//!   credit-risk schema [--artifact model.bin] [--header header.csv]
//!
//! Logs go to stderr; `RUST_LOG` controls the filter unless `-v` is given.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use credit_risk::data::LabeledDataset;
use credit_risk::persist::write_atomic;
use credit_risk::training::{CrossValidation, TrainingConfig, TrainingOrchestrator};
use credit_risk::{ApplicantRecord, ScoringService};

const DEFAULT_ARTIFACT: &str = "model.bin";

#[derive(Debug, Parser)]
#[command(
    name = "credit-risk",
    version,
    about = "Train and run a credit default scoring model"
)]
struct Cli {
    /// Log at debug level (-vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fit, evaluate and save a model
    Train(TrainArgs),
    /// Score one applicant given as a JSON object
    Predict(PredictArgs),
    /// Score a JSON Lines file, appending prob_default and risk to each row
    PredictBatch(PredictBatchArgs),
    /// Print the input fields and encoded features of a model
    Schema(SchemaArgs),
}

#[derive(Debug, Args)]
struct ArtifactArg {
    /// Model artifact (.json for JSON, anything else for binary)
    #[arg(long, default_value = DEFAULT_ARTIFACT)]
    artifact: PathBuf,
}

#[derive(Debug, Args)]
struct TrainArgs {
    /// Labeled applicants: JSON array or JSON Lines with a `class` column
    #[arg(long)]
    data: PathBuf,

    /// Training config as JSON; missing keys take their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Choose the L2 strength by cross-validated grid search
    #[arg(long)]
    cv: bool,

    #[command(flatten)]
    artifact: ArtifactArg,

    /// Report path (default: <artifact>.report.json)
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct PredictArgs {
    /// JSON file with one applicant object
    record: PathBuf,

    #[command(flatten)]
    artifact: ArtifactArg,

    /// Print probability, tier and attributions instead of the wire response
    #[arg(long)]
    explain: bool,
}

#[derive(Debug, Args)]
struct PredictBatchArgs {
    input: PathBuf,
    output: PathBuf,

    #[command(flatten)]
    artifact: ArtifactArg,
}

#[derive(Debug, Args)]
struct SchemaArgs {
    #[command(flatten)]
    artifact: ArtifactArg,

    /// Also write a CSV header line with the input fields
    #[arg(long)]
    header: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Train(args) => train(args),
        Command::Predict(args) => predict(args),
        Command::PredictBatch(args) => predict_batch(args),
        Command::Schema(args) => schema(args),
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn train(args: TrainArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => TrainingConfig::from_json_file(path)?,
        None => TrainingConfig::default(),
    };
    if args.cv && config.cross_validation.is_none() {
        config.cross_validation = Some(CrossValidation::default());
    }

    let dataset = LabeledDataset::load(&args.data)
        .with_context(|| format!("failed to load {}", args.data.display()))?;
    let mut orchestrator = TrainingOrchestrator::new(config)?;
    let (artifact, report) = orchestrator.run(&dataset, &args.artifact.artifact, args.report.as_deref())?;

    println!(
        "model {}: roc_auc={:.4} accuracy={:.4} f1={:.4}",
        artifact.model_id(),
        report.roc_auc(),
        report.accuracy(),
        report.f1()
    );
    Ok(())
}

fn load_service(path: &Path) -> Result<ScoringService> {
    ScoringService::load(path).with_context(|| format!("failed to load model {}", path.display()))
}

fn predict(args: PredictArgs) -> Result<()> {
    let service = load_service(&args.artifact.artifact)?;
    let text = fs::read_to_string(&args.record)
        .with_context(|| format!("failed to read {}", args.record.display()))?;
    let record = ApplicantRecord::from_json_str(&text)?;

    let json = if args.explain {
        serde_json::to_string_pretty(&service.score(&record)?)?
    } else {
        serde_json::to_string(&service.predict(&record)?)?
    };
    println!("{json}");
    Ok(())
}

fn predict_batch(args: PredictBatchArgs) -> Result<()> {
    let service = load_service(&args.artifact.artifact)?;
    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let mut rows: Vec<(usize, Map<String, Value>)> = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line).with_context(|| format!("line {}", i + 1))? {
            Value::Object(map) => rows.push((i + 1, map)),
            _ => bail!("line {}: expected a JSON object", i + 1),
        }
    }
    let records = rows
        .iter()
        .map(|(line, map)| ApplicantRecord::from_json_map(map).with_context(|| format!("line {line}")))
        .collect::<Result<Vec<_>>>()?;

    let mut out = String::new();
    for ((line, mut map), result) in rows.into_iter().zip(service.predict_batch(&records)) {
        let response = result.with_context(|| format!("line {line}"))?;
        map.insert("prob_default".into(), Value::from(response.prob_default));
        map.insert("risk".into(), Value::from(response.risk.as_str()));
        out.push_str(&Value::Object(map).to_string());
        out.push('\n');
    }
    write_atomic(&args.output, out.as_bytes())?;
    tracing::info!(rows = records.len(), output = %args.output.display(), "scored batch");
    Ok(())
}

fn schema(args: SchemaArgs) -> Result<()> {
    let service = load_service(&args.artifact.artifact)?;
    let schema = service.schema();
    if let Some(path) = &args.header {
        write_atomic(path, format!("{}\n", schema.header()).as_bytes())?;
    }
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
