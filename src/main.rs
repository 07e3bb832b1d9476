use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use capture_flow::config::{ClientConfig, ConfigError, WorkflowConfig, normalize_base_url};
use capture_flow::inference::{AnalysisResult, HttpInferenceClient, ImageFile, InferenceError, InferenceService};
use capture_flow::services::WorkflowController;
use capture_flow::state::connectivity::NOT_READY_MESSAGE;
use capture_flow::state::{PreviewOutcome, SlotError, SlotKey, SubmissionError, ValidationError};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Slot(#[from] SlotError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error("failed to read {path}: {source}")]
    ReadImage { path: String, source: std::io::Error },
    #[error("{0}")]
    NotReady(&'static str),
    #[error("service not connected after {secs}s: {reason}")]
    NotConnected { secs: u64, reason: String },
    #[error("preview rejected for the {0} image")]
    PreviewRejected(SlotKey),
    #[error("preview task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "capture-flow", about = "Front/side image capture and analysis client")]
struct Cli {
    /// Overrides the configured inference service URL.
    #[arg(long, env = "CAPTURE_API_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe service readiness once.
    Health,
    /// Show the loaded model and the ones available.
    Models,
    /// Ask the service to load a different model.
    SwitchModel { model_name: String },
    /// Run the full capture workflow for a front and side image.
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[arg(long)]
    front: PathBuf,

    #[arg(long)]
    side: PathBuf,

    #[arg(long, default_value_t = 30, help = "How long to wait for the service to become ready")]
    connect_timeout_secs: u64,

    #[arg(long, default_value_t = false, help = "Retry generated previews instead of accepting them")]
    reject_previews: bool,

    #[arg(long, default_value_t = false, help = "Print the raw result JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url.as_deref() {
        config.service.base_url = normalize_base_url(base_url)?;
    }
    let client = HttpInferenceClient::new(&config.service)?;

    match cli.command {
        Command::Health => run_health(&client).await,
        Command::Models => run_models(&client).await,
        Command::SwitchModel { model_name } => run_switch_model(&client, &model_name).await,
        Command::Analyze(args) => run_analyze(client, config.workflow, args).await,
    }
}

async fn run_health(client: &HttpInferenceClient) -> Result<(), CliError> {
    let report = client.health().await?;
    println!(
        "status={} model_loaded={} timestamp={}",
        report.status,
        report.model_loaded,
        report.timestamp.as_deref().unwrap_or("-")
    );
    if !report.is_ready() {
        return Err(CliError::NotReady(NOT_READY_MESSAGE));
    }
    println!("ready");
    Ok(())
}

async fn run_models(client: &HttpInferenceClient) -> Result<(), CliError> {
    let info = client.model_info().await?;
    let current = info.current_model();
    let available = info.available_models();
    if available.is_empty() {
        return print_json(info.as_value());
    }
    for model in &available {
        let marker = if Some(model.as_str()) == current { "*" } else { " " };
        println!("{marker} {model}");
    }
    Ok(())
}

async fn run_switch_model(client: &HttpInferenceClient, model_name: &str) -> Result<(), CliError> {
    let result = client.switch_model(model_name).await?;
    print_json(&result)
}

async fn run_analyze(client: HttpInferenceClient, workflow: WorkflowConfig, args: AnalyzeArgs) -> Result<(), CliError> {
    let front = load_image(&args.front).await?;
    let side = load_image(&args.side).await?;

    let controller = WorkflowController::new(Arc::new(client), workflow);
    controller.start();
    let outcome = drive_workflow(&controller, [(SlotKey::Front, front), (SlotKey::Side, side)], &args).await;
    controller.stop();

    let result = outcome?;
    if args.json {
        return print_json(result.as_value());
    }
    print_result(&result)
}

async fn drive_workflow(
    controller: &WorkflowController,
    images: [(SlotKey, ImageFile); 2],
    args: &AnalyzeArgs,
) -> Result<AnalysisResult, CliError> {
    wait_connected(controller, args.connect_timeout_secs).await?;

    for (slot, image) in images {
        match controller.select_image(slot, image)?.await? {
            PreviewOutcome::Attached if args.reject_previews => {
                controller.retry_preview(slot)?;
                return Err(CliError::PreviewRejected(slot));
            }
            PreviewOutcome::Attached => {
                controller.accept_preview(slot)?;
                info!(%slot, "preview accepted");
            }
            PreviewOutcome::Failed => warn!(%slot, "no preview available; continuing without it"),
            PreviewOutcome::Stale => {}
        }
    }

    Ok(controller.submit().await?)
}

async fn wait_connected(controller: &WorkflowController, secs: u64) -> Result<(), CliError> {
    let mut changes = controller.subscribe();
    let reached = tokio::time::timeout(Duration::from_secs(secs), async {
        loop {
            if controller.snapshot().connectivity().is_connected() {
                return true;
            }
            if changes.changed().await.is_err() {
                return false;
            }
        }
    })
    .await;

    if matches!(reached, Ok(true)) {
        return Ok(());
    }
    let reason = controller
        .snapshot()
        .connectivity()
        .error()
        .unwrap_or("no response from health probe")
        .to_owned();
    Err(CliError::NotConnected { secs, reason })
}

async fn load_image(path: &Path) -> Result<ImageFile, CliError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| CliError::ReadImage {
        path: path.display().to_string(),
        source,
    })?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image")
        .to_owned();
    let media_type = ImageFile::media_type_for(&file_name);
    Ok(ImageFile::new(file_name, media_type, bytes))
}

fn print_result(result: &AnalysisResult) -> Result<(), CliError> {
    let measurements = result.measurements();
    if measurements.is_empty() {
        return print_json(result.as_value());
    }
    if let Some(model) = result.model() {
        println!("model: {model}");
    }
    for measurement in &measurements {
        println!("{:<24} {}", measurement.label(), measurement.display_text());
    }
    for warning in result.warnings() {
        println!("warning: {warning}");
    }
    Ok(())
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
