//! Scout CLI - run a batch of research workers and steer their results.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use scout_core::{RawTask, TaskId, TaskStatus};
use scout_orchestrator::{
    BatchRequest, OrchestratorConfig, ProgressCallback, ProgressUpdate, ResearchService,
    SteerRequest,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Scout - delegate research to parallel worker processes
#[derive(Parser, Debug)]
#[command(name = "scout")]
#[command(about = "Run research tasks in parallel worker processes", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a batch of tasks
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Task as `prompt` or `id=prompt` (repeatable)
    #[arg(short, long = "task")]
    tasks: Vec<String>,

    /// JSON file holding an array of `{id?, prompt, workDir?}` tasks
    #[arg(long)]
    tasks_file: Option<PathBuf>,

    /// Concurrent workers (1-4, default 2)
    #[arg(short, long)]
    concurrency: Option<f64>,

    /// Re-run a task after the batch as `task-id=instruction` (repeatable)
    #[arg(long = "steer")]
    steers: Vec<String>,

    /// Worker executable
    #[arg(long)]
    worker: Option<String>,

    /// Worker argument placed before the prompt (repeatable, replaces the defaults)
    #[arg(long = "worker-arg", allow_hyphen_values = true)]
    worker_args: Vec<String>,

    /// Environment variable for the worker as `KEY=VALUE` (repeatable)
    #[arg(long = "worker-env")]
    worker_env: Vec<String>,

    /// Seconds between the terminate request and the forced kill
    #[arg(long)]
    grace_secs: Option<f64>,

    /// Default working directory for tasks
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Print run details as JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// Do not print progress
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let directive = if cli.verbose { "scout=debug" } else { "scout=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => run(args).await?,
    }

    Ok(())
}

async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut tasks: Vec<RawTask> = match &args.tasks_file {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => Vec::new(),
    };
    tasks.extend(args.tasks.iter().map(|t| parse_task_arg(t)));
    if tasks.is_empty() {
        return Err("no tasks given; use --task or --tasks-file".into());
    }
    let steers = args
        .steers
        .iter()
        .map(|s| parse_steer_arg(s))
        .collect::<Result<Vec<_>, _>>()?;

    let service = ResearchService::new(build_config(&args)?);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling running workers");
            ctrl_c.cancel();
        }
    });

    let progress = (!args.quiet).then(status_printer);
    let outcome = service
        .run_batch(
            BatchRequest {
                tasks,
                concurrency: args.concurrency,
            },
            cancel.clone(),
            progress.clone(),
        )
        .await?;
    let run_id = outcome.details.run_id.clone();
    let mut reports = vec![outcome];

    for (task_id, instruction) in steers {
        info!(run_id = %run_id, task_id = %task_id, "Applying steer");
        let steered = service
            .steer(
                SteerRequest {
                    run_id: run_id.clone(),
                    task_id,
                    instruction,
                },
                cancel.clone(),
                progress.clone(),
            )
            .await?;
        reports.push(steered);
    }

    if args.json {
        // The last report carries the run with every steer applied.
        if let Some(last) = reports.last() {
            println!("{}", serde_json::to_string_pretty(&last.details)?);
        }
    } else {
        let texts: Vec<&str> = reports.iter().map(|r| r.text.as_str()).collect();
        println!("{}", texts.join("\n\n"));
    }

    Ok(())
}

fn build_config(args: &RunArgs) -> Result<OrchestratorConfig, Box<dyn std::error::Error>> {
    let mut config = OrchestratorConfig::default();
    if let Some(worker) = &args.worker {
        config = config.with_worker(worker.clone());
    }
    if !args.worker_args.is_empty() {
        config = config.with_worker_args(args.worker_args.clone());
    }
    for pair in &args.worker_env {
        let (key, value) = parse_env_arg(pair)?;
        config = config.with_worker_env(key, value);
    }
    if let Some(secs) = args.grace_secs {
        config = config.with_grace_period(Duration::try_from_secs_f64(secs)?);
    }
    if let Some(cwd) = &args.cwd {
        config = config.with_default_work_dir(cwd.clone());
    }
    Ok(config)
}

/// `id=prompt` when the part before `=` is a plain word, otherwise the whole
/// argument is the prompt.
fn parse_task_arg(arg: &str) -> RawTask {
    match arg.split_once('=') {
        Some((id, prompt))
            if !id.trim().is_empty() && !id.trim().contains(char::is_whitespace) =>
        {
            RawTask::new(prompt.trim()).with_id(id.trim())
        }
        _ => RawTask::new(arg.trim()),
    }
}

fn parse_steer_arg(arg: &str) -> Result<(TaskId, String), String> {
    match arg.split_once('=') {
        Some((task, instruction)) if !task.trim().is_empty() && !instruction.trim().is_empty() => {
            Ok((TaskId::new(task.trim()), instruction.trim().to_string()))
        }
        _ => Err(format!("invalid --steer '{}': expected task-id=instruction", arg)),
    }
}

fn parse_env_arg(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("invalid --worker-env '{}': expected KEY=VALUE", arg)),
    }
}

/// Print the progress block to stderr whenever a task changes status.
fn status_printer() -> ProgressCallback {
    let last: Mutex<Vec<TaskStatus>> = Mutex::new(Vec::new());
    Arc::new(move |update: &ProgressUpdate| {
        let statuses: Vec<TaskStatus> = update.tasks.iter().map(|t| t.status).collect();
        let mut last = last.lock().unwrap_or_else(|e| e.into_inner());
        if *last != statuses {
            eprintln!("{}\n", update.text);
            *last = statuses;
        }
    })
}
