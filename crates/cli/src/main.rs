//! CLI entry point for the proxy generator
//!
//! Parses command line arguments, sets up logging and runs one batch.

use chrono::Local;
use clap::Parser;
use proxygen::config::{Codec, ScaleFactor};
use proxygen::source::proxies_dir_for;
use proxygen::{
    check_required_tools, detect_accelerator, enumerate_batch, ffmpeg_version, BatchOutcome,
    BatchRunner, Config, ConflictResolver, DecisionKind, FfmpegTranscoder, FfprobeProbe,
    LinePrompter, RunContext, RunParameters, RunReport, SystemInfo, WorkerPlan,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use uuid::Uuid;

/// Generate editing proxies for a folder of footage or a single clip
#[derive(Parser, Debug)]
#[command(name = "proxygen")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source folder or video file (asked for on stdin when omitted)
    path: Option<PathBuf>,

    /// Proxy codec: prores, h264, hevc, dnxhr
    #[arg(long)]
    codec: Option<Codec>,

    /// Downscale factor: half, quarter
    #[arg(long)]
    scale: Option<ScaleFactor>,

    /// Process files one at a time
    #[arg(long)]
    no_parallel: bool,

    /// Maximum concurrent workers (0 = derive from CPU count)
    #[arg(long)]
    max_workers: Option<u32>,

    /// Skip sources whose proxy already exists with another extension
    #[arg(long)]
    auto_skip_duplicates: bool,

    /// Path to the configuration file
    #[arg(short, long, default_value = "proxygen.toml")]
    config: PathBuf,

    /// Centralized proxy repository to search for existing proxies
    #[arg(long)]
    repository: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply_to(&self, config: &mut Config) {
        if let Some(codec) = self.codec {
            config.proxy.codec = codec;
        }
        if let Some(scale) = self.scale {
            config.proxy.scale = scale;
        }
        if self.no_parallel {
            config.workers.parallel = false;
        }
        if let Some(max) = self.max_workers {
            config.workers.max_workers = max;
        }
        if self.auto_skip_duplicates {
            config.conflicts.auto_skip_duplicates = true;
        }
        if let Some(repo) = &self.repository {
            config.locations.repository_dir = Some(repo.clone());
        }
    }
}

/// Strip whitespace and one pair of surrounding quotes, as left by
/// drag-and-drop into a terminal.
fn clean_path_input(input: &str) -> PathBuf {
    let trimmed = input.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            trimmed
                .strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(trimmed);
    PathBuf::from(unquoted)
}

fn prompt_for_path() -> io::Result<PathBuf> {
    print!("Enter the folder or video file to process: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(clean_path_input(&line))
}

/// Console layer on stderr plus a plain-text log file in `log_dir`.
fn init_logging(verbose: bool, log_dir: &Path) -> Option<WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_name = format!("proxy-gen-{}.log", Local::now().format("%Y%m%d-%H%M%S"));
    let (file_layer, guard) = if std::fs::create_dir_all(log_dir).is_ok() {
        let appender = tracing_appender::rolling::never(log_dir, &file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let console_layer = fmt::layer().with_target(false).with_writer(io::stderr);

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if guard.is_some() {
        info!(log = %log_dir.join(&file_name).display(), "logging to file");
    }
    guard
}

/// Directory that holds the proxies directory, log and report.
fn output_dir_for(root: &Path, proxies_dir_name: &str) -> PathBuf {
    proxies_dir_for(root, root.is_file(), proxies_dir_name)
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| root.to_path_buf())
}

fn print_summary(outcome: &BatchOutcome, report_path: Option<&Path>) {
    println!();
    println!("Proxy generation summary");
    println!("  Files found:   {}", outcome.stats.found);
    for (kind, count) in outcome.counts() {
        println!("  {:<14} {}", format!("{}:", kind), count);
    }
    if outcome.conflicts_resolved > 0 {
        println!("  Conflicts resolved before encoding: {}", outcome.conflicts_resolved);
    }
    if outcome.was_interrupted() {
        println!("  Interrupted, not started: {}", outcome.not_dispatched.len());
    }
    println!("  Elapsed: {:.1}s", outcome.elapsed.as_secs_f64());

    let errors: Vec<_> = outcome
        .files
        .iter()
        .filter(|f| f.decision.kind() == DecisionKind::Error)
        .collect();
    if !errors.is_empty() {
        println!();
        println!("Errors:");
        for file in errors {
            println!("  {}: {}", file.source.path.display(), file.decision.reason());
        }
    }

    if let Some(path) = report_path {
        println!();
        println!("Report: {}", path.display());
    }
}

/// Per-file errors are reported in the summary and do not fail the run.
/// An interrupted run exits like a shell-interrupted command.
fn exit_status(outcome: &BatchOutcome) -> u8 {
    if outcome.was_interrupted() {
        130
    } else {
        0
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let root = match args.path.clone() {
        Some(path) => path,
        None => match prompt_for_path() {
            Ok(path) => path,
            Err(e) => {
                eprintln!("Failed to read path: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    let mut config = match Config::load_or_default(Some(&args.config)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };
    args.apply_to(&mut config);

    let root = root.canonicalize().unwrap_or(root);
    let output_dir = output_dir_for(&root, &config.locations.proxies_dir_name);
    let _log_guard = init_logging(args.verbose, &output_dir);

    if let Err(e) = check_required_tools() {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    let ffmpeg = match ffmpeg_version() {
        Ok(version) => Some(version),
        Err(e) => {
            warn!(error = %e, "could not read ffmpeg version");
            None
        }
    };
    let accelerator = detect_accelerator();

    let probe = Arc::new(FfprobeProbe);
    let batch = match enumerate_batch(&root, &config.locations.proxies_dir_name, probe.as_ref()) {
        Ok(batch) => batch,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if batch.files.is_empty() {
        println!("No video files found in {}", batch.root.display());
        return ExitCode::SUCCESS;
    }

    if let Err(e) = std::fs::create_dir_all(&batch.proxies_dir) {
        error!(dir = %batch.proxies_dir.display(), error = %e, "cannot create proxies directory");
        return ExitCode::FAILURE;
    }

    let workers = WorkerPlan::derive(&config);
    info!(
        files = batch.files.len(),
        codec = %config.proxy.codec,
        scale = %config.proxy.scale,
        workers = workers.workers,
        cores = workers.total_cores,
        proxies = %batch.proxies_dir.display(),
        "starting run"
    );

    let auto_skip = config.conflicts.auto_skip_duplicates;
    let resolver = if auto_skip {
        ConflictResolver::policy(true)
    } else {
        ConflictResolver::interactive(false, Box::new(LinePrompter::stdio()))
    };
    let prompt_during_run = !workers.parallel || batch.single_file;

    let ctx = RunContext::new(
        &config,
        batch.proxies_dir.clone(),
        accelerator,
        probe,
        Arc::new(FfmpegTranscoder),
    )
    .with_conflict_resolver(resolver, prompt_during_run);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing files already in progress");
            interrupt.cancel();
        }
    });

    let run_id = Uuid::new_v4();
    let started_at = Local::now();
    let runner = BatchRunner::new(workers, cancel);
    let outcome = match runner.run(ctx, batch.files).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let report = RunReport::build(
        run_id,
        started_at,
        &batch.root,
        &batch.proxies_dir,
        RunParameters::from_config(&config, workers.workers),
        SystemInfo::collect(ffmpeg, accelerator),
        &outcome,
    );
    let report_path = match report.write_json(&output_dir) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!(error = %e, "failed to write run report");
            None
        }
    };

    print_summary(&outcome, report_path.as_deref());

    ExitCode::from(exit_status(&outcome))
}
