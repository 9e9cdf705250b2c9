//! claude-aloud: reads Claude Code transcripts aloud through AivisSpeech.

mod config;
mod dedup;
mod discovery;
mod error;
mod housekeeping;
mod monitor;
mod narration;
mod speaker;
mod transcript;

use clap::Parser;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "claude-aloud", about = "Read Claude Code sessions aloud with AivisSpeech")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for per-run log files
    #[arg(long, default_value = "~/.claude-aloud/logs")]
    log_dir: String,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

/// stderr always; a per-run file in `log_dir` when it can be created.
fn init_logging(log_dir: &Path, verbose: bool) -> Option<PathBuf> {
    let filter = if verbose {
        EnvFilter::new("debug,reqwest=info,hyper_util=info")
    } else {
        EnvFilter::new("info")
    };

    let log_path = log_dir.join(housekeeping::log_file_name(chrono::Local::now()));
    let file_layer = std::fs::create_dir_all(log_dir)
        .and_then(|()| File::create(&log_path))
        .ok()
        .map(|f| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(f))
        });

    let logged_to = file_layer.as_ref().map(|_| log_path);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    logged_to
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_dir = PathBuf::from(config::expand_home(&args.log_dir));
    let log_file = init_logging(&log_dir, args.verbose);

    info!("claude-aloud starting");
    match &log_file {
        Some(path) => info!("Logging to {}", path.display()),
        None => warn!("Log directory {} unusable, logging to stderr only", log_dir.display()),
    }

    let config = config::Config::load(args.config.as_deref());
    info!(
        "Engine: {} (speaker {})",
        config.engine.base_url, config.engine.speaker_id
    );

    let state_dir = PathBuf::from(config::expand_home("~/.claude-aloud"));
    if let Err(e) = housekeeping::claim_pid_file(&state_dir) {
        warn!("Failed to write PID file in {}: {e}", state_dir.display());
    }
    housekeeping::cleanup_old_logs(&log_dir, config.logging.retention_days);

    let stop = Arc::new(AtomicBool::new(false));

    info!("Checking AivisSpeech Engine at {}...", config.engine.base_url);
    let speaker = match speaker::AivisSpeaker::new(&config.engine, stop.clone()) {
        Ok(speaker) => speaker,
        Err(e) => {
            error!("Failed to initialize speech output: {e}");
            housekeeping::release_pid_file(&state_dir);
            return Err(e.into());
        }
    };
    if let Err(e) = speaker.self_test().await {
        error!("AivisSpeech Engine is not available: {e}");
        eprintln!(
            "AivisSpeech Engine is not running at {}. Start AivisSpeech and try again.",
            config.engine.base_url
        );
        housekeeping::release_pid_file(&state_dir);
        return Err(e.into());
    }

    let queue = Arc::new(narration::NarrationQueue::new(
        Arc::new(speaker),
        config.narration.clone(),
        stop.clone(),
    ));
    let discovery = discovery::GlobDiscovery::new(&config.monitor.transcript_patterns);
    let monitor = monitor::SessionMonitor::new(
        config.monitor.clone(),
        config.narration.clone(),
        discovery,
        queue.clone(),
        stop.clone(),
    );

    let mut monitor_task = tokio::spawn(monitor.run());
    info!("Ready. Press Ctrl+C to stop.");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl+C: {e}");
            }
            info!("Shutting down...");
        }
        result = &mut monitor_task => {
            if let Err(e) = result {
                error!("Monitor task failed: {e}");
            }
        }
    }

    stop.store(true, Ordering::Relaxed);
    if !monitor_task.is_finished() {
        if let Err(e) = monitor_task.await {
            error!("Monitor task failed: {e}");
        }
    }
    queue.shutdown(SHUTDOWN_TIMEOUT).await;
    housekeeping::release_pid_file(&state_dir);

    info!("claude-aloud stopped");
    Ok(())
}
