//! Startup housekeeping: per-run log files, log retention and the PID file.

use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

const LOG_PREFIX: &str = "aloud_";
const LOG_SUFFIX: &str = ".log";
const PID_FILE: &str = "claude-aloud.pid";
const LOCK_FILE: &str = "claude-aloud.lock";

/// File name for a run started at `started`.
pub fn log_file_name(started: DateTime<Local>) -> String {
    format!("{LOG_PREFIX}{}{LOG_SUFFIX}", started.format("%Y%m%d_%H%M%S"))
}

fn is_log_file(name: &str) -> bool {
    name.starts_with(LOG_PREFIX) && name.ends_with(LOG_SUFFIX)
}

/// Delete run logs in `dir` last modified more than `retention_days` ago.
/// Returns how many were removed.
pub fn cleanup_old_logs(dir: &Path, retention_days: u64) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Skipping log cleanup for {}: {e}", dir.display());
            return 0;
        }
    };

    let max_age = Duration::from_secs(retention_days * 24 * 60 * 60);
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in entries.flatten() {
        let name = entry.file_name();
        if !is_log_file(&name.to_string_lossy()) {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        let expired = now
            .duration_since(modified)
            .map_or(false, |age| age > max_age);
        if !expired {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove old log {}: {e}", entry.path().display()),
        }
    }

    if removed > 0 {
        info!("Removed {removed} log file(s) older than {retention_days} days");
    }
    removed
}

/// Clear stale lock files in `state_dir` and record this process's PID.
///
/// Returns the PID left behind by a previous run, if any.
pub fn claim_pid_file(state_dir: &Path) -> io::Result<Option<u32>> {
    fs::create_dir_all(state_dir)?;

    let lock = state_dir.join(LOCK_FILE);
    if lock.exists() {
        fs::remove_file(&lock)?;
        debug!("Removed stale lock file {}", lock.display());
    }

    let pid_path = state_dir.join(PID_FILE);
    let previous = fs::read_to_string(&pid_path)
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok());
    if let Some(pid) = previous {
        warn!("Found PID file from an earlier run (pid {pid})");
    }

    fs::write(&pid_path, format!("{}\n", std::process::id()))?;
    Ok(previous)
}

/// Remove the PID file if it still names this process.
pub fn release_pid_file(state_dir: &Path) {
    let pid_path = state_dir.join(PID_FILE);
    let ours = fs::read_to_string(&pid_path)
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok())
        == Some(std::process::id());
    if ours {
        if let Err(e) = fs::remove_file(&pid_path) {
            warn!("Failed to remove {}: {e}", pid_path.display());
        }
    }
}
