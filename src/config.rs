//! Configuration management for claude-aloud.
//!
//! Loads config from YAML files in standard locations. Every section falls
//! back to defaults field by field, so an empty file is a valid config.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub base_url: String,
    pub speaker_id: u64,
    pub query_timeout_secs: u64,
    pub synthesis_timeout_secs: u64,
    pub startup_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:10101".into(),
            speaker_id: 1325133120,
            query_timeout_secs: 10,
            synthesis_timeout_secs: 20,
            startup_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    pub speed_normal: f32,
    pub speed_thinking: f32,
    pub volume_normal: f32,
    pub volume_thinking: f32,
    pub pause_sentence_ms: u64,
    pub pause_paragraph_ms: u64,
    /// Items longer than this (in characters) are split before playback.
    pub max_length: usize,
    /// Target chunk length used when splitting.
    pub optimal_length: usize,
    pub queue_poll_ms: u64,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            speed_normal: 1.0,
            speed_thinking: 1.1,
            volume_normal: 1.0,
            volume_thinking: 0.5,
            pause_sentence_ms: 500,
            pause_paragraph_ms: 800,
            max_length: 500,
            optimal_length: 300,
            queue_poll_ms: 1000,
        }
    }
}

impl NarrationConfig {
    pub fn pause_sentence(&self) -> Duration {
        Duration::from_millis(self.pause_sentence_ms)
    }

    pub fn pause_paragraph(&self) -> Duration {
        Duration::from_millis(self.pause_paragraph_ms)
    }

    pub fn queue_poll(&self) -> Duration {
        Duration::from_millis(self.queue_poll_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Glob patterns searched for the newest transcript. `~/` is expanded.
    pub transcript_patterns: Vec<String>,
    pub check_interval_secs: u64,
    pub idle_poll_ms: u64,
    pub no_file_poll_ms: u64,
    pub seen_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            transcript_patterns: vec!["~/.claude/projects/**/*.jsonl".into()],
            check_interval_secs: 10,
            idle_poll_ms: 50,
            no_file_poll_ms: 1000,
            seen_capacity: 100,
        }
    }
}

impl MonitorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn no_file_poll(&self) -> Duration {
        Duration::from_millis(self.no_file_poll_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub retention_days: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { retention_days: 7 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub narration: NarrationConfig,
    pub monitor: MonitorConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/claude-aloud/config.yaml
    /// 3. /etc/claude-aloud/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/claude-aloud/config.yaml")),
                Some(PathBuf::from("/etc/claude-aloud/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::from_yaml(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().into_owned(),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = Config::from_yaml(
            "engine:\n  speaker_id: 888753760\nnarration:\n  volume_thinking: 0.3\n",
        )
        .unwrap();

        assert_eq!(config.engine.speaker_id, 888753760);
        assert_eq!(config.engine.base_url, "http://127.0.0.1:10101");
        assert_eq!(config.narration.volume_thinking, 0.3);
        assert_eq!(config.narration.max_length, 500);
        assert_eq!(config.monitor.seen_capacity, 100);
        assert_eq!(config.monitor.check_interval(), Duration::from_secs(10));
    }

    #[test]
    fn expand_home_leaves_absolute_paths_alone() {
        assert_eq!(expand_home("/var/log/aloud"), "/var/log/aloud");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_home("~/.claude"),
                home.join(".claude").to_string_lossy()
            );
        }
    }
}
