//! Locating the active transcript: the most recently modified JSONL file.

use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::config::expand_home;

pub trait TranscriptDiscovery: Send {
    /// Newest matching transcript, if any exists.
    fn find_latest(&self) -> Option<PathBuf>;
}

pub struct GlobDiscovery {
    patterns: Vec<String>,
}

impl GlobDiscovery {
    pub fn new(patterns: &[String]) -> Self {
        Self {
            patterns: patterns.iter().map(|p| expand_home(p)).collect(),
        }
    }
}

impl TranscriptDiscovery for GlobDiscovery {
    fn find_latest(&self) -> Option<PathBuf> {
        let mut newest: Option<(SystemTime, PathBuf)> = None;

        for pattern in &self.patterns {
            let paths = match glob::glob(pattern) {
                Ok(paths) => paths,
                Err(e) => {
                    warn!("Invalid transcript pattern {pattern}: {e}");
                    continue;
                }
            };

            for path in paths.flatten() {
                let Ok(metadata) = fs::metadata(&path) else {
                    continue;
                };
                if !metadata.is_file() {
                    continue;
                }
                let Ok(modified) = metadata.modified() else {
                    continue;
                };
                if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
                    newest = Some((modified, path));
                }
            }
        }

        if newest.is_none() {
            debug!("No transcript matches {:?}", self.patterns);
        }
        newest.map(|(_, path)| path)
    }
}
