//! Session monitor: tails the active transcript and feeds the narration queue.
//!
//! NO_FILE → TAILING (discovery found a transcript, start at EOF)
//! TAILING → SWITCHING → TAILING (a newer transcript appeared, announce it)
//! TAILING → NO_FILE (transcript deleted or unreadable)
//!
//! Scheduling is cooperative polling: discovery re-runs every
//! `check_interval`, and an exhausted file is retried after `idle_poll`.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::config::{MonitorConfig, NarrationConfig};
use crate::dedup::SeenSet;
use crate::discovery::TranscriptDiscovery;
use crate::narration::{normalize_text, normalize_thinking, NarrationItem, NarrationSink};
use crate::transcript::{split_text_and_thinking, TranscriptRecord};

pub const SESSION_STARTED: &str = "新しいセッションが始まりました。";

/// An open transcript positioned after the last complete line read.
pub struct TailedFile {
    path: PathBuf,
    reader: BufReader<File>,
    // Bytes of a line the writer has not finished yet.
    partial: Vec<u8>,
}

impl TailedFile {
    /// Open `path` positioned at its end, so only new lines are seen.
    pub fn open_at_end(path: &Path) -> io::Result<Self> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::End(0))?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            partial: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next complete line, or `None` when no full line is available yet.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        let n = self.reader.read_until(b'\n', &mut self.partial)?;
        if n == 0 || !self.partial.ends_with(b"\n") {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.partial).trim_end().to_string();
        self.partial.clear();
        Ok(Some(line))
    }
}

pub enum MonitorState {
    NoFile,
    Tailing(TailedFile),
}

impl std::fmt::Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoFile => write!(f, "NO_FILE"),
            Self::Tailing(file) => write!(f, "TAILING({})", file_name(&file.path)),
        }
    }
}

/// What one poll step did; decides how long the loop sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Line,
    Idle,
    NoFile,
}

pub struct SessionMonitor<D, Q> {
    config: MonitorConfig,
    narration: NarrationConfig,
    discovery: D,
    sink: Q,
    stop: Arc<AtomicBool>,
    state: MonitorState,
    seen: SeenSet,
    last_check: Option<Instant>,
}

impl<D: TranscriptDiscovery, Q: NarrationSink> SessionMonitor<D, Q> {
    pub fn new(
        config: MonitorConfig,
        narration: NarrationConfig,
        discovery: D,
        sink: Q,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let seen = SeenSet::new(config.seen_capacity);
        Self {
            config,
            narration,
            discovery,
            sink,
            stop,
            state: MonitorState::NoFile,
            seen,
            last_check: None,
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn active_path(&self) -> Option<&Path> {
        match &self.state {
            MonitorState::Tailing(file) => Some(file.path()),
            MonitorState::NoFile => None,
        }
    }

    /// Poll until the stop flag is raised. Each step (glob walk, file
    /// reads) runs on the blocking pool.
    pub async fn run(mut self)
    where
        D: 'static,
        Q: Send + 'static,
    {
        info!(
            "Monitoring {:?} (check interval: {}s)",
            self.config.transcript_patterns, self.config.check_interval_secs
        );

        while !self.stop.load(Ordering::Relaxed) {
            let step = tokio::task::spawn_blocking(move || {
                let outcome = self.poll_once();
                (self, outcome)
            })
            .await;
            let (monitor, outcome) = match step {
                Ok(step) => step,
                Err(e) => {
                    error!("Monitor poll failed: {e}");
                    return;
                }
            };
            self = monitor;
            match outcome {
                PollOutcome::Line => tokio::task::yield_now().await,
                PollOutcome::Idle => tokio::time::sleep(self.config.idle_poll()).await,
                PollOutcome::NoFile => tokio::time::sleep(self.config.no_file_poll()).await,
            }
        }

        self.release();
        info!("Monitor stopped");
    }

    /// One step: periodic discovery, deletion check, then at most one line.
    pub fn poll_once(&mut self) -> PollOutcome {
        if self.discovery_due() {
            self.check_for_session();
        }

        if let MonitorState::Tailing(file) = &self.state {
            if !file.path.exists() {
                warn!("Transcript deleted: {}", file_name(&file.path));
                self.release();
                return PollOutcome::NoFile;
            }
        }

        let MonitorState::Tailing(file) = &mut self.state else {
            return PollOutcome::NoFile;
        };
        match file.next_line() {
            Ok(Some(line)) => {
                self.handle_line(&line);
                PollOutcome::Line
            }
            Ok(None) => PollOutcome::Idle,
            Err(e) => {
                warn!("Failed to read {}: {e}", file_name(&file.path));
                self.release();
                PollOutcome::NoFile
            }
        }
    }

    fn discovery_due(&self) -> bool {
        self.last_check
            .map_or(true, |t| t.elapsed() >= self.config.check_interval())
    }

    fn check_for_session(&mut self) {
        self.last_check = Some(Instant::now());
        let Some(latest) = self.discovery.find_latest() else {
            return;
        };

        match &self.state {
            MonitorState::Tailing(file) if file.path == latest => {}
            MonitorState::Tailing(file) => {
                info!(
                    "[SESSION SWITCH] {} -> {}",
                    file_name(&file.path),
                    file_name(&latest)
                );
                self.switch_to(&latest);
            }
            MonitorState::NoFile => {
                self.attach(&latest);
            }
        }
    }

    /// Close the current transcript, start tailing `path` and announce it.
    fn switch_to(&mut self, path: &Path) {
        self.release();
        if self.attach(path) {
            self.sink.enqueue(NarrationItem::new(
                SESSION_STARTED,
                self.narration.speed_normal,
                self.narration.volume_normal,
            ));
        }
    }

    fn attach(&mut self, path: &Path) -> bool {
        match TailedFile::open_at_end(path) {
            Ok(file) => {
                info!("Now monitoring: {}", file_name(path));
                self.seen.clear();
                self.state = MonitorState::Tailing(file);
                debug!("Monitor state: {}", self.state());
                true
            }
            Err(e) => {
                warn!("Failed to open {}: {e}", path.display());
                self.state = MonitorState::NoFile;
                false
            }
        }
    }

    /// Drop the file handle and forget what was seen in it.
    fn release(&mut self) {
        if let Some(path) = self.active_path() {
            debug!("Closing {}", file_name(path));
        }
        if !self.seen.is_empty() {
            debug!("Forgetting {} fingerprints", self.seen.len());
        }
        self.state = MonitorState::NoFile;
        self.seen.clear();
    }

    fn handle_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        let record = match TranscriptRecord::parse(line) {
            Ok(record) => record,
            Err(e) => {
                debug!("Skipping unparsable line: {e}");
                return;
            }
        };

        let fingerprint = record.fingerprint();
        if !self.seen.insert(fingerprint.clone()) {
            debug!("Skipping duplicate message {fingerprint}");
            return;
        }

        for item in narrate_record(&record, &self.narration) {
            self.sink.enqueue(item);
        }
    }
}

/// Narration for one record: thinking first, then the reply text.
pub fn narrate_record(record: &TranscriptRecord, config: &NarrationConfig) -> Vec<NarrationItem> {
    if !record.is_assistant() {
        return Vec::new();
    }
    info!("[Assistant] Response detected");

    let (text, thinking) = split_text_and_thinking(&record.items());
    let mut items = Vec::new();

    if !thinking.trim().is_empty() {
        if let Some(narration) = normalize_thinking(&thinking) {
            info!(
                "[Thinking] {} chars (volume: {})",
                narration.chars().count(),
                config.volume_thinking
            );
            items.push(NarrationItem::new(
                narration,
                config.speed_thinking,
                config.volume_thinking,
            ));
        }
    }

    if !text.trim().is_empty() {
        let narration = normalize_text(&text);
        if !narration.is_empty() {
            info!(
                "[Assistant] Full text reading: {} chars (volume: {})",
                narration.chars().count(),
                config.volume_normal
            );
            items.push(NarrationItem::new(
                narration,
                config.speed_normal,
                config.volume_normal,
            ));
        }
    }

    items
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<NarrationItem>>>);

    impl RecordingSink {
        fn texts(&self) -> Vec<String> {
            self.0.lock().unwrap().iter().map(|i| i.text.clone()).collect()
        }

        fn items(&self) -> Vec<NarrationItem> {
            self.0.lock().unwrap().clone()
        }
    }

    impl NarrationSink for RecordingSink {
        fn enqueue(&self, item: NarrationItem) {
            self.0.lock().unwrap().push(item);
        }
    }

    #[derive(Clone, Default)]
    struct FixedDiscovery(Arc<Mutex<Option<PathBuf>>>);

    impl FixedDiscovery {
        fn point_at(&self, path: Option<&Path>) {
            *self.0.lock().unwrap() = path.map(Path::to_path_buf);
        }
    }

    impl TranscriptDiscovery for FixedDiscovery {
        fn find_latest(&self) -> Option<PathBuf> {
            self.0.lock().unwrap().clone()
        }
    }

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new().create(true).append(true).open(path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    fn assistant_line(text: &str, timestamp: &str) -> String {
        serde_json::json!({
            "type": "assistant",
            "message": {"role": "assistant", "content": [{"type": "text", "text": text}]},
            "timestamp": timestamp,
        })
        .to_string()
            + "\n"
    }

    fn monitor(
        discovery: &FixedDiscovery,
        sink: &RecordingSink,
    ) -> SessionMonitor<FixedDiscovery, RecordingSink> {
        let config = MonitorConfig {
            check_interval_secs: 0,
            ..MonitorConfig::default()
        };
        SessionMonitor::new(
            config,
            NarrationConfig::default(),
            discovery.clone(),
            sink.clone(),
            Arc::new(AtomicBool::new(false)),
        )
    }

    /// Poll until nothing is left to read.
    fn drain(monitor: &mut SessionMonitor<FixedDiscovery, RecordingSink>) -> PollOutcome {
        loop {
            match monitor.poll_once() {
                PollOutcome::Line => continue,
                other => return other,
            }
        }
    }

    #[test]
    fn starts_at_end_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        append(&path, &assistant_line("昔の返事", "t0"));

        let discovery = FixedDiscovery::default();
        discovery.point_at(Some(&path));
        let sink = RecordingSink::default();
        let mut monitor = monitor(&discovery, &sink);

        assert_eq!(drain(&mut monitor), PollOutcome::Idle);
        assert_eq!(monitor.active_path(), Some(path.as_path()));
        assert!(sink.texts().is_empty());

        append(&path, &assistant_line("TODOを確認。\n\n次にAPIを呼ぶ。", "t1"));
        drain(&mut monitor);
        assert_eq!(sink.texts(), vec!["タスクを確認。次にエーピーアイを呼ぶ。"]);
    }

    #[test]
    fn thinking_is_queued_before_reply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        append(&path, "");

        let discovery = FixedDiscovery::default();
        discovery.point_at(Some(&path));
        let sink = RecordingSink::default();
        let mut monitor = monitor(&discovery, &sink);
        drain(&mut monitor);

        let line = serde_json::json!({
            "message": {"role": "assistant", "content": [
                {"type": "text", "text": "結果です"},
                {"type": "thinking", "thinking": "1. まず確認\n2. 次に実行"},
            ]},
        })
        .to_string();
        append(&path, &format!("{line}\n"));
        drain(&mut monitor);

        let defaults = NarrationConfig::default();
        assert_eq!(
            sink.items(),
            vec![
                NarrationItem::new(
                    "1、まず確認、2、次に実行",
                    defaults.speed_thinking,
                    defaults.volume_thinking
                ),
                NarrationItem::new("結果です", defaults.speed_normal, defaults.volume_normal),
            ]
        );
    }

    #[test]
    fn duplicates_are_narrated_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        append(&path, "");

        let discovery = FixedDiscovery::default();
        discovery.point_at(Some(&path));
        let sink = RecordingSink::default();
        let mut monitor = monitor(&discovery, &sink);
        drain(&mut monitor);

        let line = assistant_line("同じ返事", "t1");
        append(&path, &line);
        append(&path, &line);
        append(&path, &assistant_line("同じ返事", "t2"));
        drain(&mut monitor);

        assert_eq!(sink.texts(), vec!["同じ返事", "同じ返事"]);
    }

    #[test]
    fn partial_and_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        append(&path, "");

        let discovery = FixedDiscovery::default();
        discovery.point_at(Some(&path));
        let sink = RecordingSink::default();
        let mut monitor = monitor(&discovery, &sink);
        drain(&mut monitor);

        let line = assistant_line("書きかけ", "t1");
        let (head, tail) = line.split_at(20);
        append(&path, head);
        assert_eq!(drain(&mut monitor), PollOutcome::Idle);
        assert!(sink.texts().is_empty());

        append(&path, tail);
        append(&path, "{not json\n\n");
        append(&path, &assistant_line("次の返事", "t2"));
        drain(&mut monitor);

        assert_eq!(sink.texts(), vec!["書きかけ", "次の返事"]);
    }

    #[test]
    fn non_assistant_records_are_silent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        append(&path, "");

        let discovery = FixedDiscovery::default();
        discovery.point_at(Some(&path));
        let sink = RecordingSink::default();
        let mut monitor = monitor(&discovery, &sink);
        drain(&mut monitor);

        append(
            &path,
            "{\"message\":{\"role\":\"user\",\"content\":[{\"type\":\"text\",\"text\":\"質問\"}]}}\n",
        );
        append(&path, "{\"type\":\"summary\",\"summary\":\"要約\"}\n");
        drain(&mut monitor);

        assert!(sink.texts().is_empty());
    }

    #[test]
    fn session_switch_announces_and_clears_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.jsonl");
        let second = dir.path().join("second.jsonl");
        append(&first, "");
        append(&second, "");

        let discovery = FixedDiscovery::default();
        discovery.point_at(Some(&first));
        let sink = RecordingSink::default();
        let mut monitor = monitor(&discovery, &sink);
        drain(&mut monitor);

        let line = assistant_line("引き継ぎ", "t1");
        append(&first, &line);
        drain(&mut monitor);

        discovery.point_at(Some(&second));
        drain(&mut monitor);
        assert_eq!(monitor.active_path(), Some(second.as_path()));

        append(&second, &line);
        drain(&mut monitor);

        assert_eq!(sink.texts(), vec!["引き継ぎ", SESSION_STARTED, "引き継ぎ"]);
        let announcement = &sink.items()[1];
        assert_eq!(announcement.speed, NarrationConfig::default().speed_normal);
        assert_eq!(announcement.volume, NarrationConfig::default().volume_normal);
    }

    #[test]
    fn deleted_file_returns_to_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        append(&path, "");

        let discovery = FixedDiscovery::default();
        discovery.point_at(Some(&path));
        let sink = RecordingSink::default();
        let mut monitor = monitor(&discovery, &sink);
        drain(&mut monitor);

        discovery.point_at(None);
        fs::remove_file(&path).unwrap();
        assert_eq!(monitor.poll_once(), PollOutcome::NoFile);
        assert!(matches!(monitor.state(), MonitorState::NoFile));

        // Recreated transcript is picked up again without an announcement.
        append(&path, "");
        discovery.point_at(Some(&path));
        assert_eq!(drain(&mut monitor), PollOutcome::Idle);
        append(&path, &assistant_line("復帰", "t1"));
        drain(&mut monitor);
        assert_eq!(sink.texts(), vec!["復帰"]);
    }

    #[test]
    fn missing_transcript_keeps_retrying() {
        let discovery = FixedDiscovery::default();
        discovery.point_at(Some(Path::new("/nonexistent/claude-aloud/session.jsonl")));
        let sink = RecordingSink::default();
        let mut monitor = monitor(&discovery, &sink);

        assert_eq!(monitor.poll_once(), PollOutcome::NoFile);
        assert_eq!(monitor.poll_once(), PollOutcome::NoFile);
        assert!(monitor.active_path().is_none());
    }

    #[tokio::test]
    async fn run_exits_when_stopped() {
        let discovery = FixedDiscovery::default();
        let sink = RecordingSink::default();
        let stop = Arc::new(AtomicBool::new(false));
        let config = MonitorConfig {
            no_file_poll_ms: 10,
            ..MonitorConfig::default()
        };
        let monitor = SessionMonitor::new(
            config,
            NarrationConfig::default(),
            discovery,
            sink,
            stop.clone(),
        );

        let task = tokio::spawn(monitor.run());
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        stop.store(true, Ordering::Relaxed);
        tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_narrates_appended_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        append(&path, &assistant_line("昔の返事", "t0"));

        let discovery = FixedDiscovery::default();
        discovery.point_at(Some(&path));
        let sink = RecordingSink::default();
        let stop = Arc::new(AtomicBool::new(false));
        let config = MonitorConfig {
            idle_poll_ms: 5,
            ..MonitorConfig::default()
        };
        let monitor = SessionMonitor::new(
            config,
            NarrationConfig::default(),
            discovery,
            sink.clone(),
            stop.clone(),
        );
        let task = tokio::spawn(monitor.run());

        // Let the first step attach at EOF before writing.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        append(&path, &assistant_line("新しい返事", "t1"));

        let deadline = Instant::now() + std::time::Duration::from_secs(3);
        while sink.texts().is_empty() {
            assert!(Instant::now() < deadline, "no narration from run loop");
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(sink.texts(), vec!["新しい返事"]);

        stop.store(true, Ordering::Relaxed);
        tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn narrate_record_skips_empty_results() {
        let record = TranscriptRecord::parse(
            r#"{"message":{"role":"assistant","content":[{"type":"thinking","thinking":"***"},{"type":"text","text":"   "}]}}"#,
        )
        .unwrap();
        assert!(narrate_record(&record, &NarrationConfig::default()).is_empty());
    }
}
