//! FIFO narration queue drained by a single playback worker.
//!
//! The worker is a tokio task that owns the receiving end for as long as it
//! runs. It is spawned on the first enqueue and respawned on a later enqueue
//! if it has died. Utterances never overlap: each item (or each chunk of a
//! long item) is played to completion before the next one is dequeued.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::chunker::{split_naturally, PARAGRAPH_MARK};
use crate::config::NarrationConfig;
use crate::speaker::Speaker;

/// One utterance request. Ownership moves to the queue on enqueue.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationItem {
    pub text: String,
    pub speed: f32,
    pub volume: f32,
}

impl NarrationItem {
    pub fn new(text: impl Into<String>, speed: f32, volume: f32) -> Self {
        Self {
            text: text.into(),
            speed,
            volume,
        }
    }
}

/// Anything narration can be handed to without waiting for playback.
pub trait NarrationSink {
    fn enqueue(&self, item: NarrationItem);
}

impl<T: NarrationSink + ?Sized> NarrationSink for Arc<T> {
    fn enqueue(&self, item: NarrationItem) {
        (**self).enqueue(item);
    }
}

enum QueueMessage {
    Narrate(NarrationItem),
    /// Wakes the worker so it exits without waiting out its poll timeout.
    Shutdown,
}

pub struct NarrationQueue<S: Speaker> {
    tx: UnboundedSender<QueueMessage>,
    rx: Arc<AsyncMutex<UnboundedReceiver<QueueMessage>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
    speaker: Arc<S>,
    config: NarrationConfig,
    stop: Arc<AtomicBool>,
}

impl<S: Speaker> NarrationQueue<S> {
    pub fn new(speaker: Arc<S>, config: NarrationConfig, stop: Arc<AtomicBool>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(AsyncMutex::new(rx)),
            worker: Mutex::new(None),
            pending: Arc::new(AtomicUsize::new(0)),
            speaker,
            config,
            stop,
        }
    }

    /// Items enqueued but not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub fn is_worker_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn ensure_worker(&self) {
        let mut worker = self.worker.lock().unwrap();
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        if worker.take().is_some() {
            warn!("Playback worker died, starting a new one");
        }

        let playback = PlaybackWorker {
            rx: self.rx.clone(),
            pending: self.pending.clone(),
            speaker: self.speaker.clone(),
            config: self.config.clone(),
            stop: self.stop.clone(),
        };
        *worker = Some(tokio::spawn(playback.run()));
    }

    /// Raise the stop flag, wake the worker and wait up to `timeout` for it.
    pub async fn shutdown(&self, timeout: Duration) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.tx.send(QueueMessage::Shutdown);

        let handle = self.worker.lock().unwrap().take();
        let Some(handle) = handle else {
            return;
        };
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => debug!("Playback worker joined"),
            Ok(Err(e)) => warn!("Playback worker ended abnormally: {e}"),
            Err(_) => warn!("Playback worker did not stop within {timeout:?}"),
        }
    }
}

impl<S: Speaker> NarrationSink for NarrationQueue<S> {
    fn enqueue(&self, item: NarrationItem) {
        if item.text.trim().is_empty() {
            return;
        }
        if self.stop.load(Ordering::Relaxed) {
            debug!("Stopping, dropping narration of {} chars", item.text.chars().count());
            return;
        }

        self.ensure_worker();
        let chars = item.text.chars().count();
        let volume = item.volume;
        self.pending.fetch_add(1, Ordering::Relaxed);
        if self.tx.send(QueueMessage::Narrate(item)).is_err() {
            self.pending.fetch_sub(1, Ordering::Relaxed);
            warn!("Narration queue closed, dropping {chars} chars");
            return;
        }
        info!("[Queue] Added: {chars} chars (vol:{volume}, queue_size:{})", self.pending());
    }
}

struct PlaybackWorker<S: Speaker> {
    rx: Arc<AsyncMutex<UnboundedReceiver<QueueMessage>>>,
    pending: Arc<AtomicUsize>,
    speaker: Arc<S>,
    config: NarrationConfig,
    stop: Arc<AtomicBool>,
}

impl<S: Speaker> PlaybackWorker<S> {
    async fn run(self) {
        let mut rx = self.rx.lock().await;
        info!("Playback worker started");

        while !self.stop.load(Ordering::Relaxed) {
            let message = match tokio::time::timeout(self.config.queue_poll(), rx.recv()).await {
                Err(_) => continue,
                Ok(None) => break,
                Ok(Some(message)) => message,
            };
            match message {
                QueueMessage::Shutdown => break,
                QueueMessage::Narrate(item) => {
                    self.pending.fetch_sub(1, Ordering::Relaxed);
                    self.narrate(item).await;
                }
            }
        }

        info!("Playback worker stopped");
    }

    async fn narrate(&self, item: NarrationItem) {
        let chars = item.text.chars().count();
        info!("Processing: {chars} chars (volume: {})", item.volume);

        if chars <= self.config.max_length {
            self.speak(&item.text, item.speed, item.volume).await;
            return;
        }

        let chunks = split_naturally(&item.text, self.config.optimal_length);
        info!("Split into {} parts", chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            if self.stop.load(Ordering::Relaxed) {
                break;
            }
            debug!("Part {}/{}: {} chars", i + 1, chunks.len(), chunk.chars().count());
            let spoken = self.speak(chunk, item.speed, item.volume).await;
            if spoken && i + 1 < chunks.len() {
                let pause = if chunk.contains(PARAGRAPH_MARK) {
                    self.config.pause_paragraph()
                } else {
                    self.config.pause_sentence()
                };
                tokio::time::sleep(pause).await;
            }
        }
    }

    async fn speak(&self, text: &str, speed: f32, volume: f32) -> bool {
        match self.speaker.speak(text, speed, volume).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Narration failed, skipping: {e}");
                false
            }
        }
    }
}
