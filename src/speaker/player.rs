//! WAV playback through rodio, blocking the caller until the clip ends.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use tracing::{debug, info};

use crate::error::{AloudError, Result};

const PLAYBACK_POLL: Duration = Duration::from_millis(10);

pub struct AudioPlayer {
    // Kept alive for the process lifetime; dropping it silences every sink.
    stream: OutputStream,
    stop: Arc<AtomicBool>,
}

impl AudioPlayer {
    /// Open the default output device. `stop` interrupts any clip in progress.
    pub fn open(stop: Arc<AtomicBool>) -> Result<Self> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| AloudError::Playback(format!("Failed to open audio output: {e}")))?;
        Ok(Self { stream, stop })
    }

    /// Decode and play `audio`, returning once playback finishes or the stop
    /// flag is raised.
    pub async fn play(&self, audio: Vec<u8>) -> Result<()> {
        let source = Decoder::new(Cursor::new(audio))
            .map_err(|e| AloudError::Playback(format!("Failed to decode audio: {e}")))?;

        let sink = Sink::connect_new(self.stream.mixer());
        sink.append(source);

        let stop = self.stop.clone();
        let t0 = Instant::now();
        let interrupted = tokio::task::spawn_blocking(move || loop {
            if sink.empty() {
                return false;
            }
            if stop.load(Ordering::Relaxed) {
                sink.stop();
                return true;
            }
            std::thread::sleep(PLAYBACK_POLL);
        })
        .await
        .map_err(|e| AloudError::Playback(format!("Playback wait failed: {e}")))?;

        if interrupted {
            info!("Playback interrupted after {:.1}s", t0.elapsed().as_secs_f64());
        } else {
            debug!("Played clip in {:.1}s", t0.elapsed().as_secs_f64());
        }
        Ok(())
    }
}
