//! Speech output: engine synthesis followed by blocking playback.
//!
//! - `engine`: AivisSpeech HTTP client (audio query + synthesis)
//! - `player`: rodio playback with stop-flag interruption

pub mod engine;
pub mod player;

use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::EngineConfig;
use crate::error::{AloudError, Result};

use self::engine::AivisClient;
use self::player::AudioPlayer;

const SELF_TEST_TEXT: &str = "音声システム動作確認です";
const SELF_TEST_SPEED: f32 = 1.1;

/// Something that can say a piece of text out loud.
pub trait Speaker: Send + Sync + 'static {
    /// Resolves once the utterance has finished playing.
    fn speak(
        &self,
        text: &str,
        speed: f32,
        volume: f32,
    ) -> impl Future<Output = Result<()>> + Send;
}

pub struct AivisSpeaker {
    engine: AivisClient,
    player: AudioPlayer,
    startup_timeout: Duration,
}

impl AivisSpeaker {
    pub fn new(config: &EngineConfig, stop: Arc<AtomicBool>) -> Result<Self> {
        Ok(Self {
            engine: AivisClient::new(config)?,
            player: AudioPlayer::open(stop)?,
            startup_timeout: Duration::from_secs(config.startup_timeout_secs),
        })
    }

    /// Synthesize and play a short phrase to prove the engine is up.
    pub async fn self_test(&self) -> Result<()> {
        let audio = tokio::time::timeout(
            self.startup_timeout,
            self.engine.synthesize(SELF_TEST_TEXT, SELF_TEST_SPEED, 1.0),
        )
        .await
        .map_err(|_| AloudError::Timeout(self.startup_timeout))??;

        self.player.play(audio).await?;
        info!("AivisSpeech Engine is running at {}", self.engine.base_url());
        Ok(())
    }
}

impl Speaker for AivisSpeaker {
    async fn speak(&self, text: &str, speed: f32, volume: f32) -> Result<()> {
        let audio = self.engine.synthesize(text, speed, volume).await?;
        self.player.play(audio).await
    }
}
