//! AivisSpeech engine client (VOICEVOX-compatible HTTP API).
//!
//! Synthesis is two calls: `/audio_query` turns text into synthesis
//! parameters, `/synthesis` turns (possibly adjusted) parameters into WAV.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{AloudError, Result};

pub struct AivisClient {
    base_url: String,
    speaker_id: u64,
    query_timeout: Duration,
    synthesis_timeout: Duration,
    client: Client,
}

impl AivisClient {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.startup_timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            speaker_id: config.speaker_id,
            query_timeout: Duration::from_secs(config.query_timeout_secs),
            synthesis_timeout: Duration::from_secs(config.synthesis_timeout_secs),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Synthesis parameters for `text`, as returned by the engine.
    pub async fn audio_query(&self, text: &str) -> Result<Value> {
        let speaker = self.speaker_id.to_string();
        let resp = self
            .client
            .post(format!("{}/audio_query", self.base_url))
            .query(&[("speaker", speaker.as_str()), ("text", text)])
            .timeout(self.query_timeout)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AloudError::EngineStatus {
                stage: "AudioQuery",
                status: resp.status(),
            });
        }
        Ok(resp.json::<Value>().await?)
    }

    /// WAV bytes for `text` at the given speed and volume scale.
    pub async fn synthesize(&self, text: &str, speed: f32, volume: f32) -> Result<Vec<u8>> {
        let mut query = self.audio_query(text).await?;
        apply_scales(&mut query, speed, volume)?;

        let resp = self
            .client
            .post(format!("{}/synthesis", self.base_url))
            .query(&[("speaker", self.speaker_id)])
            .json(&query)
            .timeout(self.synthesis_timeout)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AloudError::EngineStatus {
                stage: "Synthesis",
                status: resp.status(),
            });
        }

        let audio = resp.bytes().await?;
        debug!("Synthesized {} chars into {} bytes", text.chars().count(), audio.len());
        Ok(audio.to_vec())
    }
}

/// Override `speedScale` and `volumeScale` in an audio query.
pub fn apply_scales(query: &mut Value, speed: f32, volume: f32) -> Result<()> {
    let fields = query.as_object_mut().ok_or(AloudError::MalformedQuery)?;
    fields.insert("speedScale".into(), json!(speed));
    fields.insert("volumeScale".into(), json!(volume));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_replace_engine_defaults() {
        let mut query = json!({
            "accent_phrases": [],
            "speedScale": 1.0,
            "pitchScale": 0.0,
            "volumeScale": 1.0,
            "outputSamplingRate": 24000
        });
        apply_scales(&mut query, 1.5, 0.5).unwrap();

        assert_eq!(query["speedScale"], json!(1.5));
        assert_eq!(query["volumeScale"], json!(0.5));
        assert_eq!(query["pitchScale"], json!(0.0));
        assert_eq!(query["outputSamplingRate"], json!(24000));
    }

    #[test]
    fn non_object_query_is_rejected() {
        let mut query = json!(["not", "a", "query"]);
        assert!(matches!(
            apply_scales(&mut query, 1.0, 1.0),
            Err(AloudError::MalformedQuery)
        ));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let config = EngineConfig {
            base_url: "http://localhost:10101/".into(),
            ..EngineConfig::default()
        };
        let client = AivisClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:10101");
    }
}
