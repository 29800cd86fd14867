//! External web TTS engine.
//!
//! Fetches rendered MP3 from a public translate-TTS style endpoint and
//! plays it through the audio sink. Used late in the Samsung chain when
//! the local engine will not make a sound no matter how it is primed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;

use super::interface::{
    AudioSink, EngineEvent, SpeechError, SynthesisEngine, Utterance, VoiceInfo,
};
use crate::config::TtsUpstreamConfig;

pub struct WebTtsEngine {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    sink: Arc<dyn AudioSink>,
}

impl WebTtsEngine {
    pub fn new(config: &TtsUpstreamConfig, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.resolve_api_key(),
            timeout: Duration::from_secs(config.timeout_secs),
            sink,
        }
    }
}

#[async_trait]
impl SynthesisEngine for WebTtsEngine {
    fn id(&self) -> &'static str {
        "web-tts"
    }

    async fn voices(&self) -> Vec<VoiceInfo> {
        // The web service picks its own voice from the language tag.
        Vec::new()
    }

    async fn cancel(&self) -> Result<(), SpeechError> {
        // Playback runs through the shell's audio element; the bridge-wide
        // cancel directive stops it. Nothing to stop on this side.
        Ok(())
    }

    async fn speak(
        &self,
        utterance: &Utterance,
    ) -> Result<mpsc::Receiver<EngineEvent>, SpeechError> {
        let mut request = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", utterance.text.as_str()),
                ("tl", utterance.language.as_str()),
                ("client", "tw-ob"),
            ])
            .timeout(self.timeout);
        if let Some(ref key) = self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SpeechError::Unavailable(format!("web TTS request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SpeechError::Unavailable(format!(
                "web TTS returned {}",
                response.status()
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SpeechError::Unavailable(format!("web TTS body error: {}", e)))?;

        self.sink.play(audio.to_vec(), "audio/mpeg").await
    }
}
