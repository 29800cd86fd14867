//! Server-rendered audio engine.
//!
//! Asks the VoiceBridge backend for a rendered MP3 (`/api/tts-audio`) and
//! plays it through the audio sink. This is the whole strategy on iOS,
//! where the local synthesis engine stays silent without a user gesture
//! but an unlocked audio element plays fetched audio fine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;

use super::interface::{
    AudioSink, EngineEvent, SpeechError, SynthesisEngine, Utterance, VoiceInfo,
};
use crate::utils::http::request_with_retry;

pub struct ServerAudioEngine {
    client: Client,
    /// Fully qualified URL of the backend's tts-audio route.
    endpoint: String,
    timeout: Duration,
    sink: Arc<dyn AudioSink>,
}

impl ServerAudioEngine {
    pub fn new(endpoint: String, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            timeout: Duration::from_secs(15),
            sink,
        }
    }
}

#[async_trait]
impl SynthesisEngine for ServerAudioEngine {
    fn id(&self) -> &'static str {
        "server-audio"
    }

    async fn voices(&self) -> Vec<VoiceInfo> {
        Vec::new()
    }

    async fn cancel(&self) -> Result<(), SpeechError> {
        // Superseded fetches are allowed to complete; their audio is
        // discarded by the shell when the bridge-wide cancel lands.
        Ok(())
    }

    async fn speak(
        &self,
        utterance: &Utterance,
    ) -> Result<mpsc::Receiver<EngineEvent>, SpeechError> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let text = utterance.text.clone();
        let lang = utterance.language.clone();
        let timeout = self.timeout;

        let response = request_with_retry(
            move || {
                client
                    .get(&endpoint)
                    .query(&[("text", text.as_str()), ("lang", lang.as_str())])
                    .timeout(timeout)
                    .send()
            },
            1,
        )
        .await
        .map_err(SpeechError::Unavailable)?;

        if !response.status().is_success() {
            return Err(SpeechError::Unavailable(format!(
                "tts-audio returned {}",
                response.status()
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SpeechError::Unavailable(format!("tts-audio body error: {}", e)))?;

        self.sink.play(audio.to_vec(), "audio/mpeg").await
    }
}
