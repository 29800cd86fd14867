//! Native engine and sink — the platform speech/audio capabilities of the
//! connected shell, reached through the host bridge.
//!
//! The backend cannot call `speechSynthesis` or drive an audio element
//! itself, so these implementations delegate outward and report whatever
//! lifecycle events the shell sends back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::bridge::HostBridge;
use super::interface::{
    AudioSink, EngineEvent, SpeechError, SynthesisEngine, Utterance, VoiceInfo,
};

/// How long the shell gets to acknowledge a silent unlock sample.
const UNLOCK_ACK_TIMEOUT: Duration = Duration::from_secs(5);

// ── Engine ─────────────────────────────────────────────

pub struct NativeEngine {
    bridge: Arc<HostBridge>,
}

impl NativeEngine {
    pub fn new(bridge: Arc<HostBridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl SynthesisEngine for NativeEngine {
    fn id(&self) -> &'static str {
        "native"
    }

    async fn voices(&self) -> Vec<VoiceInfo> {
        self.bridge.voices().await
    }

    async fn cancel(&self) -> Result<(), SpeechError> {
        self.bridge.cancel_native().await
    }

    async fn speak(
        &self,
        utterance: &Utterance,
    ) -> Result<mpsc::Receiver<EngineEvent>, SpeechError> {
        self.bridge.speak_native(utterance).await
    }
}

// ── Sink ───────────────────────────────────────────────

pub struct BridgeSink {
    bridge: Arc<HostBridge>,
}

impl BridgeSink {
    pub fn new(bridge: Arc<HostBridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl AudioSink for BridgeSink {
    async fn unlock(&self) -> Result<(), SpeechError> {
        let mut events = self.bridge.unlock_audio().await?;

        // The shell acks with Ended once the silent sample has played.
        match tokio::time::timeout(UNLOCK_ACK_TIMEOUT, async {
            while let Some(event) = events.recv().await {
                match event {
                    EngineEvent::Ended => return Ok(()),
                    EngineEvent::Errored(message) => {
                        return Err(SpeechError::Unavailable(message))
                    }
                    EngineEvent::Started => {}
                }
            }
            Err(SpeechError::EngineGone)
        })
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SpeechError::Unavailable("audio unlock not acknowledged".into())),
        }
    }

    async fn play(
        &self,
        audio: Vec<u8>,
        mime: &str,
    ) -> Result<mpsc::Receiver<EngineEvent>, SpeechError> {
        self.bridge.play_audio(audio, mime).await
    }
}
