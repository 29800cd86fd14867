//! Voice input capture — interface and core types.
//!
//! The actual recognition engine is an ambient platform capability of the
//! client shell; this module defines the contract and maps the platform's
//! string error codes onto semantic errors with actionable text. None of
//! these errors triggers an automatic retry: the user decides whether to
//! try again.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A successful recognition: what was heard and how sure the engine is.
/// Ephemeral — held in UI state only, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub text: String,
    /// 0.0 to 1.0.
    pub confidence: f64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RecognitionError {
    #[error("microphone access was denied — allow microphone use and try again")]
    NotAllowed,

    #[error("no speech was detected — speak closer to the microphone")]
    NoSpeech,

    #[error("no usable microphone was found")]
    AudioCapture,

    #[error("network error during recognition: {0}")]
    Network(String),

    #[error("listening was cancelled")]
    Aborted,

    #[error("speech recognition unavailable: {0}")]
    Unavailable(String),

    #[error("a listening session is already active")]
    Busy,
}

impl RecognitionError {
    /// Map a platform error code (the shell forwards these verbatim)
    /// to a semantic error.
    pub fn from_code(code: &str) -> Self {
        match code {
            "not-allowed" | "service-not-allowed" => RecognitionError::NotAllowed,
            "no-speech" => RecognitionError::NoSpeech,
            "audio-capture" => RecognitionError::AudioCapture,
            "network" => RecognitionError::Network("recognition service unreachable".into()),
            "aborted" => RecognitionError::Aborted,
            other => RecognitionError::Unavailable(other.to_string()),
        }
    }
}

/// Abstract interface to a recognition backend.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Listen once and return the transcript. Resolves when the engine
    /// delivers a final result or a terminal error.
    async fn recognize(&self, language: &str) -> Result<TranscriptResult, RecognitionError>;

    /// Abort the current listen, if any.
    async fn stop(&self);
}

/// Production recognizer: delegates to the connected shell through the
/// host bridge.
pub struct BridgeRecognizer {
    bridge: Arc<crate::speech::HostBridge>,
}

impl BridgeRecognizer {
    pub fn new(bridge: Arc<crate::speech::HostBridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl SpeechRecognizer for BridgeRecognizer {
    async fn recognize(&self, language: &str) -> Result<TranscriptResult, RecognitionError> {
        self.bridge.listen(language).await
    }

    async fn stop(&self) {
        self.bridge.stop_listening().await;
    }
}
