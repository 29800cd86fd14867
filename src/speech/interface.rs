//! Speech Output Interface & Core Types
//!
//! Defines the abstract contract for speech-synthesis engines and audio
//! sinks, the request/outcome types the fallback chain works with, and
//! semantic error handling.
//!
//! The platform speech engine is a single shared, mutable resource. All
//! access goes through a `SynthesisEngine` handle so every strategy can
//! honor the cancel-before-speak invariant; nothing calls the engine
//! ambiently.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

// ── Requests ───────────────────────────────────────────

/// One logical request to vocalize a string of text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    /// BCP-47-like language tag, e.g. `ta-IN`.
    pub language: String,
    #[serde(default = "default_unit")]
    pub rate: f32,
    #[serde(default = "default_unit")]
    pub pitch: f32,
}

fn default_unit() -> f32 {
    1.0
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
            rate: 1.0,
            pitch: 1.0,
        }
    }

    /// De-duplication key: two requests with the same key must never
    /// produce overlapping audio.
    pub fn dedup_key(&self) -> (String, String) {
        (self.text.clone(), self.language.clone())
    }
}

/// A fully resolved utterance handed to one engine attempt: the request
/// plus the voice the selection heuristic picked (if any).
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub voice: Option<String>,
    /// Priming utterances coax broken mobile engines awake; they are not
    /// user-visible content and are exempt from de-duplication.
    pub priming: bool,
}

impl Utterance {
    pub fn from_request(request: &SpeechRequest, voice: Option<String>) -> Self {
        Self {
            text: request.text.clone(),
            language: request.language.clone(),
            rate: request.rate,
            pitch: request.pitch,
            volume: 1.0,
            voice,
            priming: false,
        }
    }
}

// ── Engine events & outcomes ───────────────────────────

/// Lifecycle events an engine reports for one utterance. These mirror the
/// platform's onstart/onend/onerror callbacks as channel messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    Started,
    Ended,
    Errored(String),
}

/// Awaitable resolution of a single attempt.
///
/// `StartedNoEnd` is the ambiguous "timed out after start" case modeled
/// explicitly: an utterance that started but whose end event never arrived
/// usually played, so the chain treats it as success and must not retry.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeakOutcome {
    Completed,
    StartedNoEnd,
    Failed(String),
    TimedOut,
}

impl SpeakOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SpeakOutcome::Completed | SpeakOutcome::StartedNoEnd)
    }
}

// ── Errors ─────────────────────────────────────────────

#[derive(Debug, Clone, thiserror::Error)]
pub enum SpeechError {
    /// An identical `(text, language)` request is still in flight. The
    /// caller gets an explicit rejection, never a queue slot.
    #[error("speech for this text is already in progress ({language}: {text:?})")]
    AlreadySpeaking { text: String, language: String },

    /// Every strategy in the chain failed.
    #[error("all {attempts} speech strategies failed")]
    Exhausted { attempts: usize },

    /// The host shell that executes native synthesis is not connected.
    #[error("no speech host connected")]
    EngineGone,

    #[error("speech engine unavailable: {0}")]
    Unavailable(String),
}

// ── Voices ─────────────────────────────────────────────

/// One voice the synthesis engine offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub id: String,
    pub name: String,
    /// BCP-47-like tag, e.g. `hi-IN`.
    pub language: String,
}

// ── Engine & sink traits ───────────────────────────────

/// Handle to a speech-synthesis backend.
///
/// `speak` resolves to a channel of lifecycle events rather than blocking
/// until completion; the chain owns the timeout and maps events to a
/// `SpeakOutcome`. Engines never queue: a second `speak` while the first
/// is audible is the caller's bug, which is why `cancel` exists.
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    /// Stable identifier, e.g. "native", "web-tts", "server-audio".
    fn id(&self) -> &'static str;

    /// Voices currently offered. May be empty; absence of a matching
    /// voice is not an error, the engine default is used silently.
    async fn voices(&self) -> Vec<VoiceInfo>;

    /// Stop whatever is currently speaking or playing. Idempotent.
    async fn cancel(&self) -> Result<(), SpeechError>;

    /// Begin one utterance and return its lifecycle event stream.
    async fn speak(&self, utterance: &Utterance)
        -> Result<mpsc::Receiver<EngineEvent>, SpeechError>;
}

/// Audio output path for pre-rendered audio bytes (the HTML audio element
/// in the browser shell). Also the unlock vehicle: mobile browsers refuse
/// non-gesture audio until something has audibly played once.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play a silent sample to activate the audio subsystem.
    async fn unlock(&self) -> Result<(), SpeechError>;

    /// Play encoded audio, returning its lifecycle event stream.
    async fn play(
        &self,
        audio: Vec<u8>,
        mime: &str,
    ) -> Result<mpsc::Receiver<EngineEvent>, SpeechError>;
}
