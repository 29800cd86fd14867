//! Host bridge — the backend's handle on the client shell.
//!
//! Native speech synthesis, audio playback and speech recognition all live
//! in the connected browser shell; this crate cannot call those platform
//! APIs directly. The bridge sends directive frames out (speak, cancel,
//! play, unlock, listen) and routes the shell's lifecycle event frames
//! back to whoever dispatched the directive, keyed by a request id.
//!
//! One shell is attached at a time; a new WebSocket connection replaces
//! the previous one. Dispatch with no shell attached fails fast with
//! `SpeechError::EngineGone`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, RwLock};

use super::interface::{EngineEvent, SpeechError, Utterance, VoiceInfo};
use crate::device::EnvironmentSignals;
use crate::recognition::{RecognitionError, TranscriptResult};

const DIRECTIVE_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 8;

// ── Wire frames ────────────────────────────────────────

/// Backend → shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectiveFrame {
    Speak {
        id: u64,
        text: String,
        language: String,
        voice: Option<String>,
        rate: f32,
        pitch: f32,
        volume: f32,
    },
    Cancel,
    Play {
        id: u64,
        mime: String,
        /// base64-encoded audio bytes.
        data: String,
    },
    Unlock {
        id: u64,
    },
    Listen {
        id: u64,
        language: String,
    },
    StopListen,
}

/// Shell → backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventFrame {
    /// Sent once after connecting: who the shell is and what it offers.
    Hello {
        user_agent: String,
        #[serde(default)]
        has_touch: bool,
        #[serde(default)]
        voices: Vec<VoiceInfo>,
    },
    Started {
        id: u64,
    },
    Ended {
        id: u64,
    },
    Errored {
        id: u64,
        message: String,
    },
    Transcript {
        id: u64,
        text: String,
        confidence: f64,
    },
    RecognitionFailed {
        id: u64,
        code: String,
    },
}

// ── Bridge ─────────────────────────────────────────────

type ListenReply = oneshot::Sender<Result<TranscriptResult, RecognitionError>>;

pub struct HostBridge {
    outbound: StdMutex<Option<(u64, mpsc::Sender<DirectiveFrame>)>>,
    pending: StdMutex<HashMap<u64, mpsc::Sender<EngineEvent>>>,
    listens: StdMutex<HashMap<u64, ListenReply>>,
    next_id: AtomicU64,
    generation: AtomicU64,
    signals: RwLock<EnvironmentSignals>,
    voices: RwLock<Vec<VoiceInfo>>,
}

impl HostBridge {
    pub fn new() -> Self {
        Self {
            outbound: StdMutex::new(None),
            pending: StdMutex::new(HashMap::new()),
            listens: StdMutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            generation: AtomicU64::new(0),
            signals: RwLock::new(EnvironmentSignals::default()),
            voices: RwLock::new(Vec::new()),
        }
    }

    /// Attach a shell. Returns this attachment's generation and the
    /// receiver the transport drains; the previous shell's channel (if
    /// any) is dropped and its directives die.
    pub fn attach(&self) -> (u64, mpsc::Receiver<DirectiveFrame>) {
        let (tx, rx) = mpsc::channel(DIRECTIVE_BUFFER);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut outbound = self.outbound.lock().unwrap();
        *outbound = Some((generation, tx));
        println!("[Bridge] Shell attached (generation {})", generation);
        (generation, rx)
    }

    /// Detach the shell and fail all in-flight dispatches. A stale
    /// generation (this shell was already displaced by a newer one)
    /// is a no-op so the displacer's attachment survives.
    pub async fn detach(&self, generation: u64) {
        {
            let mut outbound = self.outbound.lock().unwrap();
            match *outbound {
                Some((current, _)) if current == generation => *outbound = None,
                _ => return,
            }
        }
        self.pending.lock().unwrap().clear();
        for (_, reply) in self.listens.lock().unwrap().drain() {
            let _ = reply.send(Err(RecognitionError::Aborted));
        }
        println!("[Bridge] Shell detached (generation {})", generation);
    }

    pub fn is_attached(&self) -> bool {
        self.outbound.lock().unwrap().is_some()
    }

    fn sender(&self) -> Result<mpsc::Sender<DirectiveFrame>, SpeechError> {
        self.outbound
            .lock()
            .unwrap()
            .as_ref()
            .map(|(_, tx)| tx.clone())
            .ok_or(SpeechError::EngineGone)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn dispatch_with_events(
        &self,
        id: u64,
        frame: DirectiveFrame,
    ) -> Result<mpsc::Receiver<EngineEvent>, SpeechError> {
        let sender = self.sender()?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        self.pending.lock().unwrap().insert(id, events_tx);

        if sender.send(frame).await.is_err() {
            self.pending.lock().unwrap().remove(&id);
            return Err(SpeechError::EngineGone);
        }
        Ok(events_rx)
    }

    // ── Directive surface ──────────────────────────────

    pub async fn speak_native(
        &self,
        utterance: &Utterance,
    ) -> Result<mpsc::Receiver<EngineEvent>, SpeechError> {
        let id = self.next_id();
        let frame = DirectiveFrame::Speak {
            id,
            text: utterance.text.clone(),
            language: utterance.language.clone(),
            voice: utterance.voice.clone(),
            rate: utterance.rate,
            pitch: utterance.pitch,
            volume: utterance.volume,
        };
        self.dispatch_with_events(id, frame).await
    }

    /// Best-effort: with no shell attached nothing can be speaking.
    pub async fn cancel_native(&self) -> Result<(), SpeechError> {
        if let Ok(sender) = self.sender() {
            let _ = sender.send(DirectiveFrame::Cancel).await;
        }
        Ok(())
    }

    pub async fn play_audio(
        &self,
        audio: Vec<u8>,
        mime: &str,
    ) -> Result<mpsc::Receiver<EngineEvent>, SpeechError> {
        let id = self.next_id();
        let frame = DirectiveFrame::Play {
            id,
            mime: mime.to_string(),
            data: BASE64.encode(audio),
        };
        self.dispatch_with_events(id, frame).await
    }

    pub async fn unlock_audio(&self) -> Result<mpsc::Receiver<EngineEvent>, SpeechError> {
        let id = self.next_id();
        self.dispatch_with_events(id, DirectiveFrame::Unlock { id }).await
    }

    /// One recognition round trip: the shell listens and reports either a
    /// transcript or a semantic error code.
    pub async fn listen(
        &self,
        language: &str,
    ) -> Result<TranscriptResult, RecognitionError> {
        let sender = self
            .sender()
            .map_err(|_| RecognitionError::Unavailable("no shell connected".into()))?;

        let id = self.next_id();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.listens.lock().unwrap().insert(id, reply_tx);

        let frame = DirectiveFrame::Listen {
            id,
            language: language.to_string(),
        };
        if sender.send(frame).await.is_err() {
            self.listens.lock().unwrap().remove(&id);
            return Err(RecognitionError::Unavailable("no shell connected".into()));
        }

        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(RecognitionError::Aborted),
        }
    }

    pub async fn stop_listening(&self) {
        if let Ok(sender) = self.sender() {
            let _ = sender.send(DirectiveFrame::StopListen).await;
        }
    }

    // ── Event routing ──────────────────────────────────

    /// Route one event frame from the shell. Unknown ids are stale
    /// (their dispatcher already timed out) and are dropped silently.
    pub async fn handle_event(&self, frame: EventFrame) {
        match frame {
            EventFrame::Hello {
                user_agent,
                has_touch,
                voices,
            } => {
                println!(
                    "[Bridge] Hello from shell: {} voices, touch={}",
                    voices.len(),
                    has_touch
                );
                {
                    let mut signals = self.signals.write().await;
                    signals.user_agent = user_agent;
                    signals.has_touch = has_touch;
                }
                let mut known = self.voices.write().await;
                *known = voices;
            }
            EventFrame::Started { id } => self.forward(id, EngineEvent::Started, false),
            EventFrame::Ended { id } => self.forward(id, EngineEvent::Ended, true),
            EventFrame::Errored { id, message } => {
                self.forward(id, EngineEvent::Errored(message), true)
            }
            EventFrame::Transcript {
                id,
                text,
                confidence,
            } => {
                if let Some(reply) = self.listens.lock().unwrap().remove(&id) {
                    let _ = reply.send(Ok(TranscriptResult { text, confidence }));
                }
            }
            EventFrame::RecognitionFailed { id, code } => {
                if let Some(reply) = self.listens.lock().unwrap().remove(&id) {
                    let _ = reply.send(Err(RecognitionError::from_code(&code)));
                }
            }
        }
    }

    fn forward(&self, id: u64, event: EngineEvent, terminal: bool) {
        let mut pending = self.pending.lock().unwrap();
        if terminal {
            if let Some(tx) = pending.remove(&id) {
                let _ = tx.try_send(event);
            }
        } else if let Some(tx) = pending.get(&id) {
            let _ = tx.try_send(event);
        }
    }

    // ── Shell-reported environment ─────────────────────

    pub async fn signals(&self) -> EnvironmentSignals {
        self.signals.read().await.clone()
    }

    pub async fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.read().await.clone()
    }
}

impl Default for HostBridge {
    fn default() -> Self {
        Self::new()
    }
}
