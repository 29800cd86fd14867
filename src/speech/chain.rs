//! The speech-output fallback chain.
//!
//! Given a resolved device profile and a speech request, run the profile's
//! strategy ladder until one attempt plausibly succeeds. Attempts are
//! strictly sequential — a later strategy never starts before the prior
//! one resolved — and every attempt carries its own timeout, so the chain
//! always terminates.
//!
//! Timeout policy: a timeout with no `Started` event observed is a
//! failure and the chain advances; a timeout after `Started` resolves as
//! `StartedNoEnd`, which counts as success. Retrying an utterance that
//! already started risks two overlapping renditions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::interface::{
    AudioSink, EngineEvent, SpeakOutcome, SpeechError, SpeechRequest, SynthesisEngine, Utterance,
};
use super::unlock::UnlockState;
use super::voices::select_voice;
use crate::device::DeviceProfile;

/// Per-strategy attempt timeouts. All within the 2–15s band the platform
/// engines were observed to need.
#[derive(Debug, Clone)]
pub struct ChainTimeouts {
    pub native: Duration,
    pub priming: Duration,
    pub web_tts: Duration,
    pub server_audio: Duration,
}

impl Default for ChainTimeouts {
    fn default() -> Self {
        Self {
            native: Duration::from_secs(10),
            priming: Duration::from_secs(2),
            web_tts: Duration::from_secs(12),
            server_audio: Duration::from_secs(15),
        }
    }
}

/// Mobile engines garble text at high rates; cap the rate there.
const MOBILE_RATE_CAP: f32 = 0.9;

/// Priming utterances for Samsung engines, in order: increasing length
/// and volume. A single silent utterance is not enough to wake some
/// Samsung browser engines, hence the ladder.
const PRIMING_STEPS: &[(&str, f32)] = &[(" ", 0.0), (".", 0.25), ("a", 0.5)];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Strategy {
    /// Local synthesis through the shell's native engine.
    Native { rate_cap: Option<f32>, primed: bool },
    /// External TTS web service, played through the sink.
    WebTts,
    /// Backend-rendered audio, played through the sink.
    ServerAudio,
}

impl Strategy {
    fn label(&self) -> &'static str {
        match self {
            Strategy::Native { primed: true, .. } => "primed-native",
            Strategy::Native { .. } => "native",
            Strategy::WebTts => "web-tts",
            Strategy::ServerAudio => "server-audio",
        }
    }
}

pub struct FallbackChain {
    native: Arc<dyn SynthesisEngine>,
    web_tts: Arc<dyn SynthesisEngine>,
    server_audio: Arc<dyn SynthesisEngine>,
    sink: Arc<dyn AudioSink>,
    unlock: Arc<UnlockState>,
    timeouts: ChainTimeouts,
}

impl FallbackChain {
    pub fn new(
        native: Arc<dyn SynthesisEngine>,
        web_tts: Arc<dyn SynthesisEngine>,
        server_audio: Arc<dyn SynthesisEngine>,
        sink: Arc<dyn AudioSink>,
        unlock: Arc<UnlockState>,
        timeouts: ChainTimeouts,
    ) -> Self {
        Self {
            native,
            web_tts,
            server_audio,
            sink,
            unlock,
            timeouts,
        }
    }

    pub fn native_engine(&self) -> &Arc<dyn SynthesisEngine> {
        &self.native
    }

    fn strategies(profile: DeviceProfile) -> Vec<Strategy> {
        match profile {
            DeviceProfile::Desktop => vec![Strategy::Native {
                rate_cap: None,
                primed: false,
            }],
            // iOS refuses non-gesture synthesis entirely; fetched audio
            // through an unlocked audio element is the reliable path.
            DeviceProfile::IosMobile => vec![Strategy::ServerAudio],
            DeviceProfile::SamsungMobile => vec![
                Strategy::Native {
                    rate_cap: Some(MOBILE_RATE_CAP),
                    primed: true,
                },
                Strategy::WebTts,
                Strategy::ServerAudio,
            ],
            DeviceProfile::GenericMobile => vec![Strategy::Native {
                rate_cap: Some(MOBILE_RATE_CAP),
                primed: false,
            }],
        }
    }

    /// Run the chain for one request. Returns the successful outcome or
    /// `SpeechError::Exhausted` once every strategy has failed.
    pub async fn speak(
        &self,
        profile: DeviceProfile,
        request: &SpeechRequest,
    ) -> Result<SpeakOutcome, SpeechError> {
        let voices = self.native.voices().await;
        let voice = select_voice(&request.language, &voices).map(|v| v.id.clone());
        let base = Utterance::from_request(request, voice);

        // Mobile audio subsystems must be activated before anything can
        // play. Failure is logged and the chain proceeds: unlock state is
        // advisory and some engines speak anyway.
        if profile != DeviceProfile::Desktop {
            if let Err(e) = self.unlock.ensure_unlocked(self.sink.as_ref()).await {
                eprintln!("[Speech] Audio unlock failed, continuing: {}", e);
            }
        }

        let strategies = Self::strategies(profile);
        let attempts = strategies.len();

        for strategy in strategies {
            let outcome = self.attempt_strategy(strategy, &base).await;
            match outcome {
                Ok(outcome) if outcome.is_success() => {
                    println!(
                        "[Speech] {} succeeded ({:?}) for {}",
                        strategy.label(),
                        outcome,
                        request.language
                    );
                    return Ok(outcome);
                }
                Ok(outcome) => {
                    println!(
                        "[Speech] {} resolved {:?}, advancing",
                        strategy.label(),
                        outcome
                    );
                }
                Err(e) => {
                    println!("[Speech] {} unavailable ({}), advancing", strategy.label(), e);
                }
            }
        }

        Err(SpeechError::Exhausted { attempts })
    }

    async fn attempt_strategy(
        &self,
        strategy: Strategy,
        base: &Utterance,
    ) -> Result<SpeakOutcome, SpeechError> {
        match strategy {
            Strategy::Native { rate_cap, primed } => {
                if primed {
                    self.prime(&base.language).await;
                }
                let mut utterance = base.clone();
                if let Some(cap) = rate_cap {
                    utterance.rate = utterance.rate.min(cap);
                }
                let events = self.native.speak(&utterance).await?;
                Ok(resolve_outcome(events, self.timeouts.native).await)
            }
            Strategy::WebTts => {
                let events = self.web_tts.speak(base).await?;
                Ok(resolve_outcome(events, self.timeouts.web_tts).await)
            }
            Strategy::ServerAudio => {
                let events = self.server_audio.speak(base).await?;
                Ok(resolve_outcome(events, self.timeouts.server_audio).await)
            }
        }
    }

    /// Coax a sulking engine awake with a ladder of tiny utterances.
    /// Failures here are expected and ignored; only the real attempt
    /// afterwards counts.
    async fn prime(&self, language: &str) {
        for (step, (text, volume)) in PRIMING_STEPS.iter().enumerate() {
            let utterance = Utterance {
                text: (*text).to_string(),
                language: language.to_string(),
                rate: 1.0,
                pitch: 1.0,
                volume: *volume,
                voice: None,
                priming: true,
            };
            match self.native.speak(&utterance).await {
                Ok(events) => {
                    let outcome = resolve_outcome(events, self.timeouts.priming).await;
                    println!("[Speech] priming {} -> {:?}", step + 1, outcome);
                }
                Err(e) => {
                    println!("[Speech] priming {} dispatch failed: {}", step + 1, e);
                }
            }
        }
    }
}

/// Map one attempt's engine event stream to a `SpeakOutcome`, applying
/// the started-no-end rule.
pub async fn resolve_outcome(
    mut events: mpsc::Receiver<EngineEvent>,
    timeout: Duration,
) -> SpeakOutcome {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut started = false;

    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Some(EngineEvent::Started)) => started = true,
            Ok(Some(EngineEvent::Ended)) => return SpeakOutcome::Completed,
            Ok(Some(EngineEvent::Errored(message))) => return SpeakOutcome::Failed(message),
            // Stream closed without a terminal event: the shell went away
            // mid-utterance. If it had started, assume it played.
            Ok(None) => {
                return if started {
                    SpeakOutcome::StartedNoEnd
                } else {
                    SpeakOutcome::Failed("engine event stream closed".to_string())
                };
            }
            Err(_) => {
                return if started {
                    SpeakOutcome::StartedNoEnd
                } else {
                    SpeakOutcome::TimedOut
                };
            }
        }
    }
}
