//! Fallback-chain and speech-service tests against scripted engine doubles.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::chain::{ChainTimeouts, FallbackChain};
use super::interface::{
    AudioSink, EngineEvent, SpeakOutcome, SpeechError, SpeechRequest, SynthesisEngine, Utterance,
    VoiceInfo,
};
use super::service::SpeechService;
use super::unlock::UnlockState;
use crate::device::DeviceProfile;

type CallLog = Arc<StdMutex<Vec<String>>>;

#[derive(Debug, Clone)]
enum Behavior {
    /// Started then Ended.
    Complete,
    /// Started, then silence until the attempt times out.
    StartOnly,
    /// Errored(message).
    Fail(&'static str),
    /// No events at all until the attempt times out.
    Silent,
    /// speak() itself returns an error.
    Reject,
}

struct MockEngine {
    label: &'static str,
    log: CallLog,
    script: StdMutex<VecDeque<Behavior>>,
    utterances: StdMutex<Vec<Utterance>>,
    voices: Vec<VoiceInfo>,
}

impl MockEngine {
    fn new(label: &'static str, log: CallLog, script: Vec<Behavior>) -> Arc<Self> {
        Arc::new(Self {
            label,
            log,
            script: StdMutex::new(script.into()),
            utterances: StdMutex::new(Vec::new()),
            voices: vec![VoiceInfo {
                id: "mock-en".to_string(),
                name: "Mock English".to_string(),
                language: "en-US".to_string(),
            }],
        })
    }

    fn utterances(&self) -> Vec<Utterance> {
        self.utterances.lock().unwrap().clone()
    }
}

#[async_trait]
impl SynthesisEngine for MockEngine {
    fn id(&self) -> &'static str {
        self.label
    }

    async fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.clone()
    }

    async fn cancel(&self) -> Result<(), SpeechError> {
        self.log.lock().unwrap().push(format!("{}:cancel", self.label));
        Ok(())
    }

    async fn speak(
        &self,
        utterance: &Utterance,
    ) -> Result<mpsc::Receiver<EngineEvent>, SpeechError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:speak:{}", self.label, utterance.text));
        self.utterances.lock().unwrap().push(utterance.clone());

        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Behavior::Complete);

        if matches!(behavior, Behavior::Reject) {
            return Err(SpeechError::Unavailable("scripted rejection".into()));
        }

        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            match behavior {
                Behavior::Complete => {
                    let _ = tx.send(EngineEvent::Started).await;
                    let _ = tx.send(EngineEvent::Ended).await;
                }
                Behavior::StartOnly => {
                    let _ = tx.send(EngineEvent::Started).await;
                    // Hold the sender open so the stream never closes.
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Behavior::Fail(message) => {
                    let _ = tx.send(EngineEvent::Errored(message.to_string())).await;
                }
                Behavior::Silent => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Behavior::Reject => unreachable!(),
            }
        });
        Ok(rx)
    }
}

struct MockSink {
    log: CallLog,
}

#[async_trait]
impl AudioSink for MockSink {
    async fn unlock(&self) -> Result<(), SpeechError> {
        self.log.lock().unwrap().push("sink:unlock".to_string());
        Ok(())
    }

    async fn play(
        &self,
        _audio: Vec<u8>,
        _mime: &str,
    ) -> Result<mpsc::Receiver<EngineEvent>, SpeechError> {
        self.log.lock().unwrap().push("sink:play".to_string());
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let _ = tx.send(EngineEvent::Started).await;
            let _ = tx.send(EngineEvent::Ended).await;
        });
        Ok(rx)
    }
}

fn short_timeouts() -> ChainTimeouts {
    ChainTimeouts {
        native: Duration::from_millis(80),
        priming: Duration::from_millis(20),
        web_tts: Duration::from_millis(80),
        server_audio: Duration::from_millis(80),
    }
}

struct Harness {
    service: Arc<SpeechService>,
    native: Arc<MockEngine>,
    web_tts: Arc<MockEngine>,
    server_audio: Arc<MockEngine>,
    log: CallLog,
}

fn harness(native: Vec<Behavior>, web_tts: Vec<Behavior>, server_audio: Vec<Behavior>) -> Harness {
    let log: CallLog = Arc::new(StdMutex::new(Vec::new()));
    let native = MockEngine::new("native", log.clone(), native);
    let web_tts = MockEngine::new("web-tts", log.clone(), web_tts);
    let server_audio = MockEngine::new("server-audio", log.clone(), server_audio);
    let sink = Arc::new(MockSink { log: log.clone() });

    let chain = FallbackChain::new(
        native.clone(),
        web_tts.clone(),
        server_audio.clone(),
        sink,
        UnlockState::new(),
        short_timeouts(),
    );
    Harness {
        service: Arc::new(SpeechService::new(chain)),
        native,
        web_tts,
        server_audio,
        log,
    }
}

fn log_of(harness: &Harness) -> Vec<String> {
    harness.log.lock().unwrap().clone()
}

// ── Ordering ───────────────────────────────────────────

#[tokio::test]
async fn cancel_is_issued_before_any_speak() {
    let h = harness(vec![Behavior::Complete], vec![], vec![]);
    let outcome = h
        .service
        .speak(DeviceProfile::Desktop, SpeechRequest::new("hello", "en-US"))
        .await
        .unwrap();
    assert_eq!(outcome, SpeakOutcome::Completed);

    let log = log_of(&h);
    let cancel_at = log.iter().position(|e| e == "native:cancel").unwrap();
    let speak_at = log.iter().position(|e| e.starts_with("native:speak")).unwrap();
    assert!(
        cancel_at < speak_at,
        "cancel must precede speak, got {:?}",
        log
    );
}

#[tokio::test]
async fn desktop_uses_a_single_local_attempt_without_unlock() {
    let h = harness(vec![Behavior::Complete], vec![], vec![]);
    h.service
        .speak(DeviceProfile::Desktop, SpeechRequest::new("hi", "en-US"))
        .await
        .unwrap();

    let log = log_of(&h);
    assert!(!log.contains(&"sink:unlock".to_string()));
    assert!(log.iter().filter(|e| e.contains(":speak:")).count() == 1);
}

// ── De-duplication ─────────────────────────────────────

#[tokio::test]
async fn identical_in_flight_request_is_rejected_not_queued() {
    let h = harness(vec![Behavior::StartOnly, Behavior::Complete], vec![], vec![]);
    let service = h.service.clone();

    let first = tokio::spawn({
        let service = service.clone();
        async move {
            service
                .speak(DeviceProfile::Desktop, SpeechRequest::new("dup", "en-US"))
                .await
        }
    });
    // Let the first request claim the in-flight slot.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = service
        .speak(DeviceProfile::Desktop, SpeechRequest::new("dup", "en-US"))
        .await;
    assert!(matches!(
        second,
        Err(SpeechError::AlreadySpeaking { .. })
    ));

    // The first finishes on its own; the rejected duplicate never reached
    // an engine, so exactly one speak call is on record.
    first.await.unwrap().unwrap();
    let speaks = log_of(&h)
        .iter()
        .filter(|e| e.ends_with(":speak:dup"))
        .count();
    assert_eq!(speaks, 1);
}

#[tokio::test]
async fn distinct_texts_may_overlap_and_both_speak() {
    let h = harness(vec![Behavior::StartOnly, Behavior::Complete], vec![], vec![]);
    let service = h.service.clone();

    let first = tokio::spawn({
        let service = service.clone();
        async move {
            service
                .speak(DeviceProfile::Desktop, SpeechRequest::new("one", "en-US"))
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = service
        .speak(DeviceProfile::Desktop, SpeechRequest::new("two", "en-US"))
        .await;
    assert!(second.is_ok());
    first.await.unwrap().unwrap();
}

#[tokio::test]
async fn key_is_free_again_after_completion() {
    let h = harness(vec![Behavior::Complete, Behavior::Complete], vec![], vec![]);
    let request = SpeechRequest::new("again", "en-US");
    h.service
        .speak(DeviceProfile::Desktop, request.clone())
        .await
        .unwrap();
    assert!(!h.service.is_speaking("again", "en-US"));
    h.service
        .speak(DeviceProfile::Desktop, request)
        .await
        .unwrap();
}

// ── Timeout policy ─────────────────────────────────────

#[tokio::test]
async fn started_but_never_ended_counts_as_success() {
    let h = harness(vec![Behavior::StartOnly], vec![], vec![]);
    let outcome = h
        .service
        .speak(DeviceProfile::Desktop, SpeechRequest::new("slow", "en-US"))
        .await
        .unwrap();
    assert_eq!(outcome, SpeakOutcome::StartedNoEnd);
}

#[tokio::test]
async fn silent_timeout_advances_to_next_strategy() {
    // Samsung ladder: native (and its priming) stays silent, web TTS works.
    let h = harness(
        vec![
            Behavior::Silent, // priming 1
            Behavior::Silent, // priming 2
            Behavior::Silent, // priming 3
            Behavior::Silent, // real attempt times out with no start
        ],
        vec![Behavior::Complete],
        vec![],
    );
    let outcome = h
        .service
        .speak(
            DeviceProfile::SamsungMobile,
            SpeechRequest::new("வணக்கம்", "ta-IN"),
        )
        .await
        .unwrap();
    assert_eq!(outcome, SpeakOutcome::Completed);

    let log = log_of(&h);
    assert!(log.iter().any(|e| e.starts_with("web-tts:speak")));
    // Strictly sequential: web TTS only after the native attempt resolved.
    let native_real = log
        .iter()
        .position(|e| e == "native:speak:வணக்கம்")
        .unwrap();
    let web = log
        .iter()
        .position(|e| e.starts_with("web-tts:speak"))
        .unwrap();
    assert!(native_real < web);
}

// ── Samsung priming ────────────────────────────────────

#[tokio::test]
async fn samsung_primes_before_the_real_utterance() {
    let h = harness(
        vec![
            Behavior::Complete,
            Behavior::Complete,
            Behavior::Complete,
            Behavior::Complete,
        ],
        vec![],
        vec![],
    );
    h.service
        .speak(
            DeviceProfile::SamsungMobile,
            SpeechRequest::new("text", "en-US"),
        )
        .await
        .unwrap();

    let utterances = h.native.utterances();
    assert_eq!(utterances.len(), 4, "three priming steps plus the real one");
    assert!(utterances[..3].iter().all(|u| u.priming));
    // Increasing volume across the priming ladder.
    assert!(utterances[0].volume < utterances[1].volume);
    assert!(utterances[1].volume < utterances[2].volume);
    assert!(!utterances[3].priming);
    assert_eq!(utterances[3].text, "text");

    // Unlock happened before priming.
    let log = log_of(&h);
    let unlock = log.iter().position(|e| e == "sink:unlock").unwrap();
    let first_speak = log.iter().position(|e| e.contains(":speak:")).unwrap();
    assert!(unlock < first_speak);
}

// ── Profile ladders ────────────────────────────────────

#[tokio::test]
async fn ios_goes_straight_to_server_audio() {
    let h = harness(vec![], vec![], vec![Behavior::Complete]);
    h.service
        .speak(DeviceProfile::IosMobile, SpeechRequest::new("hej", "sv-SE"))
        .await
        .unwrap();

    let log = log_of(&h);
    assert!(log.iter().any(|e| e.starts_with("server-audio:speak")));
    assert!(!log.iter().any(|e| e.starts_with("native:speak")));
    assert!(log.contains(&"sink:unlock".to_string()));
}

#[tokio::test]
async fn generic_mobile_caps_the_speech_rate() {
    let h = harness(vec![Behavior::Complete], vec![], vec![]);
    let mut request = SpeechRequest::new("fast", "en-US");
    request.rate = 1.4;
    h.service
        .speak(DeviceProfile::GenericMobile, request)
        .await
        .unwrap();

    let utterances = h.native.utterances();
    assert!((utterances[0].rate - 0.9).abs() < f32::EPSILON);
}

#[tokio::test]
async fn desktop_rate_is_not_capped() {
    let h = harness(vec![Behavior::Complete], vec![], vec![]);
    let mut request = SpeechRequest::new("fast", "en-US");
    request.rate = 1.4;
    h.service.speak(DeviceProfile::Desktop, request).await.unwrap();
    assert!((h.native.utterances()[0].rate - 1.4).abs() < f32::EPSILON);
}

// ── Exhaustion ─────────────────────────────────────────

#[tokio::test]
async fn exhausted_chain_reports_failure() {
    let h = harness(
        vec![
            Behavior::Reject, // priming 1
            Behavior::Reject, // priming 2
            Behavior::Reject, // priming 3
            Behavior::Fail("synthesis-failed"),
        ],
        vec![Behavior::Reject],
        vec![Behavior::Fail("upstream 500")],
    );
    let result = h
        .service
        .speak(
            DeviceProfile::SamsungMobile,
            SpeechRequest::new("doomed", "ta-IN"),
        )
        .await;
    assert!(matches!(
        result,
        Err(SpeechError::Exhausted { attempts: 3 })
    ));

    // The failure released the in-flight slot.
    assert!(!h.service.is_speaking("doomed", "ta-IN"));
}

#[tokio::test]
async fn voice_is_resolved_from_engine_voices() {
    let h = harness(vec![Behavior::Complete], vec![], vec![]);
    h.service
        .speak(DeviceProfile::Desktop, SpeechRequest::new("hello", "en-US"))
        .await
        .unwrap();
    assert_eq!(
        h.native.utterances()[0].voice.as_deref(),
        Some("mock-en"),
        "exact-language mock voice should be selected"
    );
    let _ = (&h.web_tts, &h.server_audio);
}
