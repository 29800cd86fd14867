use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::{TranslationConfig, TtsUpstreamConfig};
use crate::history::HistoryStore;
use crate::recognition::{BridgeRecognizer, CaptureSession};
use crate::server::routes::{routes, ApiContext};
use crate::server::tts_proxy::TtsAudioProxy;
use crate::speech::chain::{ChainTimeouts, FallbackChain};
use crate::speech::native::{BridgeSink, NativeEngine};
use crate::speech::server_audio::ServerAudioEngine;
use crate::speech::web_tts::WebTtsEngine;
use crate::speech::{AudioSink, HostBridge, SpeechService, SynthesisEngine, UnlockState};
use crate::translation::TranslationClient;

/// A fully wired backend on an ephemeral port, talking to wiremock
/// doubles for the translation provider and the TTS upstream.
pub struct TestBackend {
    pub base_url: String,
    pub provider: MockServer,
    pub tts_upstream: MockServer,
    pub ctx: ApiContext,
}

/// Short attempt timeouts so chain-exhaustion paths resolve quickly.
fn test_timeouts() -> ChainTimeouts {
    ChainTimeouts {
        native: Duration::from_millis(200),
        priming: Duration::from_millis(30),
        web_tts: Duration::from_millis(200),
        server_audio: Duration::from_millis(200),
    }
}

pub async fn build_context(
    with_key: bool,
    provider_url: &str,
    tts_url: &str,
) -> ApiContext {
    let translation_config = TranslationConfig {
        api_key: if with_key {
            Some("test-key".to_string())
        } else {
            None
        },
        api_key_env: None,
        base_url: format!("{}/translate", provider_url),
    };
    let tts_config = TtsUpstreamConfig {
        base_url: format!("{}/tts", tts_url),
        api_key: None,
        api_key_env: None,
        timeout_secs: 5,
    };

    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let history = HistoryStore::with_pool(pool).await.unwrap();

    let bridge = Arc::new(HostBridge::new());
    let sink: Arc<dyn AudioSink> = Arc::new(BridgeSink::new(bridge.clone()));
    let native: Arc<dyn SynthesisEngine> = Arc::new(NativeEngine::new(bridge.clone()));
    let web_tts: Arc<dyn SynthesisEngine> =
        Arc::new(WebTtsEngine::new(&tts_config, sink.clone()));
    let server_audio: Arc<dyn SynthesisEngine> = Arc::new(ServerAudioEngine::new(
        format!("{}/tts", tts_url),
        sink.clone(),
    ));
    let chain = FallbackChain::new(
        native,
        web_tts,
        server_audio,
        sink,
        UnlockState::new(),
        test_timeouts(),
    );

    ApiContext {
        translator: Arc::new(TranslationClient::from_config(&translation_config)),
        history,
        tts: Arc::new(TtsAudioProxy::from_config(&tts_config)),
        bridge: bridge.clone(),
        speech: Arc::new(SpeechService::new(chain)),
        capture: Arc::new(CaptureSession::new(Arc::new(BridgeRecognizer::new(bridge)))),
        profile_override: None,
        default_limit: 10,
    }
}

/// Start the HTTP server and return its address plus the mock upstreams.
pub async fn start_backend(with_key: bool) -> TestBackend {
    let provider = MockServer::start().await;
    let tts_upstream = MockServer::start().await;
    let ctx = build_context(with_key, &provider.uri(), &tts_upstream.uri()).await;

    let (addr, server) =
        warp::serve(routes(ctx.clone())).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    TestBackend {
        base_url: format!("http://{}", addr),
        provider,
        tts_upstream,
        ctx,
    }
}

/// Stub the translation provider with a fixed reply.
pub async fn stub_translation(backend: &TestBackend, translated: &str, confidence: f64) {
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "translatedText": translated,
            "confidence": confidence,
        })))
        .mount(&backend.provider)
        .await;
}

/// Stub the TTS upstream with fixed MP3 bytes, optionally delayed.
pub async fn stub_tts_audio(backend: &TestBackend, body: &[u8], delay: Option<Duration>) {
    let mut template = ResponseTemplate::new(200)
        .set_body_bytes(body.to_vec())
        .insert_header("Content-Type", "audio/mpeg");
    if let Some(delay) = delay {
        template = template.set_delay(delay);
    }
    Mock::given(method("GET"))
        .and(path("/tts"))
        .respond_with(template)
        .mount(&backend.tts_upstream)
        .await;
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
