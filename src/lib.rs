pub mod config;
pub mod device;
pub mod history;
pub mod recognition;
pub mod server;
pub mod speech;
pub mod translation;
pub mod utils;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;

use crate::config::AppConfig;
use crate::history::HistoryStore;
use crate::recognition::{BridgeRecognizer, CaptureSession};
use crate::server::{ApiContext, TtsAudioProxy};
use crate::speech::chain::{ChainTimeouts, FallbackChain};
use crate::speech::native::{BridgeSink, NativeEngine};
use crate::speech::server_audio::ServerAudioEngine;
use crate::speech::web_tts::WebTtsEngine;
use crate::speech::{AudioSink, HostBridge, SpeechService, SynthesisEngine, UnlockState};
use crate::translation::TranslationClient;

/// Bootstrap and serve until shutdown.
pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    let history = HistoryStore::connect(&config.history.database_url)
        .await
        .context("failed to open history database")?;

    let translator = Arc::new(TranslationClient::from_config(&config.translation));
    if !translator.has_api_key() {
        // The server still comes up; /api/translate answers 500 until an
        // operator provides a key.
        eprintln!("[Config] No translation API key configured — /api/translate will fail");
    }

    let tts = Arc::new(TtsAudioProxy::from_config(&config.tts));

    // Speech output: the platform engine and audio element live in the
    // shell behind the WebSocket bridge; web TTS and server-rendered
    // audio are reached over HTTP and played through the same bridge.
    let bridge = Arc::new(HostBridge::new());
    let sink: Arc<dyn AudioSink> = Arc::new(BridgeSink::new(bridge.clone()));
    let native: Arc<dyn SynthesisEngine> = Arc::new(NativeEngine::new(bridge.clone()));
    let web_tts: Arc<dyn SynthesisEngine> = Arc::new(WebTtsEngine::new(&config.tts, sink.clone()));
    let tts_audio_endpoint = format!(
        "http://{}:{}/api/tts-audio",
        config.server.host, config.server.port
    );
    let server_audio: Arc<dyn SynthesisEngine> =
        Arc::new(ServerAudioEngine::new(tts_audio_endpoint, sink.clone()));

    let chain = FallbackChain::new(
        native,
        web_tts,
        server_audio,
        sink,
        UnlockState::new(),
        ChainTimeouts::default(),
    );
    let speech = Arc::new(SpeechService::new(chain));
    let capture = Arc::new(CaptureSession::new(Arc::new(BridgeRecognizer::new(
        bridge.clone(),
    ))));

    let ctx = ApiContext {
        translator,
        history,
        tts,
        bridge,
        speech,
        capture,
        profile_override: config.speech.profile_override,
        default_limit: config.history.default_limit,
    };

    let ip: IpAddr = config
        .server
        .host
        .parse()
        .context("server.host is not a valid IP address")?;
    let addr = SocketAddr::new(ip, config.server.port);

    tracing::info!(%addr, "VoiceBridge backend listening");
    warp::serve(server::routes(ctx)).run(addr).await;
    Ok(())
}
