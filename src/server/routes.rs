//! HTTP API routes.
//!
//! `POST /api/translate`        — proxy one translation, append to history
//! `GET  /api/translations`     — recent translations, newest first
//! `DELETE /api/translations`   — clear history
//! `GET  /api/tts-audio`        — server-rendered MP3, 429 on duplicates
//! `GET|HEAD /api/health`       — liveness for offline detection
//! `POST /api/speak`            — run the speech fallback chain
//! `POST /api/listen`           — one recognition round trip
//! `GET  /api/speech`           — WebSocket bridge to the client shell

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::Filter;

use super::tts_proxy::{TtsAudioProxy, TtsProxyError};
use crate::device::{classify, DeviceProfile};
use crate::history::{HistoryStore, TranslationRecord};
use crate::recognition::{CaptureSession, RecognitionError};
use crate::speech::{HostBridge, SpeakOutcome, SpeechError, SpeechRequest, SpeechService};
use crate::translation::{TranslateError, TranslationClient};

const MAX_BODY_BYTES: u64 = 64 * 1024;

#[derive(Clone)]
pub struct ApiContext {
    pub translator: Arc<TranslationClient>,
    pub history: HistoryStore,
    pub tts: Arc<TtsAudioProxy>,
    pub bridge: Arc<HostBridge>,
    pub speech: Arc<SpeechService>,
    pub capture: Arc<CaptureSession>,
    pub profile_override: Option<DeviceProfile>,
    pub default_limit: i64,
}

// ── Bodies ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TranslateBody {
    pub text: String,
    pub from: String,
    pub to: String,
}

#[derive(Serialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
    confidence: f64,
    translation: TranslationRecord,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TtsQuery {
    pub text: String,
    pub lang: String,
}

#[derive(Debug, Deserialize)]
pub struct SpeakBody {
    pub text: String,
    pub language: String,
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct ListenBody {
    pub language: String,
}

// ── Route composition ──────────────────────────────────

pub fn routes(
    ctx: ApiContext,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let with_ctx = {
        let ctx = ctx.clone();
        warp::any().map(move || ctx.clone())
    };

    let translate = warp::path!("api" / "translate")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_ctx.clone())
        .and_then(handle_translate);

    let list = warp::path!("api" / "translations")
        .and(warp::get())
        .and(warp::query::<ListQuery>())
        .and(with_ctx.clone())
        .and_then(handle_list);

    let clear = warp::path!("api" / "translations")
        .and(warp::delete())
        .and(with_ctx.clone())
        .and_then(handle_clear);

    let tts_audio = warp::path!("api" / "tts-audio")
        .and(warp::get())
        .and(warp::query::<TtsQuery>())
        .and(with_ctx.clone())
        .and_then(handle_tts_audio);

    let health = warp::path!("api" / "health")
        .and(warp::get().or(warp::head()).unify())
        .and_then(handle_health);

    let speak = warp::path!("api" / "speak")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_ctx.clone())
        .and_then(handle_speak);

    let listen = warp::path!("api" / "listen")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_ctx.clone())
        .and_then(handle_listen);

    let shell = super::ws::ws_route(ctx);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST", "DELETE", "HEAD"]);

    translate
        .or(list)
        .or(clear)
        .or(tts_audio)
        .or(health)
        .or(speak)
        .or(listen)
        .or(shell)
        .with(cors)
}

// ── Handlers ───────────────────────────────────────────

fn json_error(
    status: StatusCode,
    message: impl Into<String>,
) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&ErrorBody {
            error: message.into(),
        }),
        status,
    )
}

async fn handle_translate(
    body: TranslateBody,
    ctx: ApiContext,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, warp::Rejection> {
    if body.text.trim().is_empty() || body.from.trim().is_empty() || body.to.trim().is_empty() {
        return Ok(json_error(
            StatusCode::BAD_REQUEST,
            "text, from and to are required",
        ));
    }

    let translation = match ctx.translator.translate(&body.text, &body.from, &body.to).await {
        Ok(translation) => translation,
        Err(e) => {
            tracing::warn!(error = %e, "translation failed");
            let status = match &e {
                TranslateError::MissingApiKey => StatusCode::INTERNAL_SERVER_ERROR,
                TranslateError::Provider { status, .. } => StatusCode::from_u16(*status)
                    .unwrap_or(StatusCode::BAD_GATEWAY),
                TranslateError::Request(_) | TranslateError::Malformed(_) => {
                    StatusCode::BAD_GATEWAY
                }
            };
            return Ok(json_error(status, e.to_string()));
        }
    };

    let record = TranslationRecord::new(
        body.from,
        body.to,
        body.text,
        translation.translated_text.clone(),
        translation.confidence,
    );
    if let Err(e) = ctx.history.append(&record).await {
        tracing::error!(error = %e, "failed to record translation");
        return Ok(json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
    }

    let response = TranslateResponse {
        translated_text: translation.translated_text,
        confidence: translation.confidence,
        translation: record,
    };
    Ok(warp::reply::with_status(
        warp::reply::json(&response),
        StatusCode::OK,
    ))
}

async fn handle_list(
    query: ListQuery,
    ctx: ApiContext,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, warp::Rejection> {
    let limit = query.limit.unwrap_or(ctx.default_limit).clamp(1, 200);
    match ctx.history.list(limit).await {
        Ok(records) => Ok(warp::reply::with_status(
            warp::reply::json(&records),
            StatusCode::OK,
        )),
        Err(e) => Ok(json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

async fn handle_clear(
    ctx: ApiContext,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, warp::Rejection> {
    match ctx.history.clear_all().await {
        Ok(cleared) => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({ "cleared": true, "removed": cleared })),
            StatusCode::OK,
        )),
        Err(e) => Ok(json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

async fn handle_tts_audio(
    query: TtsQuery,
    ctx: ApiContext,
) -> Result<warp::http::Response<Vec<u8>>, warp::Rejection> {
    let respond_json = |status: StatusCode, message: &str| {
        warp::http::Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(
                serde_json::to_vec(&ErrorBody {
                    error: message.to_string(),
                })
                .unwrap_or_default(),
            )
            .unwrap_or_default()
    };

    match ctx.tts.fetch(&query.text, &query.lang).await {
        Ok(audio) => Ok(warp::http::Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "audio/mpeg")
            .header("Cache-Control", "no-store")
            .body(audio)
            .unwrap_or_default()),
        Err(TtsProxyError::InProgress) => Ok(respond_json(
            StatusCode::TOO_MANY_REQUESTS,
            &TtsProxyError::InProgress.to_string(),
        )),
        Err(TtsProxyError::EmptyText) => Ok(respond_json(
            StatusCode::BAD_REQUEST,
            &TtsProxyError::EmptyText.to_string(),
        )),
        Err(e) => {
            tracing::warn!(error = %e, "tts render failed");
            Ok(respond_json(StatusCode::BAD_GATEWAY, &e.to_string()))
        }
    }
}

async fn handle_health() -> Result<warp::reply::WithStatus<warp::reply::Json>, warp::Rejection> {
    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "status": "ok",
            "timestamp": Utc::now().to_rfc3339(),
        })),
        StatusCode::OK,
    ))
}

async fn handle_speak(
    body: SpeakBody,
    ctx: ApiContext,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, warp::Rejection> {
    if body.text.trim().is_empty() {
        return Ok(json_error(StatusCode::BAD_REQUEST, "text is required"));
    }

    // Profile is recomputed per call from whatever the shell last
    // reported; the configured override always wins.
    let mut signals = ctx.bridge.signals().await;
    signals.override_profile = ctx.profile_override;
    let profile = classify(&signals);

    let mut request = SpeechRequest::new(body.text, body.language);
    if let Some(rate) = body.rate {
        request.rate = rate;
    }
    if let Some(pitch) = body.pitch {
        request.pitch = pitch;
    }

    match ctx.speech.speak(profile, request).await {
        Ok(outcome) => {
            let status_label = match outcome {
                SpeakOutcome::Completed => "completed",
                SpeakOutcome::StartedNoEnd => "started",
                // Non-success outcomes never escape the chain.
                _ => "completed",
            };
            Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({
                    "status": status_label,
                    "profile": profile.as_str(),
                })),
                StatusCode::OK,
            ))
        }
        Err(e @ SpeechError::AlreadySpeaking { .. }) => {
            Ok(json_error(StatusCode::CONFLICT, e.to_string()))
        }
        Err(e @ SpeechError::EngineGone) => {
            Ok(json_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
        Err(e) => Ok(json_error(StatusCode::BAD_GATEWAY, e.to_string())),
    }
}

async fn handle_listen(
    body: ListenBody,
    ctx: ApiContext,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, warp::Rejection> {
    match ctx.capture.listen(&body.language).await {
        Ok(transcript) => Ok(warp::reply::with_status(
            warp::reply::json(&transcript),
            StatusCode::OK,
        )),
        Err(e @ RecognitionError::Busy) => Ok(json_error(StatusCode::CONFLICT, e.to_string())),
        Err(e @ RecognitionError::Unavailable(_)) => {
            Ok(json_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
        Err(e) => Ok(json_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())),
    }
}
