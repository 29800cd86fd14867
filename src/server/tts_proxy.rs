//! Server-rendered TTS audio with echo prevention.
//!
//! Renders speech for `(text, lang)` by fetching MP3 from the configured
//! upstream web-TTS service. A second request for the same pair while the
//! first is still rendering is rejected with an explicit "in progress"
//! signal (HTTP 429 at the route layer) — queuing it would hand two
//! identical audio streams to the client and they would overlap.

use std::collections::HashSet;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use reqwest::Client;

use crate::config::TtsUpstreamConfig;

#[derive(Debug, thiserror::Error)]
pub enum TtsProxyError {
    #[error("tts request for this text is already in progress")]
    InProgress,

    #[error("text must not be empty")]
    EmptyText,

    #[error("tts upstream returned {status}")]
    Upstream { status: u16 },

    #[error("tts fetch failed: {0}")]
    Fetch(String),
}

pub struct TtsAudioProxy {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    in_flight: StdMutex<HashSet<(String, String)>>,
}

impl TtsAudioProxy {
    pub fn from_config(config: &TtsUpstreamConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.resolve_api_key(),
            timeout: Duration::from_secs(config.timeout_secs),
            in_flight: StdMutex::new(HashSet::new()),
        }
    }

    /// Render `(text, lang)` to MP3 bytes, rejecting concurrent duplicates.
    pub async fn fetch(&self, text: &str, lang: &str) -> Result<Vec<u8>, TtsProxyError> {
        if text.trim().is_empty() {
            return Err(TtsProxyError::EmptyText);
        }

        let key = (text.to_string(), lang.to_string());
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if !in_flight.insert(key.clone()) {
                return Err(TtsProxyError::InProgress);
            }
        }

        let result = self.fetch_upstream(text, lang).await;

        self.in_flight.lock().unwrap().remove(&key);
        result
    }

    async fn fetch_upstream(&self, text: &str, lang: &str) -> Result<Vec<u8>, TtsProxyError> {
        let mut request = self
            .client
            .get(&self.base_url)
            .query(&[("q", text), ("tl", lang), ("client", "tw-ob")])
            .timeout(self.timeout);
        if let Some(ref api_key) = self.api_key {
            request = request.query(&[("key", api_key.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TtsProxyError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TtsProxyError::Upstream {
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TtsProxyError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Whether a render for `(text, lang)` is currently running.
    pub fn is_rendering(&self, text: &str, lang: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap()
            .contains(&(text.to_string(), lang.to_string()))
    }
}
