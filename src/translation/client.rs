//! Translation client — one POST to the configured provider, no retries.
//!
//! Provider failures surface to the user as-is; a missing API key is a
//! fatal configuration error the operator has to fix, reported as 500 by
//! the route layer and never retried.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::TranslationConfig;

/// A completed translation round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translation {
    pub translated_text: String,
    pub confidence: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("no translation API key configured")]
    MissingApiKey,

    #[error("translation request failed: {0}")]
    Request(String),

    #[error("translation provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("translation provider sent a malformed response: {0}")]
    Malformed(String),
}

#[derive(Serialize)]
struct ProviderRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
}

#[derive(Deserialize)]
struct ProviderResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
    confidence: Option<f64>,
}

pub struct TranslationClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl TranslationClient {
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(20))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: config.base_url.clone(),
            api_key: config.resolve_api_key(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Translate `text` between BCP-47-like tags (`en-US` → `ta-IN`).
    pub async fn translate(
        &self,
        text: &str,
        from: &str,
        to: &str,
    ) -> Result<Translation, TranslateError> {
        let key = self.api_key.as_ref().ok_or(TranslateError::MissingApiKey)?;

        let body = ProviderRequest {
            q: text,
            source: from,
            target: to,
        };

        let response = self
            .client
            .post(&self.base_url)
            .query(&[("key", key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| TranslateError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TranslateError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ProviderResponse = response
            .json()
            .await
            .map_err(|e| TranslateError::Malformed(e.to_string()))?;

        Ok(Translation {
            translated_text: parsed.translated_text,
            confidence: parsed.confidence.unwrap_or(1.0),
        })
    }
}
