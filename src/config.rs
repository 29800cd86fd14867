//! Shared config utilities for loading/saving JSON config files
//! and resolving API keys from fields or environment variables.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::device::DeviceProfile;

/// Generic load for any Serde config type with a `Default` implementation.
/// Falls back to `T::default()` if the file is missing or unparsable.
pub fn load_json_config<T: DeserializeOwned + Default>(path: &Path, label: &str) -> T {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<T>(&content) {
            Ok(config) => {
                println!("[{}] Loaded config from {}", label, path.display());
                config
            }
            Err(e) => {
                eprintln!(
                    "[{}] Failed to parse config {}: {} — using defaults",
                    label,
                    path.display(),
                    e
                );
                T::default()
            }
        },
        Err(_) => {
            println!(
                "[{}] No config file at {} — using defaults",
                label,
                path.display()
            );
            T::default()
        }
    }
}

/// Generic save for any Serde config type.
pub fn save_json_config<T: Serialize>(path: &Path, config: &T, label: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    std::fs::write(path, json).map_err(|e| format!("Failed to write config file: {}", e))?;
    println!("[{}] Saved config to {}", label, path.display());
    Ok(())
}

/// Resolve an API key: check the direct `api_key` field first,
/// then fall back to reading the environment variable named in `api_key_env`.
pub fn resolve_api_key(api_key: &Option<String>, api_key_env: &Option<String>) -> Option<String> {
    if let Some(ref key) = api_key {
        if !key.is_empty() {
            return Some(key.clone());
        }
    }
    if let Some(ref env_var) = api_key_env {
        if let Ok(key) = std::env::var(env_var) {
            if !key.is_empty() {
                return Some(key);
            }
        }
    }
    None
}

// ── Server ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5050
}

// ── Translation provider ───────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_translate_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_translate_url")]
    pub base_url: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_translate_key_env(),
            base_url: default_translate_url(),
        }
    }
}

impl TranslationConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_api_key(&self.api_key, &self.api_key_env)
    }
}

fn default_translate_key_env() -> Option<String> {
    Some("TRANSLATE_API_KEY".to_string())
}
fn default_translate_url() -> String {
    "https://translation.googleapis.com/language/translate/v2".to_string()
}

// ── Server-rendered TTS upstream ───────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsUpstreamConfig {
    #[serde(default = "default_tts_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
    #[serde(default = "default_tts_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TtsUpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_tts_url(),
            api_key: None,
            api_key_env: None,
            timeout_secs: default_tts_timeout_secs(),
        }
    }
}

impl TtsUpstreamConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_api_key(&self.api_key, &self.api_key_env)
    }
}

fn default_tts_url() -> String {
    "https://translate.google.com/translate_tts".to_string()
}
fn default_tts_timeout_secs() -> u64 {
    15
}

// ── Speech output ──────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Forces a device profile regardless of what the client reports.
    /// Used for testing and for browsers whose user agent lies.
    #[serde(default)]
    pub profile_override: Option<DeviceProfile>,
}

// ── History ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_list_limit")]
    pub default_limit: i64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            default_limit: default_list_limit(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://voicebridge.db".to_string()
}
fn default_list_limit() -> i64 {
    10
}

// ── Top-level ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub tts: TtsUpstreamConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl AppConfig {
    /// Default on-disk location: `<data dir>/voicebridge/config.json`,
    /// overridable with the `VOICEBRIDGE_CONFIG` environment variable.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("VOICEBRIDGE_CONFIG") {
            return PathBuf::from(path);
        }
        dirs_next::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voicebridge")
            .join("config.json")
    }

    pub fn load(path: &Path) -> Self {
        load_json_config(path, "Config")
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        save_json_config(path, self, "Config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_direct_key_over_env() {
        std::env::set_var("VOICEBRIDGE_TEST_KEY", "from-env");
        let resolved = resolve_api_key(
            &Some("direct".to_string()),
            &Some("VOICEBRIDGE_TEST_KEY".to_string()),
        );
        assert_eq!(resolved.as_deref(), Some("direct"));
    }

    #[test]
    fn resolve_falls_back_to_env_when_field_empty() {
        std::env::set_var("VOICEBRIDGE_TEST_KEY_2", "from-env");
        let resolved = resolve_api_key(
            &Some(String::new()),
            &Some("VOICEBRIDGE_TEST_KEY_2".to_string()),
        );
        assert_eq!(resolved.as_deref(), Some("from-env"));
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let config: AppConfig =
            load_json_config(Path::new("/nonexistent/voicebridge.json"), "Config");
        assert_eq!(config.server.port, 5050);
        assert_eq!(config.history.default_limit, 10);
        assert!(config.speech.profile_override.is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.json");

        let mut config = AppConfig::default();
        config.server.port = 6060;
        config.speech.profile_override = Some(crate::device::DeviceProfile::SamsungMobile);
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path);
        assert_eq!(loaded.server.port, 6060);
        assert_eq!(
            loaded.speech.profile_override,
            Some(crate::device::DeviceProfile::SamsungMobile)
        );
    }

    #[test]
    fn unparsable_config_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{ this is not json").unwrap();

        let loaded = AppConfig::load(&path);
        assert_eq!(loaded.server.port, 5050);
    }
}
