//! Speech service — the single entry point for "say this".
//!
//! Owns the two cross-request invariants the chain itself cannot see:
//!
//! - **Echo prevention**: an identical `(text, language)` request arriving
//!   while the first is still in flight is rejected outright. Queuing it
//!   would play the same audio twice back to back.
//! - **Cancel before speak**: the platform engine is one shared resource;
//!   whatever it is currently saying is stopped before a new attempt
//!   chain begins. Distinct texts may supersede each other freely.

use std::collections::HashSet;
use std::sync::Mutex as StdMutex;

use super::chain::FallbackChain;
use super::interface::{SpeakOutcome, SpeechError, SpeechRequest};
use crate::device::DeviceProfile;

pub struct SpeechService {
    chain: FallbackChain,
    in_flight: StdMutex<HashSet<(String, String)>>,
}

impl SpeechService {
    pub fn new(chain: FallbackChain) -> Self {
        Self {
            chain,
            in_flight: StdMutex::new(HashSet::new()),
        }
    }

    /// Speak one request using the strategy ladder for `profile`.
    ///
    /// Returns the successful outcome, `AlreadySpeaking` for a duplicate
    /// in-flight request, or `Exhausted` when every strategy failed.
    pub async fn speak(
        &self,
        profile: DeviceProfile,
        request: SpeechRequest,
    ) -> Result<SpeakOutcome, SpeechError> {
        let key = request.dedup_key();
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if !in_flight.insert(key.clone()) {
                return Err(SpeechError::AlreadySpeaking {
                    text: request.text,
                    language: request.language,
                });
            }
        }

        let result = self.speak_inner(profile, &request).await;

        self.in_flight.lock().unwrap().remove(&key);
        result
    }

    async fn speak_inner(
        &self,
        profile: DeviceProfile,
        request: &SpeechRequest,
    ) -> Result<SpeakOutcome, SpeechError> {
        // Stop whatever is currently audible before the first attempt.
        self.chain.native_engine().cancel().await?;
        self.chain.speak(profile, request).await
    }

    /// Whether an identical request is currently in flight.
    pub fn is_speaking(&self, text: &str, language: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap()
            .contains(&(text.to_string(), language.to_string()))
    }
}
