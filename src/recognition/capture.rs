//! Capture session — enforces a single active listen.
//!
//! The platform recognition engine misbehaves when started twice, so the
//! session wraps any `SpeechRecognizer` and turns a second concurrent
//! start into `RecognitionError::Busy` instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::interface::{RecognitionError, SpeechRecognizer, TranscriptResult};

pub struct CaptureSession {
    recognizer: Arc<dyn SpeechRecognizer>,
    listening: AtomicBool,
}

impl CaptureSession {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            listening: AtomicBool::new(false),
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Listen once. A second call while listening fails fast with `Busy`.
    pub async fn listen(&self, language: &str) -> Result<TranscriptResult, RecognitionError> {
        if self
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RecognitionError::Busy);
        }

        let result = self.recognizer.recognize(language).await;
        self.listening.store(false, Ordering::SeqCst);
        result
    }

    /// Abort the active listen, if any.
    pub async fn stop(&self) {
        if self.is_listening() {
            self.recognizer.stop().await;
        }
    }
}
