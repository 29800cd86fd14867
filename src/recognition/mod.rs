pub mod capture;
pub mod interface;

pub use capture::CaptureSession;
pub use interface::{BridgeRecognizer, RecognitionError, SpeechRecognizer, TranscriptResult};
