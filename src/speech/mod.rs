pub mod bridge;
pub mod chain;
pub mod interface;
pub mod native;
pub mod server_audio;
pub mod service;
pub mod unlock;
pub mod voices;
pub mod web_tts;

#[cfg(test)]
mod tests;

pub use bridge::{DirectiveFrame, EventFrame, HostBridge};
pub use chain::{ChainTimeouts, FallbackChain};
pub use interface::{
    AudioSink, EngineEvent, SpeakOutcome, SpeechError, SpeechRequest, SynthesisEngine, Utterance,
    VoiceInfo,
};
pub use service::SpeechService;
pub use unlock::UnlockState;
pub use voices::select_voice;
