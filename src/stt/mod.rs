//! Speech-to-text boundary

pub mod engine;
pub mod transcriber;

pub use engine::{EngineLoader, SpeechEngine, WhisperEngine, WhisperLoader};
pub use transcriber::{transcribe_with_timeout, Transcriber};
