//! Custom error types for the whisper-sync system

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for the whisper-sync system
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("WAV error: {0}")]
    Wav(#[from] WavError),

    #[error("STT engine error: {0}")]
    Stt(#[from] SttEngineError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio input errors
#[derive(Error, Debug)]
pub enum AudioError {
    /// Microphone or input stream could not be acquired
    #[error("Audio input device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The input stream was stopped while a read was pending
    #[error("Audio input stream closed")]
    StreamClosed,

    #[error("Audio read failed: {0}")]
    Read(String),

    #[error("A capture session is already active")]
    AlreadyCapturing,
}

/// WAV encoding and decoding errors
#[derive(Error, Debug)]
pub enum WavError {
    #[error("WAV I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed WAV: {0}")]
    MalformedWav(String),

    #[error("Unsupported WAV format: {0}")]
    UnsupportedFormat(String),

    /// No recording on disk, or only a header was ever written
    #[error("Recording missing or empty: {}", .0.display())]
    Missing(PathBuf),
}

/// STT engine errors
#[derive(Error, Debug)]
pub enum SttEngineError {
    #[error("Model missing or too small: {0}")]
    ModelMissing(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Transcription returned empty text")]
    EmptyTranscript,

    #[error("Transcription timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid audio data for transcription")]
    InvalidAudioData,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration value: {field} = {value}")]
    InvalidValue { field: String, value: String },
}

impl SyncError {
    /// Short message suitable for showing to the user after a failed operation.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Wav(WavError::Missing(_)) => "WAV missing or empty.".to_string(),
            SyncError::Stt(SttEngineError::EmptyTranscript) => {
                "Empty result from transcriber.".to_string()
            }
            SyncError::Stt(SttEngineError::Timeout(_)) => "Transcription timed out.".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
