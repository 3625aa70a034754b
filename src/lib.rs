//! Record, replay and transcribe short voice notes
//!
//! Audio is captured from the microphone as 16 kHz mono PCM16 and streamed
//! straight into a WAV file while a live loudness value is published for the
//! UI. The finished recording can be played back or handed to a Whisper
//! model for offline transcription.
//!
//! # Architecture
//!
//! - `wav`: streaming WAV writer and chunk-walking reader
//! - `audio`: capture loop, amplitude estimation, PCM conversion, playback
//! - `stt`: speech engine boundary and the transcription session
//! - `model`: provisioning of the model file
//! - `events`: listener for amplitude and transcription updates
//! - `config`: configuration structures
//! - `error`: error types
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use whisper_sync::{noop_listener, Config, MicrophoneInput, Recorder, Transcriber, WhisperLoader};
//!
//! let config = Config::default();
//! let listener = noop_listener();
//!
//! let mut recorder = Recorder::new(
//!     MicrophoneInput::new(),
//!     config.audio.clone(),
//!     &config.storage.recording_path,
//!     listener.clone(),
//! );
//! recorder.start().unwrap();
//! // ... speak ...
//! recorder.stop_and_wait().unwrap();
//!
//! let loader = Arc::new(WhisperLoader::new(config.stt.clone()));
//! let transcriber = Transcriber::new(config.stt.clone(), loader, listener);
//! let text = transcriber.transcribe_file(&config.storage.recording_path).unwrap();
//! println!("{}", text);
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod stt;
pub mod wav;

// Re-exports for convenience
pub use audio::{
    estimate_amplitude, has_recording, pcm16_to_f32, AmplitudeGauge, AudioInput, CaptureHandle,
    CaptureSummary, MicrophoneInput, Player, Recorder, MAX_AMPLITUDE,
};
pub use config::{AudioConfig, Config, StorageConfig, SttConfig, SAMPLE_RATE};
pub use error::{AudioError, ConfigError, Result, SttEngineError, SyncError, WavError};
pub use events::{noop_listener, SessionListener, TranscriptionEvent};
pub use stt::{EngineLoader, SpeechEngine, Transcriber, WhisperLoader};
pub use wav::{WavData, WavSpec, WavWriter};
