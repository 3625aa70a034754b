//! Audio capture, loudness, conversion and playback

pub mod capture;
pub mod convert;
pub mod level;
pub mod playback;

pub use capture::{
    has_recording, AudioInput, BlockMessage, BlockSource, CaptureHandle, CaptureSummary,
    ChannelSource, InputStream, MicrophoneInput, Recorder,
};
pub use convert::{pcm16_to_f32, pcm16_to_le_bytes};
pub use level::{estimate_amplitude, AmplitudeGauge, MAX_AMPLITUDE};
pub use playback::Player;
