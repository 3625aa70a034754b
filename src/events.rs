//! Session event listener
//!
//! The recorder and transcriber report progress to one listener handed in at
//! construction. All methods default to no-ops so hosts only implement what
//! they draw.

use std::sync::Arc;

use crate::audio::CaptureSummary;

/// Transcription progress as seen by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionEvent {
    Started,
    Completed(String),
    Failed(String),
}

/// Receives state changes from a running session.
///
/// Called from background threads; implementations must not block.
pub trait SessionListener: Send + Sync {
    /// Loudness of the block just captured
    fn on_amplitude(&self, _level: u16) {}

    /// The capture worker has finalized the WAV file
    fn on_capture_finished(&self, _summary: &CaptureSummary) {}

    fn on_transcription(&self, _event: &TranscriptionEvent) {}
}

/// Listener that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl SessionListener for NoopListener {}

pub fn noop_listener() -> Arc<dyn SessionListener> {
    Arc::new(NoopListener)
}
