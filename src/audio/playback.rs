//! Playback of the last recording on the default output device

use std::path::Path;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use tracing::{debug, info};

use super::capture::has_recording;
use super::convert::pcm16_to_f32;
use crate::error::{Result, SyncError};
use crate::wav;

/// Plays one recording at a time; dropping the player silences it
#[derive(Default)]
pub struct Player {
    output: Option<(OutputStream, Sink)>,
}

impl Player {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start playing `path` without blocking.
    ///
    /// Returns `Ok(false)` when there is nothing to play (missing or
    /// header-only file). Any current playback is stopped first.
    pub fn play(&mut self, path: &Path) -> Result<bool> {
        if !has_recording(path) {
            debug!("Nothing to play at {}", path.display());
            return Ok(false);
        }
        self.stop();

        let recording = wav::read_file(path)?;
        let duration = recording.duration();
        let samples = pcm16_to_f32(&recording.samples);

        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| SyncError::Playback(e.to_string()))?;
        let sink = Sink::connect_new(stream.mixer());
        sink.append(SamplesBuffer::new(
            recording.spec.channels,
            recording.spec.sample_rate,
            samples,
        ));

        info!("Playback started: {} ({:.1}s)", path.display(), duration);
        self.output = Some((stream, sink));
        Ok(true)
    }

    pub fn is_playing(&self) -> bool {
        self.output
            .as_ref()
            .map_or(false, |(_, sink)| !sink.empty())
    }

    /// Block until the current recording has played out
    pub fn wait(&self) {
        if let Some((_, sink)) = &self.output {
            sink.sleep_until_end();
            debug!("Playback complete");
        }
    }

    /// Stop playback; a no-op when idle
    pub fn stop(&mut self) {
        if let Some((_stream, sink)) = self.output.take() {
            sink.stop();
            debug!("Playback stopped");
        }
    }
}
