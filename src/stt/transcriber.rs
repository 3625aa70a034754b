//! Transcription session owning the lazily created engine

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::engine::{EngineLoader, SpeechEngine};
use crate::audio::{has_recording, pcm16_to_f32};
use crate::config::{SttConfig, SAMPLE_RATE};
use crate::error::{Result, SttEngineError, SyncError, WavError};
use crate::events::{SessionListener, TranscriptionEvent};
use crate::model::{check_model, provision_model};
use crate::wav;

/// Turns the recording on disk into text.
///
/// The engine is created on the first request and reused afterwards. A failed
/// initialization leaves nothing behind, so the next request starts over.
/// The engine is released once, by [`release`](Self::release) or on drop.
pub struct Transcriber {
    config: SttConfig,
    loader: Arc<dyn EngineLoader>,
    engine: Mutex<Option<Arc<dyn SpeechEngine>>>,
    last_transcript: Mutex<Option<String>>,
    listener: Arc<dyn SessionListener>,
}

impl Transcriber {
    pub fn new(
        config: SttConfig,
        loader: Arc<dyn EngineLoader>,
        listener: Arc<dyn SessionListener>,
    ) -> Self {
        Self {
            config,
            loader,
            engine: Mutex::new(None),
            last_transcript: Mutex::new(None),
            listener,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.lock().is_some()
    }

    /// Text of the most recent successful transcription
    pub fn last_transcript(&self) -> Option<String> {
        self.last_transcript.lock().clone()
    }

    /// Return the shared engine, creating it on first use
    pub fn ensure_engine(&self) -> Result<Arc<dyn SpeechEngine>> {
        let mut slot = self.engine.lock();
        if let Some(engine) = slot.as_ref() {
            return Ok(engine.clone());
        }

        let model = self.resolve_model()?;
        let started = Instant::now();
        let engine = self.loader.load(&model)?;
        info!(
            "Engine initialized from {} in {}ms",
            model.display(),
            started.elapsed().as_millis()
        );

        *slot = Some(engine.clone());
        Ok(engine)
    }

    fn resolve_model(&self) -> Result<PathBuf> {
        let min_bytes = self.config.min_model_bytes;
        match &self.config.model_path {
            Some(path) => {
                check_model(path, min_bytes)?;
                Ok(path.clone())
            }
            None => provision_model(&self.config.model_source, &self.config.model_dir, min_bytes),
        }
    }

    /// Transcribe the WAV recording at `path`.
    ///
    /// A missing or header-only file fails before the engine is touched. An
    /// empty result is reported as [`SttEngineError::EmptyTranscript`]. The
    /// recording itself is never modified, so a failed request can be retried.
    pub fn transcribe_file(&self, path: &Path) -> Result<String> {
        if !has_recording(path) {
            warn!("Transcribe requested but WAV missing/too small: {}", path.display());
            let err = SyncError::from(WavError::Missing(path.to_path_buf()));
            self.notify(TranscriptionEvent::Failed(err.user_message()));
            return Err(err);
        }

        info!("Transcribe requested: {}", path.display());
        self.notify(TranscriptionEvent::Started);

        match self.run(path) {
            Ok(text) => {
                *self.last_transcript.lock() = Some(text.clone());
                self.notify(TranscriptionEvent::Completed(text.clone()));
                Ok(text)
            }
            Err(e) => {
                warn!("Transcription failed: {}", e);
                self.notify(TranscriptionEvent::Failed(e.user_message()));
                Err(e)
            }
        }
    }

    fn run(&self, path: &Path) -> Result<String> {
        let engine = self.ensure_engine()?;

        let recording = wav::read_file(path)?;
        debug!(
            "WAV parsed: sr={} samples={}",
            recording.spec.sample_rate,
            recording.samples.len()
        );
        if recording.spec.sample_rate != SAMPLE_RATE {
            return Err(WavError::UnsupportedFormat(format!(
                "recording is {} Hz, expected {} Hz",
                recording.spec.sample_rate, SAMPLE_RATE
            ))
            .into());
        }

        let pcm = pcm16_to_f32(&recording.samples);
        let text = transcribe_with_timeout(engine, pcm, SAMPLE_RATE, self.config.timeout())?;

        let text = text.trim();
        if text.is_empty() {
            warn!("Transcription returned empty text");
            return Err(SttEngineError::EmptyTranscript.into());
        }
        Ok(text.to_string())
    }

    /// Free the engine. Safe to call repeatedly or before initialization.
    pub fn release(&self) {
        if self.engine.lock().take().is_some() {
            info!("Whisper context freed");
        }
    }

    fn notify(&self, event: TranscriptionEvent) {
        self.listener.on_transcription(&event);
    }
}

impl Drop for Transcriber {
    fn drop(&mut self) {
        self.release();
    }
}

/// Run `engine` on a dedicated thread and wait at most `timeout` for it.
///
/// On timeout the worker is abandoned, not interrupted: it keeps its engine
/// reference until the native call returns.
pub fn transcribe_with_timeout(
    engine: Arc<dyn SpeechEngine>,
    pcm: Vec<f32>,
    sample_rate: u32,
    timeout: Duration,
) -> std::result::Result<String, SttEngineError> {
    let (sender, receiver) = bounded(1);

    thread::Builder::new()
        .name("transcribe".to_string())
        .spawn(move || {
            let started = Instant::now();
            info!("Calling transcribe: samples={}, sr={}", pcm.len(), sample_rate);
            let result = engine.transcribe(&pcm, sample_rate);
            info!(
                "Transcribe done in {}ms (ok={})",
                started.elapsed().as_millis(),
                result.is_ok()
            );
            // The caller may have given up already
            let _ = sender.send(result);
        })
        .map_err(|e| SttEngineError::Transcription(e.to_string()))?;

    match receiver.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            warn!("Transcription exceeded {:?}, abandoning worker", timeout);
            Err(SttEngineError::Timeout(timeout))
        }
        Err(RecvTimeoutError::Disconnected) => Err(SttEngineError::Transcription(
            "transcription worker panicked".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::noop_listener;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoEngine(String);

    impl SpeechEngine for EchoEngine {
        fn transcribe(&self, _pcm: &[f32], _sample_rate: u32) -> std::result::Result<String, SttEngineError> {
            Ok(self.0.clone())
        }
    }

    struct SlowEngine;

    impl SpeechEngine for SlowEngine {
        fn transcribe(&self, _pcm: &[f32], _sample_rate: u32) -> std::result::Result<String, SttEngineError> {
            thread::sleep(Duration::from_millis(500));
            Ok("late".to_string())
        }
    }

    /// Fails the first `failures` loads, then hands out an echo engine
    struct FlakyLoader {
        failures: usize,
        calls: AtomicUsize,
    }

    impl EngineLoader for FlakyLoader {
        fn load(&self, _model_path: &Path) -> std::result::Result<Arc<dyn SpeechEngine>, SttEngineError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(SttEngineError::ModelLoad("whisper_init returned null".to_string()))
            } else {
                Ok(Arc::new(EchoEngine(" hello ".to_string())))
            }
        }
    }

    fn config_with_model(dir: &Path) -> SttConfig {
        let model = dir.join("ggml-tiny.bin");
        std::fs::write(&model, vec![0u8; 64]).unwrap();
        SttConfig {
            model_path: Some(model),
            min_model_bytes: 16,
            ..Default::default()
        }
    }

    #[test]
    fn test_timeout_abandons_worker() {
        let result = transcribe_with_timeout(
            Arc::new(SlowEngine),
            vec![0.0; 16],
            SAMPLE_RATE,
            Duration::from_millis(20),
        );
        assert!(matches!(result, Err(SttEngineError::Timeout(_))));
    }

    #[test]
    fn test_init_failure_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let loader = Arc::new(FlakyLoader {
            failures: 1,
            calls: AtomicUsize::new(0),
        });
        let transcriber = Transcriber::new(config_with_model(dir.path()), loader.clone(), noop_listener());

        assert!(transcriber.ensure_engine().is_err());
        assert!(!transcriber.is_initialized());

        assert!(transcriber.ensure_engine().is_ok());
        assert!(transcriber.is_initialized());
        transcriber.ensure_engine().unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);

        transcriber.release();
        transcriber.release();
        assert!(!transcriber.is_initialized());
    }

    #[test]
    fn test_undersized_model_never_reaches_loader() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_model(dir.path());
        config.min_model_bytes = 1_000_000;
        let loader = Arc::new(FlakyLoader {
            failures: 0,
            calls: AtomicUsize::new(0),
        });
        let transcriber = Transcriber::new(config, loader.clone(), noop_listener());

        assert!(matches!(
            transcriber.ensure_engine(),
            Err(SyncError::Stt(SttEngineError::ModelMissing(_)))
        ));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    }
}
