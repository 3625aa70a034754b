//! Speech engine boundary and the whisper.cpp implementation

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::config::{SttConfig, SAMPLE_RATE};
use crate::error::SttEngineError;

/// An initialized speech-to-text engine.
///
/// Calls are blocking and stateless from the caller's point of view, so one
/// engine is shared across requests. Dropping the last reference frees it.
pub trait SpeechEngine: Send + Sync {
    /// Transcribe mono float PCM in `[-1.0, 1.0]` and return the raw text
    fn transcribe(&self, pcm: &[f32], sample_rate: u32) -> Result<String, SttEngineError>;
}

/// Creates engines from a model file on disk
pub trait EngineLoader: Send + Sync {
    fn load(&self, model_path: &Path) -> Result<Arc<dyn SpeechEngine>, SttEngineError>;
}

/// Whisper-based Speech-to-Text engine
pub struct WhisperEngine {
    ctx: WhisperContext,
    language: String,
    threads: u32,
    translate: bool,
}

impl WhisperEngine {
    /// Load a whisper.cpp model on the CPU
    pub fn new(model_path: &Path, config: &SttConfig) -> Result<Self, SttEngineError> {
        if !model_path.exists() {
            return Err(SttEngineError::ModelMissing(model_path.display().to_string()));
        }
        let path_str = model_path.to_str().ok_or_else(|| {
            SttEngineError::ModelLoad(format!("non UTF-8 model path: {}", model_path.display()))
        })?;

        info!("Loading Whisper model from: {}", model_path.display());

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(false);
        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| SttEngineError::ModelLoad(e.to_string()))?;

        info!("Whisper model loaded successfully");

        Ok(Self {
            ctx,
            language: config.language.clone(),
            threads: config.effective_threads(),
            translate: config.translate,
        })
    }

    /// Get the language configured for transcription
    pub fn language(&self) -> &str {
        &self.language
    }
}

impl SpeechEngine for WhisperEngine {
    fn transcribe(&self, pcm: &[f32], sample_rate: u32) -> Result<String, SttEngineError> {
        if pcm.is_empty() || sample_rate != SAMPLE_RATE {
            return Err(SttEngineError::InvalidAudioData);
        }

        debug!(
            "Transcribing {} samples ({:.2}s), threads={}",
            pcm.len(),
            pcm.len() as f32 / sample_rate as f32,
            self.threads
        );

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        params.set_n_threads(self.threads as i32);
        params.set_language(Some(&self.language));
        params.set_translate(self.translate);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_no_context(true);
        params.set_token_timestamps(false);
        params.set_split_on_word(true);
        // Liberal thresholds so quiet speech is not classified as silence
        params.set_suppress_blank(false);
        params.set_no_speech_thold(0.10);
        params.set_logprob_thold(-2.0);
        params.set_entropy_thold(-1.0);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttEngineError::Transcription(e.to_string()))?;

        state
            .full(params, pcm)
            .map_err(|e| SttEngineError::Transcription(e.to_string()))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| SttEngineError::Transcription(e.to_string()))?;

        let mut text = String::new();
        for i in 0..num_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| SttEngineError::Transcription(e.to_string()))?;
            text.push_str(&segment);
        }

        debug!("Transcription complete: {} segments, {} chars", num_segments, text.len());
        Ok(text)
    }
}

/// Loads [`WhisperEngine`]s with the given settings
pub struct WhisperLoader {
    config: SttConfig,
}

impl WhisperLoader {
    pub fn new(config: SttConfig) -> Self {
        Self { config }
    }
}

impl EngineLoader for WhisperLoader {
    fn load(&self, model_path: &Path) -> Result<Arc<dyn SpeechEngine>, SttEngineError> {
        Ok(Arc::new(WhisperEngine::new(model_path, &self.config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_missing_model() {
        let loader = WhisperLoader::new(SttConfig::default());
        let result = loader.load(Path::new("/nonexistent/model.bin"));
        assert!(matches!(result, Err(SttEngineError::ModelMissing(_))));
    }
}
