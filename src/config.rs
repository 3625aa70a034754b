//! Configuration structures for the whisper-sync system

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Only rate the capture pipeline and whisper accept
pub const SAMPLE_RATE: u32 = 16_000;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub stt: SttConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings outside what the pipeline supports (mono 16 kHz PCM16)
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &str, value: impl ToString) -> ConfigError {
            ConfigError::InvalidValue {
                field: field.to_string(),
                value: value.to_string(),
            }
        }

        if self.audio.sample_rate != SAMPLE_RATE {
            return Err(invalid("audio.sample_rate", self.audio.sample_rate));
        }
        if self.audio.channels != 1 {
            return Err(invalid("audio.channels", self.audio.channels));
        }
        if self.audio.bits_per_sample != 16 {
            return Err(invalid("audio.bits_per_sample", self.audio.bits_per_sample));
        }
        if self.audio.min_block_bytes < 2 {
            return Err(invalid("audio.min_block_bytes", self.audio.min_block_bytes));
        }
        if self.stt.timeout_secs == 0 {
            return Err(invalid("stt.timeout_secs", self.stt.timeout_secs));
        }
        Ok(())
    }
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture sample rate (Hz)
    pub sample_rate: u32,
    /// Number of channels (mono only)
    pub channels: u16,
    /// Bits per PCM sample
    pub bits_per_sample: u16,
    /// Lower bound for one read block, in bytes
    pub min_block_bytes: usize,
    /// Audio device name (None = default device)
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: 1,
            bits_per_sample: 16,
            min_block_bytes: 4096,
            device: None,
        }
    }
}

impl AudioConfig {
    /// Samples per read block given the stream's minimum buffer size in bytes
    pub fn block_len(&self, stream_min_bytes: usize) -> usize {
        (stream_min_bytes.max(self.min_block_bytes) / 2).max(1)
    }
}

/// STT engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Explicit model file; skips provisioning when set
    pub model_path: Option<PathBuf>,
    /// Bundled model that gets copied into `model_dir` on first use
    pub model_source: PathBuf,
    /// Writable directory holding the provisioned model
    pub model_dir: PathBuf,
    /// Language for transcription
    pub language: String,
    /// Number of threads for inference (0 = all cores but one)
    pub threads: u32,
    /// Enable translation to English
    pub translate: bool,
    /// Deadline for a single transcription call
    pub timeout_secs: u64,
    /// Models at or below this size are rejected
    pub min_model_bytes: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            model_source: PathBuf::from("./models/ggml-tiny.bin"),
            model_dir: data_dir().join("models"),
            language: "en".to_string(),
            threads: 0,
            translate: false,
            timeout_secs: 30,
            min_model_bytes: 1_000_000,
        }
    }
}

impl SttConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the inference thread count, leaving one core for the system
    pub fn effective_threads(&self) -> u32 {
        if self.threads > 0 {
            return self.threads;
        }
        (num_cpus::get() as u32).saturating_sub(1).max(1)
    }
}

/// Where the recording lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// The single most-recent recording; replaced on every capture
    pub recording_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            recording_path: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("whisper-sync")
                .join("last_recording.wav"),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("whisper-sync")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.channels, 1);
        assert_eq!(config.stt.language, "en");
        assert_eq!(config.stt.timeout(), Duration::from_secs(30));
        assert!(config
            .storage
            .recording_path
            .ends_with("whisper-sync/last_recording.wav"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
            [audio]
            min_block_bytes = 8192
            device = "USB"

            [stt]
            language = "de"
            threads = 8
            timeout_secs = 10
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.min_block_bytes, 8192);
        assert_eq!(config.audio.device.as_deref(), Some("USB"));
        assert_eq!(config.stt.language, "de");
        assert_eq!(config.stt.effective_threads(), 8);
        assert_eq!(config.stt.timeout_secs, 10);
    }

    #[test]
    fn test_validate_rejects_stereo() {
        let mut config = Config::default();
        config.audio.channels = 2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "audio.channels"
        ));
    }

    #[test]
    fn test_block_len_uses_larger_of_minimums() {
        let audio = AudioConfig::default();
        assert_eq!(audio.block_len(1280), 2048);
        assert_eq!(audio.block_len(10_000), 5000);
    }

    #[test]
    fn test_auto_threads_at_least_one() {
        let stt = SttConfig::default();
        assert!(stt.effective_threads() >= 1);
    }
}
