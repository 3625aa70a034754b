//! Microphone capture into a streaming WAV file
//!
//! A [`Recorder`] owns one capture session at a time. Starting it acquires an
//! input stream from an [`AudioInput`], writes a placeholder WAV header and
//! spawns a worker that pulls fixed-size blocks until stopped. Every block is
//! appended to the file and its loudness published to an [`AmplitudeGauge`].
//! The worker always finalizes the header on the way out, so even a session
//! cut short by a read error leaves a valid WAV behind.

use std::fs;
use std::io::{ErrorKind, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Host, Sample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, trace, warn};

use super::convert::{downmix_to_mono, extend_le_bytes};
use super::level::{estimate_amplitude, AmplitudeGauge};
use crate::config::AudioConfig;
use crate::error::{AudioError, Result, SyncError};
use crate::events::SessionListener;
use crate::wav::{WavSpec, WavWriter, HEADER_LEN};

/// One message from a live input stream: a chunk of samples or a stream failure
pub type BlockMessage = std::result::Result<Vec<i16>, AudioError>;

/// How long a blocked read waits before re-checking the capture flag
const READ_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Chunks buffered between the audio callback and the capture worker
const CHANNEL_CAPACITY: usize = 64;

/// Blocking source of PCM16 samples, owned by the capture worker
pub trait BlockSource: Send {
    /// Fill the front of `buf` and return how many samples were written.
    ///
    /// `Ok(0)` means nothing arrived yet. [`AudioError::StreamClosed`] means
    /// the stream was stopped and no more data will come.
    fn read(&mut self, buf: &mut [i16]) -> std::result::Result<usize, AudioError>;
}

/// A freshly opened input stream
pub struct InputStream {
    pub source: Box<dyn BlockSource>,
    /// Smallest buffer the stream accepts, in bytes (0 if unknown)
    pub min_buffer_bytes: usize,
}

/// Acquires and releases the microphone stream
pub trait AudioInput {
    /// Open and start a mono PCM16 stream at the configured rate
    fn open(&mut self, config: &AudioConfig) -> std::result::Result<InputStream, AudioError>;

    /// Stop and release the live stream. Calling it with nothing open is a no-op.
    fn close(&mut self);
}

/// [`BlockSource`] fed through a channel by an audio callback.
///
/// Chunks larger than the caller's buffer are handed out over several reads.
/// Once every sender is gone the source reports [`AudioError::StreamClosed`].
pub struct ChannelSource {
    receiver: Receiver<BlockMessage>,
    pending: Vec<i16>,
    offset: usize,
}

impl ChannelSource {
    pub fn new(receiver: Receiver<BlockMessage>) -> Self {
        Self {
            receiver,
            pending: Vec::new(),
            offset: 0,
        }
    }

    /// Create a connected sender / source pair with room for `capacity` chunks
    pub fn channel(capacity: usize) -> (Sender<BlockMessage>, Self) {
        let (sender, receiver) = bounded(capacity);
        (sender, Self::new(receiver))
    }
}

impl BlockSource for ChannelSource {
    fn read(&mut self, buf: &mut [i16]) -> std::result::Result<usize, AudioError> {
        if self.offset >= self.pending.len() {
            match self.receiver.recv_timeout(READ_POLL_INTERVAL) {
                Ok(message) => {
                    self.pending = message?;
                    self.offset = 0;
                }
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => return Err(AudioError::StreamClosed),
            }
        }

        let available = &self.pending[self.offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.offset += n;
        Ok(n)
    }
}

/// Result of one capture session, available once the worker has finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    pub path: PathBuf,
    /// PCM bytes written after the header
    pub data_bytes: u32,
    /// Non-empty blocks captured
    pub blocks: u64,
    /// Why the loop ended early, if it did
    pub error: Option<String>,
}

impl CaptureSummary {
    /// Expected size of the file on disk
    pub fn file_len(&self) -> u64 {
        HEADER_LEN + self.data_bytes as u64
    }

    pub fn samples(&self) -> u64 {
        self.data_bytes as u64 / 2
    }
}

/// Handle to a stopping capture worker.
///
/// The WAV header is only guaranteed to be finalized after [`wait`](Self::wait) returns.
pub struct CaptureHandle {
    worker: JoinHandle<CaptureSummary>,
}

impl CaptureHandle {
    /// Block until the worker has finalized and closed the file
    pub fn wait(self) -> std::result::Result<CaptureSummary, AudioError> {
        self.worker
            .join()
            .map_err(|_| AudioError::Read("capture worker panicked".to_string()))
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }
}

struct ActiveCapture {
    capturing: Arc<AtomicBool>,
    worker: JoinHandle<CaptureSummary>,
    /// Disconnects once the worker has finalized and reported
    done: Receiver<()>,
}

/// Owns the recording file, the input and at most one running capture
pub struct Recorder<I: AudioInput> {
    input: I,
    config: AudioConfig,
    output_path: PathBuf,
    gauge: AmplitudeGauge,
    listener: Arc<dyn SessionListener>,
    active: Option<ActiveCapture>,
    /// Completion signal of the last stopped session
    draining: Option<Receiver<()>>,
}

impl<I: AudioInput> Recorder<I> {
    pub fn new(
        input: I,
        config: AudioConfig,
        output_path: impl Into<PathBuf>,
        listener: Arc<dyn SessionListener>,
    ) -> Self {
        Self {
            input,
            config,
            output_path: output_path.into(),
            gauge: AmplitudeGauge::new(),
            listener,
            active: None,
            draining: None,
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Shared handle to the live loudness slot
    pub fn gauge(&self) -> AmplitudeGauge {
        self.gauge.clone()
    }

    /// Latest loudness while capturing, 0 otherwise
    pub fn amplitude(&self) -> u16 {
        if self.is_capturing() {
            self.gauge.read()
        } else {
            0
        }
    }

    /// True while the worker is still pulling blocks
    pub fn is_capturing(&self) -> bool {
        self.active.as_ref().map_or(false, |active| {
            active.capturing.load(Ordering::Relaxed) && !active.worker.is_finished()
        })
    }

    /// A finished recording with at least one byte of audio exists
    pub fn has_recording(&self) -> bool {
        has_recording(&self.output_path)
    }

    /// Begin a new capture session, replacing the previous recording.
    ///
    /// Fails with [`AudioError::AlreadyCapturing`] while a worker is still
    /// running. A session whose worker ended on its own is reaped here. The
    /// previous worker always finishes reporting before the new one starts.
    pub fn start(&mut self) -> Result<()> {
        if let Some(ref active) = self.active {
            if !active.worker.is_finished() {
                return Err(AudioError::AlreadyCapturing.into());
            }
            if let Some(handle) = self.stop() {
                match handle.wait() {
                    Ok(summary) => debug!(
                        "Reaped finished capture: {} bytes, error={:?}",
                        summary.data_bytes, summary.error
                    ),
                    Err(e) => warn!("Capture worker did not shut down cleanly: {}", e),
                }
            }
        }
        if let Some(done) = self.draining.take() {
            // Only ever disconnects; no message is sent
            let _ = done.recv();
        }

        match fs::remove_file(&self.output_path) {
            Ok(()) => debug!("Deleted old recording: {}", self.output_path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let stream = self.input.open(&self.config)?;
        let block_len = self.config.block_len(stream.min_buffer_bytes);
        debug!(
            "Capture block: {} samples (stream min {} bytes)",
            block_len, stream.min_buffer_bytes
        );

        let writer = match self.create_writer() {
            Ok(writer) => writer,
            Err(e) => {
                self.input.close();
                return Err(e);
            }
        };
        info!("WAV header placeholder written: {}", self.output_path.display());

        let capturing = Arc::new(AtomicBool::new(true));
        let (done_sender, done) = bounded::<()>(0);
        let capture_loop = CaptureLoop {
            source: stream.source,
            writer,
            capturing: capturing.clone(),
            gauge: self.gauge.clone(),
            listener: self.listener.clone(),
            block_len,
            path: self.output_path.clone(),
        };

        let spawned = thread::Builder::new()
            .name("capture-loop".to_string())
            .spawn(move || {
                let summary = capture_loop.run();
                drop(done_sender);
                summary
            });

        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                // The closure was dropped with the writer, which finalizes the header.
                self.input.close();
                return Err(e.into());
            }
        };

        self.active = Some(ActiveCapture {
            capturing,
            worker,
            done,
        });
        info!("Recording started");
        Ok(())
    }

    fn create_writer(&self) -> Result<WavWriter<fs::File>> {
        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let spec = WavSpec {
            sample_rate: self.config.sample_rate,
            channels: self.config.channels,
            bits_per_sample: self.config.bits_per_sample,
        };
        Ok(WavWriter::create(&self.output_path, spec)?)
    }

    /// Stop capturing and release the input stream.
    ///
    /// Returns `None` if nothing was running. The returned handle resolves once
    /// the worker has finalized the WAV header.
    pub fn stop(&mut self) -> Option<CaptureHandle> {
        let active = self.active.take()?;
        active.capturing.store(false, Ordering::Relaxed);
        self.input.close();
        self.gauge.reset();
        self.draining = Some(active.done);
        info!("Recording stopped: {}", self.output_path.display());
        Some(CaptureHandle {
            worker: active.worker,
        })
    }

    /// Stop and wait for the file to be finalized
    pub fn stop_and_wait(&mut self) -> Result<Option<CaptureSummary>> {
        match self.stop() {
            Some(handle) => {
                let summary = handle.wait()?;
                info!(
                    "Recording finalized: {} ({} bytes)",
                    summary.path.display(),
                    summary.file_len()
                );
                Ok(Some(summary))
            }
            None => Ok(None),
        }
    }
}

impl<I: AudioInput> Drop for Recorder<I> {
    fn drop(&mut self) {
        if let Some(handle) = self.stop() {
            if let Err(e) = handle.wait() {
                warn!("Capture worker did not shut down cleanly: {}", e);
            }
        }
    }
}

/// True if `path` holds more than a bare WAV header
pub fn has_recording(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.len() > HEADER_LEN)
        .unwrap_or(false)
}

/// The blocking pull loop run on the capture worker thread
struct CaptureLoop<W: Write + Seek> {
    source: Box<dyn BlockSource>,
    writer: WavWriter<W>,
    capturing: Arc<AtomicBool>,
    gauge: AmplitudeGauge,
    listener: Arc<dyn SessionListener>,
    block_len: usize,
    path: PathBuf,
}

impl<W: Write + Seek> CaptureLoop<W> {
    fn run(self) -> CaptureSummary {
        let CaptureLoop {
            mut source,
            mut writer,
            capturing,
            gauge,
            listener,
            block_len,
            path,
        } = self;

        let mut block = vec![0i16; block_len];
        let mut bytes = Vec::with_capacity(block_len * 2);
        let mut blocks = 0u64;
        let mut failure = None;

        while capturing.load(Ordering::Relaxed) {
            let n = match source.read(&mut block) {
                Ok(n) => n,
                Err(AudioError::StreamClosed) => {
                    debug!("Input stream closed, leaving capture loop");
                    break;
                }
                Err(e) => {
                    error!("Recording loop failed: {}", e);
                    failure = Some(e.to_string());
                    break;
                }
            };
            if n == 0 {
                continue;
            }

            let samples = &block[..n];
            let level = estimate_amplitude(samples);
            gauge.publish(level);
            listener.on_amplitude(level);

            bytes.clear();
            extend_le_bytes(&mut bytes, samples);
            if let Err(e) = writer.append_block(&bytes) {
                error!("Failed to append audio block: {}", e);
                failure = Some(e.to_string());
                break;
            }
            blocks += 1;
            trace!("block {}: {} samples, level {}", blocks, n, level);
        }

        let data_bytes = match writer.finalize() {
            Ok(data_bytes) => {
                info!(
                    "WAV finalized: data_bytes={} total_size={}",
                    data_bytes,
                    HEADER_LEN + data_bytes as u64
                );
                data_bytes
            }
            Err(e) => {
                warn!("finalize WAV header failed: {}", e);
                failure.get_or_insert_with(|| e.to_string());
                writer.data_bytes()
            }
        };
        drop(writer);
        drop(source);
        gauge.reset();

        let summary = CaptureSummary {
            path,
            data_bytes,
            blocks,
            error: failure,
        };
        listener.on_capture_finished(&summary);
        summary
    }
}

/// Default-host microphone input built on cpal
pub struct MicrophoneInput {
    host: Host,
    stream: Option<Stream>,
}

impl MicrophoneInput {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
            stream: None,
        }
    }

    /// List available audio input devices
    pub fn list_devices(&self) -> std::result::Result<Vec<String>, AudioError> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        Ok(devices.filter_map(|device| device.name().ok()).collect())
    }

    fn select_device(&self, config: &AudioConfig) -> std::result::Result<Device, AudioError> {
        if let Some(ref name) = config.device {
            let devices = self
                .host
                .input_devices()
                .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;
            for device in devices {
                if device.name().map_or(false, |n| n.contains(name.as_str())) {
                    return Ok(device);
                }
            }
            return Err(AudioError::DeviceUnavailable(format!("device not found: {}", name)));
        }

        self.host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceUnavailable("no audio input device".to_string()))
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        sender: Sender<BlockMessage>,
    ) -> std::result::Result<Stream, AudioError>
    where
        T: SizedSample + Send + 'static,
        i16: FromSample<T>,
    {
        let error_sender = sender.clone();
        let channels = config.channels as usize;
        device
            .build_input_stream(
                config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    let samples: Vec<i16> = data.iter().map(|&s| i16::from_sample(s)).collect();
                    // Convert to mono if multi-channel
                    let samples = if channels > 1 {
                        downmix_to_mono(&samples, channels)
                    } else {
                        samples
                    };
                    if sender.try_send(Ok(samples)).is_err() {
                        warn!("Audio buffer overflow - dropping samples");
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    let _ = error_sender.try_send(Err(AudioError::Read(err.to_string())));
                },
                None,
            )
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))
    }
}

impl Default for MicrophoneInput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioInput for MicrophoneInput {
    fn open(&mut self, config: &AudioConfig) -> std::result::Result<InputStream, AudioError> {
        self.close();

        let device = self.select_device(config)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio input device: {}", device_name);

        let target_rate = SampleRate(config.sample_rate);
        let supported = device
            .supported_input_configs()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?
            .filter(|cfg| {
                cfg.channels() > 0
                    && cfg.min_sample_rate() <= target_rate
                    && target_rate <= cfg.max_sample_rate()
            })
            .filter(|cfg| matches!(cfg.sample_format(), SampleFormat::I16 | SampleFormat::F32))
            // Native channel count first, then I16: least work in the callback
            .min_by_key(|cfg| {
                (
                    cfg.channels() != config.channels,
                    cfg.sample_format() != SampleFormat::I16,
                )
            })
            .ok_or_else(|| {
                AudioError::DeviceUnavailable(format!(
                    "{} cannot capture {} Hz",
                    device_name, config.sample_rate
                ))
            })?;
        let device_channels = supported.channels();
        if device_channels != config.channels {
            info!(
                "Device offers {} channel(s), downmixing to {}",
                device_channels, config.channels
            );
        }

        let min_buffer_bytes = match supported.buffer_size() {
            cpal::SupportedBufferSize::Range { min, .. } => {
                *min as usize * config.channels as usize * 2
            }
            cpal::SupportedBufferSize::Unknown => 0,
        };
        let sample_format = supported.sample_format();
        let stream_config = StreamConfig {
            channels: device_channels,
            sample_rate: target_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let (sender, source) = ChannelSource::channel(CHANNEL_CAPACITY);
        let stream = match sample_format {
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &stream_config, sender)?,
            _ => Self::build_stream::<f32>(&device, &stream_config, sender)?,
        };
        stream
            .play()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        info!(
            "Audio input started: {} Hz, {} channel(s), {:?}",
            config.sample_rate, config.channels, sample_format
        );
        self.stream = Some(stream);

        Ok(InputStream {
            source: Box::new(source),
            min_buffer_bytes,
        })
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("Audio input pause failed: {}", e);
            }
            drop(stream);
            info!("Audio input released");
        }
    }
}

impl Drop for MicrophoneInput {
    fn drop(&mut self) {
        self.close();
    }
}
