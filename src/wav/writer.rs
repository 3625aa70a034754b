//! Streaming WAV writer with a placeholder header patched on finalize

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, warn};

use super::{riff_size, WavSpec, DATA_SIZE_OFFSET, HEADER_LEN, RIFF_SIZE_OFFSET};
use crate::error::WavError;

/// Appends PCM16 bytes to a seekable sink behind a 44-byte header.
///
/// The size fields stay zero until [`finalize`](Self::finalize). If the writer
/// is dropped without being finalized, the header is patched best-effort so
/// the file is still a valid (possibly short) WAV.
pub struct WavWriter<W: Write + Seek> {
    sink: W,
    spec: WavSpec,
    data_bytes: u32,
    finalized: bool,
}

impl WavWriter<File> {
    /// Create (or truncate) `path` for read/write and write the placeholder header
    pub fn create<P: AsRef<Path>>(path: P, spec: WavSpec) -> Result<Self, WavError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        Self::begin(file, spec)
    }
}

impl<W: Write + Seek> WavWriter<W> {
    /// Write the placeholder header at the start of `sink` and park the cursor at byte 44
    pub fn begin(mut sink: W, spec: WavSpec) -> Result<Self, WavError> {
        sink.seek(SeekFrom::Start(0))?;
        sink.write_all(&spec.placeholder_header())?;
        sink.seek(SeekFrom::Start(HEADER_LEN))?;

        Ok(Self {
            sink,
            spec,
            data_bytes: 0,
            finalized: false,
        })
    }

    /// Append already little-endian PCM16 bytes at the cursor.
    ///
    /// The running total only counts bytes the sink accepted, so after a
    /// failed append it still matches what is on disk.
    pub fn append_block(&mut self, bytes: &[u8]) -> Result<(), WavError> {
        if self.finalized {
            return Err(WavError::Io(std::io::Error::new(
                ErrorKind::Other,
                "append after finalize",
            )));
        }
        if bytes.len() as u64 > (u32::MAX - 36 - self.data_bytes) as u64 {
            return Err(WavError::UnsupportedFormat(
                "data region exceeds the 4 GiB RIFF limit".to_string(),
            ));
        }

        let mut remaining = bytes;
        while !remaining.is_empty() {
            match self.sink.write(remaining) {
                Ok(0) => {
                    return Err(WavError::Io(std::io::Error::new(
                        ErrorKind::WriteZero,
                        "sink accepted no bytes",
                    )));
                }
                Ok(n) => {
                    self.data_bytes += n as u32;
                    remaining = &remaining[n..];
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Bytes appended so far
    pub fn data_bytes(&self) -> u32 {
        self.data_bytes
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Patch the RIFF and data size fields, leaving the cursor at end of data.
    ///
    /// Runs once; later calls return the recorded size without touching the sink.
    pub fn finalize(&mut self) -> Result<u32, WavError> {
        if self.finalized {
            return Ok(self.data_bytes);
        }
        // Marked first so a failed patch is not retried from Drop.
        self.finalized = true;

        let data_bytes = self.data_bytes;
        self.sink.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
        self.sink.write_all(&riff_size(data_bytes).to_le_bytes())?;
        self.sink.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
        self.sink.write_all(&data_bytes.to_le_bytes())?;
        self.sink.seek(SeekFrom::Start(HEADER_LEN + data_bytes as u64))?;
        self.sink.flush()?;

        debug!(
            "WAV header finalized: data_bytes={} total={}",
            data_bytes,
            HEADER_LEN + data_bytes as u64
        );
        Ok(data_bytes)
    }
}

impl<W: Write + Seek> Drop for WavWriter<W> {
    fn drop(&mut self) {
        if !self.finalized {
            if let Err(e) = self.finalize() {
                warn!("Failed to finalize WAV header on drop: {}", e);
            }
        }
    }
}
