//! RIFF/WAVE encoding and decoding for mono PCM16 recordings
//!
//! The writer streams samples behind a placeholder header and patches the
//! size fields once capture ends; the reader walks the chunk list back into
//! a [`WavData`].

pub mod reader;
pub mod writer;

pub use reader::{parse, read_file, WavData};
pub use writer::WavWriter;

/// Size of the canonical header; sample data starts right after it
pub const HEADER_LEN: u64 = 44;

/// Offset of the RIFF chunk size field
pub(crate) const RIFF_SIZE_OFFSET: u64 = 4;

/// Offset of the data chunk size field
pub(crate) const DATA_SIZE_OFFSET: u64 = 40;

/// Audio format tag for linear PCM in the `fmt ` chunk
pub(crate) const FORMAT_PCM: u16 = 1;

/// Stream parameters stored in the `fmt ` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl WavSpec {
    /// Mono 16-bit PCM at the given rate
    pub fn mono_pcm16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            bits_per_sample: 16,
        }
    }

    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * self.bits_per_sample as u32 / 8
    }

    /// Encode the 44-byte header for a data region of `data_bytes`
    pub fn header(&self, data_bytes: u32) -> [u8; HEADER_LEN as usize] {
        self.encode(riff_size(data_bytes), data_bytes)
    }

    /// Header written at stream start: both size fields are zero until finalize
    pub fn placeholder_header(&self) -> [u8; HEADER_LEN as usize] {
        self.encode(0, 0)
    }

    fn encode(&self, riff_size: u32, data_bytes: u32) -> [u8; HEADER_LEN as usize] {
        let mut header = [0u8; HEADER_LEN as usize];
        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&riff_size.to_le_bytes());
        header[8..12].copy_from_slice(b"WAVE");
        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&16u32.to_le_bytes());
        header[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
        header[22..24].copy_from_slice(&self.channels.to_le_bytes());
        header[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        header[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        header[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&data_bytes.to_le_bytes());
        header
    }
}

/// RIFF chunk size: everything after the first 8 bytes
pub(crate) fn riff_size(data_bytes: u32) -> u32 {
    36u32.wrapping_add(data_bytes)
}
