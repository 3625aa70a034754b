//! RIFF/WAVE parser for mono PCM16 recordings

use std::path::Path;

use tracing::trace;

use super::{WavSpec, FORMAT_PCM};
use crate::config::SAMPLE_RATE;
use crate::error::WavError;

/// Decoded contents of a WAV file
#[derive(Debug, Clone, PartialEq)]
pub struct WavData {
    pub spec: WavSpec,
    pub samples: Vec<i16>,
}

impl WavData {
    /// Duration in seconds
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.spec.sample_rate.max(1) as f32
    }
}

/// Read and parse a WAV file from disk
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<WavData, WavError> {
    let bytes = std::fs::read(path.as_ref())?;
    parse(&bytes)
}

/// Parse a RIFF/WAVE byte stream into its format fields and PCM16 samples.
///
/// Sub-chunks are walked as `id, size, payload` with no pad byte after
/// odd-sized payloads. Scanning stops at the first `data` chunk.
pub fn parse(bytes: &[u8]) -> Result<WavData, WavError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(WavError::MalformedWav("missing RIFF/WAVE magic".to_string()));
    }

    // Defaults match what the recorder writes, for files without a fmt chunk
    let mut spec = WavSpec::mono_pcm16(SAMPLE_RATE);
    let mut data: Option<(usize, usize)> = None;

    let mut pos = 12usize;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = le32(bytes, pos + 4) as usize;
        trace!("chunk {:?} at {} size {}", String::from_utf8_lossy(id), pos, size);

        match id {
            b"fmt " => {
                if pos + 24 > bytes.len() {
                    return Err(WavError::MalformedWav("truncated fmt chunk".to_string()));
                }
                let audio_format = le16(bytes, pos + 8);
                if audio_format != FORMAT_PCM {
                    return Err(WavError::UnsupportedFormat(format!(
                        "audio format tag {} is not PCM",
                        audio_format
                    )));
                }
                spec = WavSpec {
                    channels: le16(bytes, pos + 10),
                    sample_rate: le32(bytes, pos + 12),
                    bits_per_sample: le16(bytes, pos + 22),
                };
            }
            b"data" => {
                data = Some((pos + 8, size));
                break;
            }
            _ => {}
        }
        pos = pos.saturating_add(8).saturating_add(size);
    }

    let (start, len) = data.ok_or_else(|| WavError::MalformedWav("no data chunk".to_string()))?;

    if spec.channels != 1 || spec.bits_per_sample != 16 {
        return Err(WavError::UnsupportedFormat(format!(
            "expected mono 16-bit, got {} channel(s) at {} bits",
            spec.channels, spec.bits_per_sample
        )));
    }

    let end = start
        .checked_add(len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| {
            WavError::MalformedWav(format!(
                "data chunk claims {} bytes but only {} remain",
                len,
                bytes.len().saturating_sub(start)
            ))
        })?;

    let samples = bytes[start..end]
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Ok(WavData { spec, samples })
}

fn le16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn le32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn fmt_payload(format: u16, channels: u16, rate: u32, bits: u16) -> Vec<u8> {
        let align = channels * bits / 8;
        let mut p = Vec::new();
        p.extend_from_slice(&format.to_le_bytes());
        p.extend_from_slice(&channels.to_le_bytes());
        p.extend_from_slice(&rate.to_le_bytes());
        p.extend_from_slice(&(rate * align as u32).to_le_bytes());
        p.extend_from_slice(&align.to_le_bytes());
        p.extend_from_slice(&bits.to_le_bytes());
        p
    }

    fn riff(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = chunks.concat();
        let mut out = b"RIFF".to_vec();
        out.extend_from_slice(&(4 + body.len() as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend(body);
        out
    }

    #[test]
    fn test_parse_canonical_file() {
        let bytes = riff(&[
            chunk(b"fmt ", &fmt_payload(1, 1, 16_000, 16)),
            chunk(b"data", &[0x10, 0x27, 0xf0, 0xd8, 0xff, 0x7f, 0x00, 0x80]),
        ]);

        let wav = parse(&bytes).unwrap();
        assert_eq!(wav.spec, WavSpec::mono_pcm16(16_000));
        assert_eq!(wav.samples, vec![10000, -10000, i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_skips_unknown_chunks() {
        let bytes = riff(&[
            chunk(b"fmt ", &fmt_payload(1, 1, 8_000, 16)),
            chunk(b"LIST", b"INFOISFT"),
            chunk(b"data", &[1, 0, 2, 0]),
        ]);

        let wav = parse(&bytes).unwrap();
        assert_eq!(wav.spec.sample_rate, 8_000);
        assert_eq!(wav.samples, vec![1, 2]);
    }

    #[test]
    fn test_odd_chunk_is_not_padded() {
        // 3-byte payload followed directly by the data chunk, no pad byte
        let bytes = riff(&[
            chunk(b"fmt ", &fmt_payload(1, 1, 16_000, 16)),
            chunk(b"junk", &[0xaa, 0xbb, 0xcc]),
            chunk(b"data", &[5, 0]),
        ]);
        assert_eq!(parse(&bytes).unwrap().samples, vec![5]);

        // A padded file is misread: the scanner lands one byte early
        let mut padded = riff(&[chunk(b"fmt ", &fmt_payload(1, 1, 16_000, 16))]);
        padded.extend(chunk(b"junk", &[0xaa, 0xbb, 0xcc]));
        padded.push(0);
        padded.extend(chunk(b"data", &[5, 0]));
        assert!(matches!(parse(&padded), Err(WavError::MalformedWav(_))));
    }

    #[test]
    fn test_missing_data_chunk() {
        let bytes = riff(&[chunk(b"fmt ", &fmt_payload(1, 1, 16_000, 16))]);
        assert!(matches!(parse(&bytes), Err(WavError::MalformedWav(_))));
    }

    #[test]
    fn test_bad_magic() {
        assert!(matches!(parse(b"RIFX\0\0\0\0WAVE"), Err(WavError::MalformedWav(_))));
        assert!(matches!(parse(b"RIFF"), Err(WavError::MalformedWav(_))));
        assert!(matches!(parse(&[]), Err(WavError::MalformedWav(_))));
    }

    #[test]
    fn test_rejects_non_pcm_and_stereo() {
        let float = riff(&[
            chunk(b"fmt ", &fmt_payload(3, 1, 16_000, 32)),
            chunk(b"data", &[0; 8]),
        ]);
        assert!(matches!(parse(&float), Err(WavError::UnsupportedFormat(_))));

        let stereo = riff(&[
            chunk(b"fmt ", &fmt_payload(1, 2, 16_000, 16)),
            chunk(b"data", &[0; 8]),
        ]);
        assert!(matches!(parse(&stereo), Err(WavError::UnsupportedFormat(_))));

        let eight_bit = riff(&[
            chunk(b"fmt ", &fmt_payload(1, 1, 16_000, 8)),
            chunk(b"data", &[0; 8]),
        ]);
        assert!(matches!(parse(&eight_bit), Err(WavError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_truncated_data_chunk() {
        let mut bytes = riff(&[
            chunk(b"fmt ", &fmt_payload(1, 1, 16_000, 16)),
            chunk(b"data", &[0; 8]),
        ]);
        bytes.truncate(bytes.len() - 4);
        assert!(matches!(parse(&bytes), Err(WavError::MalformedWav(_))));
    }

    #[test]
    fn test_odd_data_length_drops_trailing_byte() {
        let bytes = riff(&[
            chunk(b"fmt ", &fmt_payload(1, 1, 16_000, 16)),
            chunk(b"data", &[1, 0, 9]),
        ]);
        assert_eq!(parse(&bytes).unwrap().samples, vec![1]);
    }
}
