//! PCM16 conversions for the WAV sink and the transcription engine

/// Normalize PCM16 to `[-1.0, 1.0]` by dividing by 32768.
///
/// `-32768` maps to exactly `-1.0`; `32767` lands just below `1.0`.
pub fn pcm16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&s| (s as f32 / 32768.0).clamp(-1.0, 1.0))
        .collect()
}

/// Serialize samples as little-endian bytes, appending to `out`
pub fn extend_le_bytes(out: &mut Vec<u8>, samples: &[i16]) {
    out.reserve(samples.len() * 2);
    for &s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
}

/// Serialize samples as little-endian bytes
pub fn pcm16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    extend_le_bytes(&mut out, samples);
    out
}

/// Average interleaved frames of `channels` samples down to one channel.
///
/// A trailing partial frame is averaged over the samples it has.
pub fn downmix_to_mono(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / frame.len() as i32) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_bounds() {
        let out = pcm16_to_f32(&[i16::MIN, 0, i16::MAX]);
        assert_eq!(out[0], -1.0);
        assert_eq!(out[1], 0.0);
        assert!(out[2] < 1.0);
        assert!((out[2] - 32767.0 / 32768.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_float_monotonic_and_length_preserving() {
        let input: Vec<i16> = (i16::MIN..=i16::MAX).step_by(97).collect();
        let out = pcm16_to_f32(&input);
        assert_eq!(out.len(), input.len());
        assert!(out.windows(2).all(|w| w[0] < w[1]));
        assert!(out.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_le_bytes() {
        assert_eq!(pcm16_to_le_bytes(&[1, -2, 0x1234]), vec![1, 0, 0xfe, 0xff, 0x34, 0x12]);
        assert!(pcm16_to_le_bytes(&[]).is_empty());
    }

    #[test]
    fn test_extend_reuses_buffer() {
        let mut buf = vec![0xaa];
        extend_le_bytes(&mut buf, &[-1]);
        assert_eq!(buf, vec![0xaa, 0xff, 0xff]);
    }

    #[test]
    fn test_downmix_stereo() {
        let stereo = [1000, 3000, -200, 200, i16::MAX, i16::MAX, i16::MIN, i16::MIN];
        assert_eq!(
            downmix_to_mono(&stereo, 2),
            vec![2000, 0, i16::MAX, i16::MIN]
        );
        assert_eq!(downmix_to_mono(&[5, 7, 9], 1), vec![5, 7, 9]);
        assert_eq!(downmix_to_mono(&[6, 6, 6, 3], 3), vec![6, 3]);
    }
}
