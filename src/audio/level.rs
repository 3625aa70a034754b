//! Loudness estimation for the live waveform display

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

/// Largest value a PCM16 sample can reach in magnitude
pub const MAX_AMPLITUDE: u16 = i16::MAX as u16;

/// RMS loudness of a block, truncated to an integer and clamped to `[0, 32767]`.
///
/// Returns 0 for an empty block.
pub fn estimate_amplitude(samples: &[i16]) -> u16 {
    if samples.is_empty() {
        return 0;
    }

    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let v = s as f64;
            v * v
        })
        .sum();

    let rms = (sum_sq / samples.len() as f64).sqrt();
    (rms as u32).min(MAX_AMPLITUDE as u32) as u16
}

/// Single-slot register holding the most recent block loudness.
///
/// Written by the capture worker, polled by the UI. Last write wins; readers
/// may see a stale value, never a torn one. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct AmplitudeGauge {
    level: Arc<AtomicU16>,
}

impl AmplitudeGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, level: u16) {
        self.level.store(level, Ordering::Relaxed);
    }

    pub fn read(&self) -> u16 {
        self.level.load(Ordering::Relaxed)
    }

    /// Back to silence
    pub fn reset(&self) {
        self.publish(0);
    }

    /// Level scaled to `0.0..=1.0` for drawing
    pub fn fraction(&self) -> f32 {
        self.read() as f32 / MAX_AMPLITUDE as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_block_is_silent() {
        assert_eq!(estimate_amplitude(&[]), 0);
    }

    #[test]
    fn test_silence() {
        assert_eq!(estimate_amplitude(&[0; 1024]), 0);
    }

    #[test]
    fn test_alternating_square_wave() {
        let block: Vec<i16> = (0..1024)
            .map(|i| if i % 2 == 0 { 10_000 } else { -10_000 })
            .collect();
        assert_eq!(estimate_amplitude(&block), 10_000);
    }

    #[test]
    fn test_full_scale_clamps() {
        // i16::MIN squared exceeds 32767², the result must still clamp
        assert_eq!(estimate_amplitude(&[i16::MIN; 64]), MAX_AMPLITUDE);
        assert_eq!(estimate_amplitude(&[i16::MAX; 64]), MAX_AMPLITUDE);
    }

    #[test]
    fn test_rms_truncates() {
        // sqrt((3² + 4²) / 2) = 3.535...
        assert_eq!(estimate_amplitude(&[3, 4]), 3);
    }

    #[test]
    fn test_always_in_range() {
        let mut seed = 0x2545_f491_u32;
        for _ in 0..200 {
            let block: Vec<i16> = (0..97)
                .map(|_| {
                    seed ^= seed << 13;
                    seed ^= seed >> 17;
                    seed ^= seed << 5;
                    seed as i16
                })
                .collect();
            let level = estimate_amplitude(&block);
            assert!(level <= MAX_AMPLITUDE);
        }
    }

    #[test]
    fn test_gauge_last_write_wins() {
        let gauge = AmplitudeGauge::new();
        let reader = gauge.clone();
        gauge.publish(120);
        gauge.publish(9000);
        assert_eq!(reader.read(), 9000);
        gauge.reset();
        assert_eq!(reader.read(), 0);
        assert_eq!(reader.fraction(), 0.0);
    }
}
