//! Synthetic IQ signals.
//!
//! Every value depends only on the absolute sample index, so a capture is
//! identical however the stream is cut into blocks.

use std::f64::consts::TAU;

/// Signal produced by the simulated analyzer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IqPattern {
    /// `I = k`, `Q = -k` for absolute sample index `k`
    Ramp,
    /// Complex exponential at `offset_hz` from center
    Tone {
        /// Offset from the center frequency in Hz
        offset_hz: f64,
        /// Peak amplitude
        amplitude: f32,
    },
}

impl Default for IqPattern {
    fn default() -> Self {
        Self::Tone {
            offset_hz: 1.0e3,
            amplitude: 0.5,
        }
    }
}

impl IqPattern {
    /// The `(I, Q)` pair at absolute index `k`.
    pub fn sample(&self, k: u64, sample_rate: f64) -> (f32, f32) {
        match *self {
            Self::Ramp => {
                let v = k as f32;
                (v, -v)
            }
            Self::Tone {
                offset_hz,
                amplitude,
            } => {
                let phase = if sample_rate > 0.0 {
                    TAU * offset_hz * (k as f64 / sample_rate)
                } else {
                    0.0
                };
                (
                    amplitude * phase.cos() as f32,
                    amplitude * phase.sin() as f32,
                )
            }
        }
    }

    /// `pairs` interleaved f32 values starting at index `start`.
    pub fn interleaved(&self, start: u64, pairs: usize, sample_rate: f64) -> Vec<f32> {
        let mut out = Vec::with_capacity(pairs * 2);
        for k in start..start + pairs as u64 {
            let (i, q) = self.sample(k, sample_rate);
            out.push(i);
            out.push(q);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp() {
        assert_eq!(IqPattern::Ramp.sample(5, 1000.0), (5.0, -5.0));
        assert_eq!(
            IqPattern::Ramp.interleaved(2, 2, 1000.0),
            vec![2.0, -2.0, 3.0, -3.0]
        );
    }

    #[test]
    fn test_tone_starts_at_amplitude() {
        let pattern = IqPattern::Tone {
            offset_hz: 250.0,
            amplitude: 1.0,
        };
        let (i, q) = pattern.sample(0, 1000.0);
        assert_eq!((i, q), (1.0, 0.0));
        // Quarter period later: 250 Hz at 1 kSa/s is 4 samples per cycle
        let (i, q) = pattern.sample(1, 1000.0);
        assert!(i.abs() < 1e-6);
        assert!((q - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_split_invariance() {
        let pattern = IqPattern::default();
        let whole = pattern.interleaved(0, 100, 14.0e6);
        let mut parts = pattern.interleaved(0, 40, 14.0e6);
        parts.extend(pattern.interleaved(40, 60, 14.0e6));
        assert_eq!(whole, parts);
    }
}
