//! Timing configuration for realistic mode.

use std::time::Duration;

/// Hardware-like delays applied in [`MockMode::Realistic`](super::MockMode).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingConfig {
    /// USB command round-trip in milliseconds
    pub command_delay_ms: u64,
    /// Fraction of real time spent delivering a block (1.0 = sample-rate paced)
    pub block_pacing: f64,
    /// Time for the device to close a finished file, in milliseconds
    pub file_close_ms: u64,
}

impl TimingConfig {
    /// Timing of a USB 3.0 attached instrument.
    pub fn usb() -> Self {
        Self {
            command_delay_ms: 1,
            block_pacing: 1.0,
            file_close_ms: 20,
        }
    }

    /// Delay covering `pairs` samples at `sample_rate`.
    pub fn block_delay(&self, pairs: usize, sample_rate: f64) -> Duration {
        if sample_rate <= 0.0 || self.block_pacing <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(pairs as f64 / sample_rate * self.block_pacing)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            command_delay_ms: 0,
            block_pacing: 0.0,
            file_close_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing() {
        let config = TimingConfig::default();
        assert_eq!(config.command_delay_ms, 0);
        assert_eq!(config.block_delay(1000, 1000.0), Duration::ZERO);
    }

    #[test]
    fn test_block_delay() {
        let config = TimingConfig::usb();
        assert_eq!(config.block_delay(500, 1000.0), Duration::from_millis(500));
        assert_eq!(config.block_delay(500, 0.0), Duration::ZERO);
    }
}
