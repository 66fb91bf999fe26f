//! Bandwidth to sample-rate resolution.
//!
//! The instrument supports a fixed ladder of output bandwidths, each half the
//! one above it. A requested bandwidth is served by the smallest output
//! bandwidth that still contains it, so every bucket is the half-open
//! interval `(next_lower, output_bandwidth]` and the lowest bucket extends
//! down to the device minimum.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RsaError};
use crate::validation::{check_range, ValidationError};

/// One rung of the bandwidth ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandwidthEntry {
    /// Output bandwidth in Hz.
    pub output_bandwidth: f64,
    /// Output sample rate in samples/s.
    pub sample_rate: f64,
    /// Client buffer size (sample pairs) that suits this rate.
    pub default_buffer_size: usize,
}

impl BandwidthEntry {
    const fn new(output_bandwidth: f64, sample_rate: f64, default_buffer_size: usize) -> Self {
        Self {
            output_bandwidth,
            sample_rate,
            default_buffer_size,
        }
    }
}

const RSA_FAMILY: [BandwidthEntry; 13] = [
    BandwidthEntry::new(40.0e6, 56.0e6, 65536),
    BandwidthEntry::new(20.0e6, 28.0e6, 65536),
    BandwidthEntry::new(10.0e6, 14.0e6, 65536),
    BandwidthEntry::new(5.0e6, 7.0e6, 65536),
    BandwidthEntry::new(2.5e6, 3.5e6, 65536),
    BandwidthEntry::new(1.25e6, 1.75e6, 32768),
    BandwidthEntry::new(625.0e3, 875.0e3, 16384),
    BandwidthEntry::new(312.5e3, 437.5e3, 8192),
    BandwidthEntry::new(156.25e3, 218.75e3, 4096),
    BandwidthEntry::new(78125.0, 109.375e3, 2048),
    BandwidthEntry::new(39062.5, 54687.5, 1024),
    BandwidthEntry::new(19531.25, 27343.75, 512),
    BandwidthEntry::new(9765.625, 13671.875, 256),
];

/// Strictly descending bandwidth ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandwidthTable {
    entries: Vec<BandwidthEntry>,
}

impl BandwidthTable {
    /// Build a table, rejecting empty or non-descending ladders.
    pub fn new(entries: Vec<BandwidthEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(RsaError::InvalidConfiguration {
                message: "bandwidth table is empty".into(),
            });
        }
        if entries
            .windows(2)
            .any(|w| w[1].output_bandwidth >= w[0].output_bandwidth)
        {
            return Err(RsaError::InvalidConfiguration {
                message: "bandwidth table must be strictly descending".into(),
            });
        }
        Ok(Self { entries })
    }

    /// The ladder shared by the RSA306B/RSA500A/RSA600A instruments.
    pub fn rsa_family() -> Self {
        Self {
            entries: RSA_FAMILY.to_vec(),
        }
    }

    /// Entries from widest to narrowest.
    pub fn entries(&self) -> &[BandwidthEntry] {
        &self.entries
    }

    /// Widest output bandwidth.
    pub fn max_bandwidth(&self) -> f64 {
        self.entries[0].output_bandwidth
    }

    /// Narrowest output bandwidth.
    pub fn min_bandwidth(&self) -> f64 {
        self.entries[self.entries.len() - 1].output_bandwidth
    }

    /// Select the entry serving `requested_hz`.
    ///
    /// Requests must be positive and no wider than the top entry; anything
    /// at or below the narrowest entry resolves to it.
    pub fn resolve(&self, requested_hz: f64) -> Result<BandwidthEntry> {
        if !requested_hz.is_finite() {
            return Err(RsaError::validation(
                "acquisition bandwidth",
                ValidationError::NotFinite(requested_hz),
            ));
        }
        if requested_hz <= 0.0 {
            return Err(RsaError::validation(
                "acquisition bandwidth",
                ValidationError::OutOfRange {
                    value: requested_hz,
                    min: 0.0,
                    max: self.max_bandwidth(),
                    inclusive: false,
                },
            ));
        }
        check_range(requested_hz, 0.0, self.max_bandwidth(), true)
            .map_err(|e| RsaError::validation("acquisition bandwidth", e))?;

        // Narrowest first: the first entry wide enough is the enclosing bucket.
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.output_bandwidth >= requested_hz)
            .copied()
            .ok_or_else(|| RsaError::InvalidConfiguration {
                message: format!("no bandwidth entry covers {requested_hz} Hz"),
            })
    }

    /// Entry whose output bandwidth equals `bandwidth_hz` exactly.
    pub fn lookup(&self, bandwidth_hz: f64) -> Option<&BandwidthEntry> {
        self.entries
            .iter()
            .find(|entry| entry.output_bandwidth == bandwidth_hz)
    }
}

impl Default for BandwidthTable {
    fn default() -> Self {
        Self::rsa_family()
    }
}
