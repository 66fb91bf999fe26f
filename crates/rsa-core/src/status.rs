//! Acquisition status word decoding.
//!
//! The device reports a 32-bit status word with each IQ block and with each
//! finished file capture. Bits 0-15 describe the most recent internal write
//! block; bits 16-31 are sticky for the whole run. Both halves share one
//! layout:
//!
//! | bit | condition |
//! |---|---|
//! | 0 | input overrange |
//! | 1 | USB stream discontinuity |
//! | 2 | input buffer > 75% full |
//! | 3 | input buffer overflow (data loss) |
//! | 4 | output buffer > 75% full |
//! | 5 | output buffer overflow (data loss) |
//! | 6-15 | reserved, always zero |
//!
//! Any reserved bit set in either half means the word itself is invalid.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RsaError};

bitflags! {
    /// Conditions decoded from an acquisition status word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct StatusConditions: u8 {
        /// ADC input exceeded its range.
        const INPUT_OVERRANGE = 1 << 0;
        /// Gap in the USB data stream.
        const STREAM_DISCONTINUITY = 1 << 1;
        /// Input buffer more than 75% full.
        const INPUT_BUFFER_NEAR_FULL = 1 << 2;
        /// Input buffer overflowed; samples were lost.
        const INPUT_BUFFER_OVERFLOW = 1 << 3;
        /// Output buffer more than 75% full.
        const OUTPUT_BUFFER_NEAR_FULL = 1 << 4;
        /// Output buffer overflowed; samples were lost.
        const OUTPUT_BUFFER_OVERFLOW = 1 << 5;
        /// A reserved bit was set.
        const INVALID_STATUS_BITS = 1 << 6;
    }
}

/// Bits that must be zero in a valid status word.
pub const RESERVED_MASK: u32 = 0xFFC0_FFC0;

const CONDITION_MASK: u32 = 0x3F;
const STICKY_SHIFT: u32 = 16;

const MESSAGES: [(StatusConditions, &str); 7] = [
    (StatusConditions::INPUT_OVERRANGE, "Input overrange."),
    (
        StatusConditions::STREAM_DISCONTINUITY,
        "USB data stream discontinuity.",
    ),
    (
        StatusConditions::INPUT_BUFFER_NEAR_FULL,
        "Input buffer > 75% full.",
    ),
    (
        StatusConditions::INPUT_BUFFER_OVERFLOW,
        "Input buffer overflow. IQStream processing too slow, data loss has occurred.",
    ),
    (
        StatusConditions::OUTPUT_BUFFER_NEAR_FULL,
        "Output buffer > 75% full.",
    ),
    (
        StatusConditions::OUTPUT_BUFFER_OVERFLOW,
        "Output buffer overflow. File writing too slow, data loss has occurred.",
    ),
    (
        StatusConditions::INVALID_STATUS_BITS,
        "Invalid status code returned. Some always-zero bits are nonzero.",
    ),
];

/// Decoding policy chosen per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusMode {
    /// Any non-empty report becomes a [`RsaError::StreamingFault`].
    Strict,
    /// Reports are returned; nothing is raised.
    #[default]
    Observational,
}

impl StatusMode {
    /// Mode for a `strict` flag.
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Observational
        }
    }
}

/// Structured view of one status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusReport {
    /// The raw word as reported by the device.
    pub word: u32,
    /// Decoded conditions.
    pub conditions: StatusConditions,
}

impl StatusReport {
    /// Decode the sticky half (bits 16-21) plus the reserved-bit check.
    pub fn decode(word: u32) -> Self {
        let mut conditions =
            StatusConditions::from_bits_truncate(((word >> STICKY_SHIFT) & CONDITION_MASK) as u8);
        if word & RESERVED_MASK != 0 {
            conditions |= StatusConditions::INVALID_STATUS_BITS;
        }
        Self { word, conditions }
    }

    /// Decode the non-sticky half (bits 0-5), describing the latest block only.
    pub fn per_block(word: u32) -> Self {
        let mut conditions = StatusConditions::from_bits_truncate((word & CONDITION_MASK) as u8);
        if word & RESERVED_MASK != 0 {
            conditions |= StatusConditions::INVALID_STATUS_BITS;
        }
        Self { word, conditions }
    }

    /// True when no condition is present.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// True when samples were dropped by either buffer.
    pub fn data_lost(&self) -> bool {
        self.conditions.intersects(
            StatusConditions::INPUT_BUFFER_OVERFLOW | StatusConditions::OUTPUT_BUFFER_OVERFLOW,
        )
    }

    /// Check for a single condition.
    pub fn contains(&self, condition: StatusConditions) -> bool {
        self.conditions.contains(condition)
    }

    /// Vendor message for every present condition, in bit order.
    pub fn messages(&self) -> Vec<&'static str> {
        MESSAGES
            .iter()
            .filter(|(flag, _)| self.conditions.contains(*flag))
            .map(|(_, msg)| *msg)
            .collect()
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "No error.");
        }
        write!(f, "{}", self.messages().join(" "))
    }
}

/// Decode `word` and apply the caller's [`StatusMode`].
pub fn decode_status(word: u32, mode: StatusMode) -> Result<StatusReport> {
    let report = StatusReport::decode(word);
    match mode {
        StatusMode::Strict if !report.is_empty() => Err(RsaError::StreamingFault {
            report,
            capture: None,
        }),
        _ => Ok(report),
    }
}
