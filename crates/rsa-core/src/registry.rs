//! Bidirectional name/code tables for enumerated device settings.
//!
//! The native driver takes plain integer codes; callers use the vendor's
//! setting names. Each [`Registry`] is an ordered, immutable table where a
//! name's position is its native code.
//!
//! Device event, frequency reference, spectrum trace and vertical unit
//! tables are not used by the streaming client; they are provided for
//! callers driving those settings on the same session.

use crate::error::{Result, RsaError};

/// Ordered table mapping setting names to native codes.
#[derive(Debug, Clone, Copy)]
pub struct Registry {
    domain: &'static str,
    names: &'static [&'static str],
    case_insensitive: bool,
}

impl Registry {
    /// Create a case-sensitive registry.
    pub const fn new(domain: &'static str, names: &'static [&'static str]) -> Self {
        Self {
            domain,
            names,
            case_insensitive: false,
        }
    }

    /// Create a registry that matches names ignoring ASCII case.
    pub const fn case_insensitive(domain: &'static str, names: &'static [&'static str]) -> Self {
        Self {
            domain,
            names,
            case_insensitive: true,
        }
    }

    /// Human-readable domain name (used in error messages).
    pub fn domain(&self) -> &'static str {
        self.domain
    }

    /// All names in code order.
    pub fn names(&self) -> &'static [&'static str] {
        self.names
    }

    /// Native code for `name`.
    pub fn encode(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|candidate| {
                if self.case_insensitive {
                    candidate.eq_ignore_ascii_case(name)
                } else {
                    *candidate == name
                }
            })
            .ok_or_else(|| RsaError::InvalidSetting {
                domain: self.domain,
                value: name.to_string(),
                expected: self.names.join(", "),
            })
    }

    /// Name for a native code, `None` when the code is out of range.
    pub fn decode(&self, index: usize) -> Option<&'static str> {
        self.names.get(index).copied()
    }
}

/// IQ stream output destinations.
pub const IQ_OUTPUT_DESTINATIONS: Registry = Registry::new(
    "IQ stream destination",
    &["CLIENT", "FILE_TIQ", "FILE_SIQ", "FILE_SIQ_SPLIT"],
);

/// IQ stream output sample datatypes.
pub const IQ_OUTPUT_DATATYPES: Registry = Registry::new(
    "IQ stream datatype",
    &["SINGLE", "INT32", "INT16", "SINGLE_SCALE_INT32"],
);

/// Trigger modes.
pub const TRIGGER_MODES: Registry =
    Registry::case_insensitive("trigger mode", &["freerun", "triggered"]);

/// Trigger sources.
pub const TRIGGER_SOURCES: Registry =
    Registry::new("trigger source", &["External", "IFPowerLevel"]);

/// Trigger transition detection modes.
pub const TRIGGER_TRANSITIONS: Registry =
    Registry::new("trigger transition", &["LH", "HL", "Either"]);

/// Device events reported by the event-status query.
pub const DEVICE_EVENTS: Registry = Registry::new("device event", &["OVERRANGE", "TRIGGER", "1PPS"]);

/// Frequency reference sources.
pub const FREQ_REF_SOURCES: Registry = Registry::new(
    "frequency reference source",
    &["INTERNAL", "EXTREF", "GNSS", "USER"],
);

/// Spectrum window functions.
pub const SPECTRUM_WINDOWS: Registry = Registry::new(
    "spectrum window",
    &[
        "Kaiser",
        "Mil6dB",
        "BlackmanHarris",
        "Rectangular",
        "FlatTop",
        "Hann",
    ],
);

/// Spectrum detectors.
pub const SPECTRUM_DETECTORS: Registry = Registry::new(
    "spectrum detector",
    &["PosPeak", "NegPeak", "AverageVRMS", "Sample"],
);

/// Spectrum traces.
pub const SPECTRUM_TRACES: Registry =
    Registry::new("spectrum trace", &["Trace1", "Trace2", "Trace3"]);

/// Spectrum vertical units.
pub const SPECTRUM_VERTICAL_UNITS: Registry = Registry::new(
    "spectrum vertical unit",
    &["dBm", "Watt", "Volt", "Amp", "dBmV"],
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        assert_eq!(IQ_OUTPUT_DESTINATIONS.encode("FILE_SIQ_SPLIT").unwrap(), 3);
        assert_eq!(IQ_OUTPUT_DATATYPES.decode(2), Some("INT16"));
        assert_eq!(IQ_OUTPUT_DATATYPES.decode(4), None);
    }

    #[test]
    fn test_every_name_round_trips() {
        for registry in [
            IQ_OUTPUT_DESTINATIONS,
            IQ_OUTPUT_DATATYPES,
            SPECTRUM_WINDOWS,
            SPECTRUM_DETECTORS,
            TRIGGER_TRANSITIONS,
        ] {
            for (index, name) in registry.names().iter().enumerate() {
                assert_eq!(registry.encode(name).unwrap(), index);
            }
        }
    }

    #[test]
    fn test_unknown_name() {
        let err = SPECTRUM_WINDOWS.encode("Hamming").unwrap_err();
        match err {
            RsaError::InvalidSetting {
                domain,
                value,
                expected,
            } => {
                assert_eq!(domain, "spectrum window");
                assert_eq!(value, "Hamming");
                assert!(expected.contains("BlackmanHarris"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_case_sensitivity() {
        assert!(IQ_OUTPUT_DESTINATIONS.encode("client").is_err());
        assert_eq!(TRIGGER_MODES.encode("freeRun").unwrap(), 0);
        assert_eq!(TRIGGER_MODES.encode("Triggered").unwrap(), 1);
    }
}
