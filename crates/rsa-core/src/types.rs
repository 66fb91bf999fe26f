//! Stream configuration value types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RsaError};
use crate::registry::{
    Registry, IQ_OUTPUT_DATATYPES, IQ_OUTPUT_DESTINATIONS, TRIGGER_MODES, TRIGGER_SOURCES,
    TRIGGER_TRANSITIONS,
};
use crate::validation::{check_range_i64, ValidationError};

/// Where streamed IQ data is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Destination {
    /// Client memory via block pulls
    #[default]
    Client,
    /// TIQ file
    FileTiq,
    /// SIQ file with header and data combined
    FileSiq,
    /// SIQ header and data in separate `.siqh`/`.siqd` files
    FileSiqSplit,
}

/// Sample datatype of streamed IQ data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    /// 32-bit float
    #[default]
    Single,
    /// 32-bit integer
    Int32,
    /// 16-bit integer
    Int16,
    /// 32-bit float scaled to the INT32 range
    SingleScaleInt32,
}

macro_rules! registry_enum {
    ($ty:ty, $registry:expr, [$($variant:ident),+]) => {
        impl $ty {
            const ALL: &'static [$ty] = &[$(<$ty>::$variant),+];

            /// Backing name/code table.
            pub fn registry() -> Registry {
                $registry
            }

            /// Native integer code.
            pub fn code(self) -> i32 {
                Self::ALL.iter().position(|v| *v == self).unwrap_or(0) as i32
            }

            /// Vendor setting name.
            pub fn name(self) -> &'static str {
                $registry.decode(self.code() as usize).unwrap_or("")
            }

            /// Variant for a native code.
            pub fn from_code(code: i32) -> Option<Self> {
                usize::try_from(code).ok().and_then(|i| Self::ALL.get(i).copied())
            }
        }

        impl FromStr for $ty {
            type Err = RsaError;

            fn from_str(s: &str) -> Result<Self> {
                let index = $registry.encode(s)?;
                Ok(Self::ALL[index])
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

registry_enum!(
    Destination,
    IQ_OUTPUT_DESTINATIONS,
    [Client, FileTiq, FileSiq, FileSiqSplit]
);
registry_enum!(
    DataType,
    IQ_OUTPUT_DATATYPES,
    [Single, Int32, Int16, SingleScaleInt32]
);

impl Destination {
    /// True for the file destinations.
    pub fn is_file(self) -> bool {
        !matches!(self, Self::Client)
    }
}

impl DataType {
    /// True for the floating-point variants.
    pub fn is_float(self) -> bool {
        matches!(self, Self::Single | Self::SingleScaleInt32)
    }

    /// Bytes per I or Q value.
    pub fn sample_width(self) -> usize {
        match self {
            Self::Int16 => 2,
            _ => 4,
        }
    }
}

/// Reject destination/datatype pairs the device cannot write.
pub fn check_output_pair(destination: Destination, datatype: DataType) -> Result<()> {
    if destination == Destination::FileTiq && datatype.is_float() {
        return Err(RsaError::InvalidConfiguration {
            message: format!("{destination} output does not support {datatype} data"),
        });
    }
    Ok(())
}

/// Output file naming suffix control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum FilenameSuffix {
    /// No suffix
    #[default]
    None,
    /// Timestamp-derived suffix
    Timestamp,
    /// Five-digit auto-incrementing index starting at the given value
    Index(u32),
}

impl FilenameSuffix {
    /// Native control value (-2, -1, or the start index).
    pub fn control(self) -> i32 {
        match self {
            Self::None => -2,
            Self::Timestamp => -1,
            Self::Index(start) => i32::try_from(start).unwrap_or(i32::MAX),
        }
    }

    /// Parse a native control value.
    pub fn from_control(control: i64) -> Result<Self> {
        match control {
            -2 => Ok(Self::None),
            -1 => Ok(Self::Timestamp),
            n => check_range_i64(n, -2, i64::from(i32::MAX))
                .map(|index| Self::Index(index as u32))
                .map_err(|e| RsaError::validation("filename suffix control", e)),
        }
    }
}

impl From<FilenameSuffix> for i32 {
    fn from(value: FilenameSuffix) -> Self {
        value.control()
    }
}

impl TryFrom<i32> for FilenameSuffix {
    type Error = RsaError;

    fn try_from(value: i32) -> Result<Self> {
        Self::from_control(i64::from(value))
    }
}

/// Requested stream setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfiguration {
    /// Requested acquisition bandwidth in Hz.
    pub bandwidth_hz: f64,
    /// Output destination.
    #[serde(default)]
    pub destination: Destination,
    /// Output sample datatype.
    #[serde(default)]
    pub datatype: DataType,
    /// Client buffer size request in sample pairs; 0 selects the device default.
    #[serde(default)]
    pub buffer_size: usize,
}

impl AcquisitionConfiguration {
    /// Client/SINGLE configuration at `bandwidth_hz` with the device default buffer.
    pub fn client(bandwidth_hz: f64) -> Self {
        Self {
            bandwidth_hz,
            destination: Destination::Client,
            datatype: DataType::Single,
            buffer_size: 0,
        }
    }

    /// Set the output pair.
    pub fn with_output(mut self, destination: Destination, datatype: DataType) -> Self {
        self.destination = destination;
        self.datatype = datatype;
        self
    }

    /// Set the buffer size request.
    pub fn with_buffer_size(mut self, pairs: usize) -> Self {
        self.buffer_size = pairs;
        self
    }
}

/// Largest capture held in memory, in sample pairs (2 GiB of `Complex32`).
pub const MAX_CAPTURE_SAMPLES: usize = 1 << 28;

/// Sample pairs needed for `duration_ms` at `sample_rate` (truncated).
///
/// Durations whose capture would exceed [`MAX_CAPTURE_SAMPLES`] are refused
/// with the longest duration that fits at this rate.
pub fn capture_samples(duration_ms: u32, sample_rate: f64) -> Result<usize> {
    let samples = f64::from(duration_ms) * sample_rate / 1000.0;
    let limit = MAX_CAPTURE_SAMPLES as f64;
    if samples > limit {
        return Err(RsaError::validation(
            "capture duration",
            ValidationError::OutOfRange {
                value: f64::from(duration_ms),
                min: 1.0,
                max: (limit * 1000.0 / sample_rate).floor(),
                inclusive: true,
            },
        ));
    }
    Ok(samples as usize)
}

/// Parameters in effect after the device has applied a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedParameters {
    /// Actual acquisition bandwidth in Hz.
    pub bandwidth_hz: f64,
    /// Actual output sample rate in samples/s.
    pub sample_rate: f64,
    /// Actual client buffer size in sample pairs.
    pub buffer_size: usize,
    /// Output destination.
    pub destination: Destination,
    /// Output sample datatype.
    pub datatype: DataType,
}

impl ResolvedParameters {
    /// Readiness wait for one buffer: twice the buffer fill time, in ms.
    pub fn ready_timeout_ms(&self) -> u32 {
        let fill_ms = (self.buffer_size as f64 / self.sample_rate * 1e3).round();
        (fill_ms * 2.0).clamp(1.0, f64::from(u32::MAX)) as u32
    }

    /// Samples covering `duration_ms` at the output rate (truncated).
    pub fn samples_for(&self, duration_ms: u32) -> usize {
        (f64::from(duration_ms) * self.sample_rate / 1000.0) as usize
    }

    /// [`samples_for`](Self::samples_for), refused above
    /// [`MAX_CAPTURE_SAMPLES`].
    pub fn checked_samples_for(&self, duration_ms: u32) -> Result<usize> {
        capture_samples(duration_ms, self.sample_rate)
    }
}

/// Disk write progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiskWriteStatus {
    /// The bounded-length file is finished.
    pub is_complete: bool,
    /// Data is currently being written.
    pub is_writing: bool,
}

/// File-level acquisition information for a finished disk capture.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiskFileInfo {
    /// IQ sample pairs written.
    pub number_samples: u64,
    /// Timestamp of the first sample.
    pub sample0_timestamp: u64,
    /// Sample index of the trigger event.
    pub trigger_sample_index: u64,
    /// Timestamp of the trigger event.
    pub trigger_timestamp: u64,
    /// Acquisition status word for the whole file.
    pub acq_status: u32,
    /// Files written by the capture.
    pub filenames: Vec<String>,
}

/// Trigger mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Acquire continuously
    #[default]
    FreeRun,
    /// Wait for a trigger event
    Triggered,
}

/// Trigger event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TriggerSource {
    /// Rear-panel trigger input
    #[default]
    External,
    /// Internal IF power level
    #[serde(rename = "IFPowerLevel")]
    IfPowerLevel,
}

/// Trigger edge detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TriggerTransition {
    /// Low to high
    #[default]
    #[serde(rename = "LH")]
    LowHigh,
    /// High to low
    #[serde(rename = "HL")]
    HighLow,
    /// Either edge
    Either,
}

registry_enum!(TriggerMode, TRIGGER_MODES, [FreeRun, Triggered]);
registry_enum!(TriggerSource, TRIGGER_SOURCES, [External, IfPowerLevel]);
registry_enum!(
    TriggerTransition,
    TRIGGER_TRANSITIONS,
    [LowHigh, HighLow, Either]
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_registry() {
        assert_eq!(Destination::FileSiqSplit.code(), 3);
        assert_eq!(Destination::FileTiq.name(), "FILE_TIQ");
        assert_eq!(DataType::Int16.code(), 2);
        assert_eq!(DataType::from_code(3), Some(DataType::SingleScaleInt32));
        assert_eq!(DataType::from_code(4), None);
        assert_eq!(DataType::from_code(-1), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("CLIENT".parse::<Destination>().unwrap(), Destination::Client);
        assert_eq!("INT32".parse::<DataType>().unwrap(), DataType::Int32);
        assert!(matches!(
            "FILE".parse::<Destination>(),
            Err(RsaError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn test_output_pair() {
        for datatype in [DataType::Single, DataType::SingleScaleInt32] {
            assert!(matches!(
                check_output_pair(Destination::FileTiq, datatype),
                Err(RsaError::InvalidConfiguration { .. })
            ));
        }
        for datatype in [DataType::Int32, DataType::Int16] {
            assert!(check_output_pair(Destination::FileTiq, datatype).is_ok());
        }
        assert!(check_output_pair(Destination::FileSiq, DataType::Single).is_ok());
    }

    #[test]
    fn test_suffix_control() {
        assert_eq!(FilenameSuffix::None.control(), -2);
        assert_eq!(FilenameSuffix::Timestamp.control(), -1);
        assert_eq!(FilenameSuffix::Index(7).control(), 7);
        assert_eq!(FilenameSuffix::from_control(0).unwrap(), FilenameSuffix::Index(0));
        assert!(FilenameSuffix::from_control(-3).is_err());
    }

    #[test]
    fn test_ready_timeout() {
        let params = ResolvedParameters {
            bandwidth_hz: 40e6,
            sample_rate: 56e6,
            buffer_size: 1_000_000,
            destination: Destination::Client,
            datatype: DataType::Single,
        };
        // 1e6 / 56e6 s = 17.86 ms -> 18 ms, doubled
        assert_eq!(params.ready_timeout_ms(), 36);
        assert_eq!(params.samples_for(1), 56_000);
    }

    #[test]
    fn test_capture_samples_limit() {
        assert_eq!(capture_samples(1000, 56e6).unwrap(), 56_000_000);

        let err = capture_samples(u32::MAX, 56e6).unwrap_err();
        assert!(matches!(err, RsaError::Validation { .. }));
        // 2^28 pairs at 56 MSa/s is a little under 4.8 s
        let err = capture_samples(4_794, 56e6).unwrap_err();
        assert!(err.to_string().contains("4793"));
        assert!(capture_samples(4_793, 56e6).is_ok());
    }

    #[test]
    fn test_configuration_from_json() {
        let config: AcquisitionConfiguration = serde_json::from_str(
            r#"{"bandwidth_hz": 5e6, "destination": "FILE_SIQ_SPLIT", "datatype": "INT16"}"#,
        )
        .unwrap();
        assert_eq!(config.destination, Destination::FileSiqSplit);
        assert_eq!(config.datatype, DataType::Int16);
        assert_eq!(config.buffer_size, 0);

        let suffix: FilenameSuffix = serde_json::from_str("-1").unwrap();
        assert_eq!(suffix, FilenameSuffix::Timestamp);
    }

    #[test]
    fn test_samples_truncate() {
        let params = ResolvedParameters {
            bandwidth_hz: 9765.625,
            sample_rate: 13671.875,
            buffer_size: 256,
            destination: Destination::Client,
            datatype: DataType::Single,
        };
        // 10 ms at 13671.875 Sa/s = 136.71875
        assert_eq!(params.samples_for(10), 136);
    }

    #[test]
    fn test_trigger_names() {
        assert_eq!("FreeRun".parse::<TriggerMode>().unwrap(), TriggerMode::FreeRun);
        assert_eq!(TriggerMode::Triggered.code(), 1);
        assert_eq!(TriggerSource::IfPowerLevel.name(), "IFPowerLevel");
        assert_eq!("HL".parse::<TriggerTransition>().unwrap(), TriggerTransition::HighLow);
        assert!("hl".parse::<TriggerTransition>().is_err());
    }
}
