//! Error types for IQ streaming operations.
//!
//! One enum covers every failure category the client surfaces. Local checks
//! (validation, settings, configuration, busy state) fail before any device
//! call is issued; device and capture errors abort the current operation;
//! streaming faults are deferred until collected data is safe.

use std::path::PathBuf;

use thiserror::Error;

use crate::iq::IqCapture;
use crate::return_status::ReturnStatus;
use crate::status::StatusReport;
use crate::validation::ValidationError;

/// Result type alias for IQ streaming operations.
pub type Result<T> = std::result::Result<T, RsaError>;

/// Errors that can occur when configuring or running an IQ stream.
#[derive(Error, Debug)]
pub enum RsaError {
    /// Parameter of the wrong type or outside its declared range
    #[error("Invalid {parameter}: {source}")]
    Validation {
        parameter: &'static str,
        #[source]
        source: ValidationError,
    },

    /// Well-typed value that is not one of the known options
    #[error("Unknown {domain} '{value}'. Valid options: {expected}")]
    InvalidSetting {
        domain: &'static str,
        value: String,
        expected: String,
    },

    /// Disallowed combination of otherwise valid settings
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Device-state-changing call attempted while a run is in progress
    #[error("Device busy: cannot {operation} while stream is {state}")]
    DeviceBusy {
        operation: &'static str,
        state: &'static str,
    },

    /// Acquisition status reported a fault (strict mode only)
    ///
    /// For in-memory and file captures the collected data is attached.
    #[error("Streaming fault: {report}")]
    StreamingFault {
        report: StatusReport,
        capture: Option<Box<IqCapture>>,
    },

    /// File round-trip read-back failed
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Native driver call returned a non-success status
    #[error("Device call {operation} failed: {status}")]
    DeviceCall {
        operation: &'static str,
        status: ReturnStatus,
    },

    /// Run ended before the requested amount of data was collected
    #[error("Capture incomplete ({reason}): {} of {} samples", .capture.samples.len(), .capture.requested)]
    Incomplete {
        reason: IncompleteReason,
        capture: Box<IqCapture>,
    },
}

/// Why a run ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncompleteReason {
    /// The caller cancelled the run
    Cancelled,
    /// No data arrived within the stall deadline
    Stalled,
}

impl std::fmt::Display for IncompleteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::Stalled => write!(f, "stalled"),
        }
    }
}

/// File I/O failures during capture read-back.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Could not create the scoped temporary directory
    #[error("Failed to create temporary capture directory: {0}")]
    TempDir(#[source] std::io::Error),

    /// Open or read failure
    #[error("Failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File length is not a whole number of 32-bit samples
    #[error("Unexpected size for '{}': {len} bytes is not a multiple of 4", .path.display())]
    UnexpectedFileSize { path: PathBuf, len: u64 },

    /// The data file the device reported was not found
    #[error("No data file found in {}", .dir.display())]
    MissingDataFile { dir: PathBuf },

    /// Path could not be handed to the device
    #[error("Capture path '{}' is not valid UTF-8", .path.display())]
    NonUtf8Path { path: PathBuf },
}

impl RsaError {
    /// Wrap a validation failure with the parameter it concerns.
    pub fn validation(parameter: &'static str, source: ValidationError) -> Self {
        Self::Validation { parameter, source }
    }

    /// Map a native return status onto `Ok` or [`RsaError::DeviceCall`].
    pub fn check(operation: &'static str, status: ReturnStatus) -> Result<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::DeviceCall { operation, status })
        }
    }

    /// Check if the device was busy with a run.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::DeviceBusy { .. })
    }

    /// Check if this error carries an acquisition status fault.
    pub fn is_streaming_fault(&self) -> bool {
        matches!(self, Self::StreamingFault { .. })
    }

    /// Errors are never retried automatically; the readiness poll is the
    /// only loop that repeats, and it never produces an error.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Collected samples attached to the error, if any.
    pub fn capture(&self) -> Option<&IqCapture> {
        match self {
            Self::StreamingFault { capture, .. } => capture.as_deref(),
            Self::Incomplete { capture, .. } => Some(capture),
            _ => None,
        }
    }

    /// Take ownership of the collected samples attached to the error.
    pub fn into_capture(self) -> Option<IqCapture> {
        match self {
            Self::StreamingFault { capture, .. } => capture.map(|c| *c),
            Self::Incomplete { capture, .. } => Some(*capture),
            _ => None,
        }
    }
}
