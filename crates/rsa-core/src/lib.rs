//! Core types for RSA spectrum-analyzer IQ streaming.
//!
//! This crate holds everything the streaming client and its drivers share:
//!
//! ## Parameters
//! - [`validation`] - type and range guards applied before any device call
//! - [`registry`] - name/code tables for enumerated settings
//! - [`Destination`] / [`DataType`] / [`FilenameSuffix`] - typed stream settings
//!
//! ## Acquisition
//! - [`BandwidthTable`] - bandwidth to sample-rate resolution
//! - [`StatusReport`] - acquisition status word decoding
//! - [`IqBlock`] / [`IqCapture`] - per-poll buffers and finished captures
//!
//! ## Driver boundary
//! - [`DeviceSession`] - what the client needs from the native driver
//! - [`ReturnStatus`] - native return-code catalog
//! - [`RsaError`] - unified error taxonomy

pub mod bandwidth;
pub mod error;
pub mod iq;
pub mod registry;
pub mod return_status;
pub mod session;
pub mod status;
pub mod types;
pub mod validation;

pub use bandwidth::{BandwidthEntry, BandwidthTable};
pub use error::{CaptureError, IncompleteReason, Result, RsaError};
pub use iq::{IqBlock, IqCapture, SampleBuffer};
pub use num_complex::Complex32;
pub use registry::Registry;
pub use return_status::ReturnStatus;
pub use session::DeviceSession;
pub use status::{decode_status, StatusConditions, StatusMode, StatusReport};
pub use types::{
    capture_samples, AcquisitionConfiguration, DataType, Destination, DiskFileInfo, DiskWriteStatus,
    FilenameSuffix, ResolvedParameters, TriggerMode, TriggerSource, TriggerTransition,
    MAX_CAPTURE_SAMPLES,
};
pub use validation::{Param, ValidationError};
