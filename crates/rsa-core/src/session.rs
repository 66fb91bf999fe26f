//! Device session boundary.
//!
//! [`DeviceSession`] is the surface the streaming client needs from the
//! native driver. Implementations wrap the vendor library (or simulate it)
//! and translate non-success return codes into [`RsaError::DeviceCall`].
//! Codes for destinations, datatypes and trigger settings are passed as the
//! native integers produced by the registries.
//!
//! Methods take `&self`; implementations use interior mutability, and the
//! streaming client serializes access so a session only ever sees one caller.
//!
//! [`RsaError::DeviceCall`]: crate::error::RsaError::DeviceCall

use async_trait::async_trait;

use crate::error::Result;
use crate::iq::IqBlock;
use crate::types::{DiskFileInfo, DiskWriteStatus};

/// Native measurement session for one connected instrument.
#[async_trait]
pub trait DeviceSession: Send + Sync {
    // Device control

    /// Connect to the device with the given id.
    async fn connect(&self, device_id: i32) -> Result<()>;

    /// Disconnect from the device.
    async fn disconnect(&self) -> Result<()>;

    /// Enter the run state.
    async fn run(&self) -> Result<()>;

    /// Leave the run state.
    async fn stop(&self) -> Result<()>;

    /// Whether the device is in the run state.
    async fn is_running(&self) -> Result<bool>;

    /// Prepare acquisition hardware without starting it.
    async fn prepare_for_run(&self) -> Result<()>;

    // Tuning

    /// Center frequency limits `(min, max)` in Hz.
    async fn center_frequency_bounds(&self) -> Result<(f64, f64)>;

    /// Set the center frequency in Hz.
    async fn set_center_frequency(&self, hz: f64) -> Result<()>;

    /// Set the reference level in dBm.
    async fn set_reference_level(&self, dbm: f64) -> Result<()>;

    // IQ streaming configuration

    /// Acquisition bandwidth limits `(min, max)` in Hz.
    async fn acq_bandwidth_bounds(&self) -> Result<(f64, f64)>;

    /// Request an acquisition bandwidth in Hz.
    async fn set_acq_bandwidth(&self, hz: f64) -> Result<()>;

    /// Actual `(bandwidth_hz, sample_rate)` in effect.
    async fn acq_parameters(&self) -> Result<(f64, f64)>;

    /// Set output destination and datatype codes.
    async fn set_output_config(&self, destination: i32, datatype: i32) -> Result<()>;

    /// Request a client buffer size in sample pairs; 0 selects the default.
    async fn set_buffer_size_request(&self, pairs: usize) -> Result<()>;

    /// Client buffer size in effect, in sample pairs.
    async fn buffer_size(&self) -> Result<usize>;

    /// Clear the sticky acquisition status bits.
    async fn clear_sticky_status(&self) -> Result<()>;

    /// Set the output file base path.
    async fn set_disk_filename_base(&self, path: &str) -> Result<()>;

    /// Set the output file suffix control.
    async fn set_disk_filename_suffix(&self, control: i32) -> Result<()>;

    /// Set the output file length in ms; 0 is unbounded.
    async fn set_disk_file_length(&self, msec: u32) -> Result<()>;

    // IQ streaming

    /// Start IQ streaming.
    async fn start_streaming(&self) -> Result<()>;

    /// Stop IQ streaming.
    async fn stop_streaming(&self) -> Result<()>;

    /// Whether IQ streaming is enabled.
    async fn is_streaming(&self) -> Result<bool>;

    /// Wait up to `timeout_ms` for a block; `false` on timeout.
    async fn wait_for_data_ready(&self, timeout_ms: u32) -> Result<bool>;

    /// Fill `block` with the next available data.
    ///
    /// Sets the block length (at most its capacity) and status word.
    async fn pull_block(&self, block: &mut IqBlock) -> Result<()>;

    /// Disk write progress.
    async fn disk_write_status(&self) -> Result<DiskWriteStatus>;

    /// File-level information for the finished disk capture.
    async fn disk_file_info(&self) -> Result<DiskFileInfo>;

    // Triggering

    /// Set the trigger mode code.
    async fn set_trigger_mode(&self, mode: i32) -> Result<()>;

    /// Set the trigger source code.
    async fn set_trigger_source(&self, source: i32) -> Result<()>;

    /// Set the trigger transition code.
    async fn set_trigger_transition(&self, transition: i32) -> Result<()>;

    /// Set the IF power trigger level in dBm.
    async fn set_if_power_trigger_level(&self, dbm: f64) -> Result<()>;

    /// Set the trigger position as a percent of the record.
    async fn set_trigger_position_percent(&self, percent: f64) -> Result<()>;
}
