//! Stream configuration manager.
//!
//! Each setter validates locally before any device call is issued, so a
//! rejected value never reaches the instrument. Settings the device only
//! accepts while stopped stop it first; the bandwidth setter performs the
//! full stop/set/run cycle the instrument needs for a new bandwidth to take
//! effect.

use rsa_core::validation::{check_path, check_range};
use rsa_core::{
    BandwidthEntry, BandwidthTable, DataType, Destination, DeviceSession, FilenameSuffix,
    ResolvedParameters, Result, RsaError,
};
use tracing::{debug, info, warn};

/// Reference level limits in dBm.
pub const REFERENCE_LEVEL_RANGE: (f64, f64) = (-130.0, 30.0);

/// Front-end tuning applied before a configured capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    /// Center frequency in Hz
    pub center_frequency_hz: f64,
    /// Reference level in dBm
    pub reference_level_dbm: f64,
    /// Requested acquisition bandwidth in Hz
    pub bandwidth_hz: f64,
}

/// File output controls for disk destinations.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FileOutput<'a> {
    pub base: &'a str,
    pub suffix: FilenameSuffix,
    pub length_ms: u32,
}

/// Everything programmed on the way from `Idle` to `Configured`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StreamPlan<'a> {
    /// `None` keeps the bandwidth already on the device
    pub bandwidth_hz: Option<f64>,
    pub destination: Destination,
    pub datatype: DataType,
    /// `None` leaves the buffer request untouched
    pub buffer_request: Option<usize>,
    pub file: Option<FileOutput<'a>>,
}

/// Parse a destination/datatype name pair.
///
/// Unknown names and disallowed pairs are both configuration errors here.
pub fn parse_output_configuration(
    destination: &str,
    datatype: &str,
) -> Result<(Destination, DataType)> {
    let destination: Destination = destination.parse().map_err(as_configuration_error)?;
    let datatype: DataType = datatype.parse().map_err(as_configuration_error)?;
    rsa_core::types::check_output_pair(destination, datatype)?;
    Ok((destination, datatype))
}

fn as_configuration_error(err: RsaError) -> RsaError {
    match err {
        RsaError::InvalidSetting {
            domain,
            value,
            expected,
        } => RsaError::InvalidConfiguration {
            message: format!("unknown {domain} '{value}' (valid: {expected})"),
        },
        other => other,
    }
}

/// Stop the device if it is running.
pub(crate) async fn ensure_stopped<S: DeviceSession + ?Sized>(session: &S) -> Result<()> {
    if session.is_running().await? {
        session.stop().await?;
        debug!("Stopped device to apply configuration");
    }
    Ok(())
}

pub(crate) async fn output_configuration<S: DeviceSession + ?Sized>(
    session: &S,
    destination: Destination,
    datatype: DataType,
) -> Result<()> {
    rsa_core::types::check_output_pair(destination, datatype)?;
    ensure_stopped(session).await?;
    session
        .set_output_config(destination.code(), datatype.code())
        .await?;
    debug!(%destination, %datatype, "Output configuration set");
    Ok(())
}

/// Check `hz` against the device bounds and return the table entry serving it.
pub(crate) async fn check_bandwidth<S: DeviceSession + ?Sized>(
    session: &S,
    table: &BandwidthTable,
    hz: f64,
) -> Result<BandwidthEntry> {
    let (min, max) = session.acq_bandwidth_bounds().await?;
    check_range(hz, min, max, true)
        .map_err(|e| RsaError::validation("acquisition bandwidth", e))?;
    table.resolve(hz)
}

/// Validate `hz` against the device bounds and the table, then program it.
///
/// With `cycle` the device is returned to the run state afterwards so the
/// new bandwidth takes effect.
pub(crate) async fn acquisition_bandwidth<S: DeviceSession + ?Sized>(
    session: &S,
    table: &BandwidthTable,
    hz: f64,
    cycle: bool,
) -> Result<BandwidthEntry> {
    let expected = check_bandwidth(session, table, hz).await?;

    session.stop().await?;
    session.set_acq_bandwidth(hz).await?;
    if cycle {
        session.run().await?;
    }
    debug!(
        requested_hz = hz,
        output_bandwidth = expected.output_bandwidth,
        sample_rate = expected.sample_rate,
        cycled = cycle,
        "Acquisition bandwidth set"
    );
    Ok(expected)
}

/// Request a client buffer size and return the size actually in effect.
pub(crate) async fn buffer_size<S: DeviceSession + ?Sized>(
    session: &S,
    pairs: usize,
) -> Result<usize> {
    ensure_stopped(session).await?;
    session.set_buffer_size_request(pairs).await?;
    let actual = session.buffer_size().await?;
    if pairs != 0 && actual != pairs {
        debug!(requested = pairs, actual, "Device adjusted buffer size request");
    }
    Ok(actual)
}

pub(crate) async fn filename_base<S: DeviceSession + ?Sized>(
    session: &S,
    path: &str,
) -> Result<()> {
    check_path(path).map_err(|e| RsaError::validation("filename base", e))?;
    session.set_disk_filename_base(path).await
}

pub(crate) async fn filename_suffix<S: DeviceSession + ?Sized>(
    session: &S,
    suffix: FilenameSuffix,
) -> Result<()> {
    session.set_disk_filename_suffix(suffix.control()).await
}

pub(crate) async fn center_frequency<S: DeviceSession + ?Sized>(
    session: &S,
    hz: f64,
) -> Result<()> {
    let (min, max) = session.center_frequency_bounds().await?;
    check_range(hz, min, max, true).map_err(|e| RsaError::validation("center frequency", e))?;
    session.set_center_frequency(hz).await?;
    debug!(center_frequency_hz = hz, "Center frequency set");
    Ok(())
}

pub(crate) async fn reference_level<S: DeviceSession + ?Sized>(
    session: &S,
    dbm: f64,
) -> Result<()> {
    let (min, max) = REFERENCE_LEVEL_RANGE;
    check_range(dbm, min, max, true).map_err(|e| RsaError::validation("reference level", e))?;
    session.set_reference_level(dbm).await?;
    debug!(reference_level_dbm = dbm, "Reference level set");
    Ok(())
}

/// Apply center frequency, reference level and bandwidth.
pub(crate) async fn tune<S: DeviceSession + ?Sized>(
    session: &S,
    table: &BandwidthTable,
    tuning: &Tuning,
) -> Result<()> {
    // Check everything before touching the device.
    check_range(
        tuning.reference_level_dbm,
        REFERENCE_LEVEL_RANGE.0,
        REFERENCE_LEVEL_RANGE.1,
        true,
    )
    .map_err(|e| RsaError::validation("reference level", e))?;
    table.resolve(tuning.bandwidth_hz)?;

    center_frequency(session, tuning.center_frequency_hz).await?;
    reference_level(session, tuning.reference_level_dbm).await?;
    acquisition_bandwidth(session, table, tuning.bandwidth_hz, false).await?;
    Ok(())
}

/// Take the device from `Idle` to `Configured` and report what it applied.
///
/// Order: stop, output configuration, buffer request, bandwidth, file
/// controls, clear sticky status, prepare for run.
pub(crate) async fn apply_plan<S: DeviceSession + ?Sized>(
    session: &S,
    table: &BandwidthTable,
    plan: &StreamPlan<'_>,
) -> Result<ResolvedParameters> {
    rsa_core::types::check_output_pair(plan.destination, plan.datatype)?;
    if let Some(file) = &plan.file {
        check_path(file.base).map_err(|e| RsaError::validation("filename base", e))?;
    }
    if let Some(hz) = plan.bandwidth_hz {
        check_bandwidth(session, table, hz).await?;
    }

    session.stop().await?;
    session
        .set_output_config(plan.destination.code(), plan.datatype.code())
        .await?;
    if let Some(pairs) = plan.buffer_request {
        session.set_buffer_size_request(pairs).await?;
    }
    if let Some(hz) = plan.bandwidth_hz {
        session.set_acq_bandwidth(hz).await?;
        debug!(requested_hz = hz, "Acquisition bandwidth set");
    }
    if let Some(file) = &plan.file {
        session.set_disk_filename_base(file.base).await?;
        session.set_disk_filename_suffix(file.suffix.control()).await?;
        session.set_disk_file_length(file.length_ms).await?;
    }
    session.clear_sticky_status().await?;
    session.prepare_for_run().await?;

    let resolved = resolve(session, table, plan.destination, plan.datatype).await?;
    info!(
        bandwidth_hz = resolved.bandwidth_hz,
        sample_rate = resolved.sample_rate,
        buffer_size = resolved.buffer_size,
        destination = %resolved.destination,
        datatype = %resolved.datatype,
        "Stream configured"
    );
    Ok(resolved)
}

/// Read back the parameters in effect. The device answer is authoritative.
pub(crate) async fn resolve<S: DeviceSession + ?Sized>(
    session: &S,
    table: &BandwidthTable,
    destination: Destination,
    datatype: DataType,
) -> Result<ResolvedParameters> {
    let buffer_size = session.buffer_size().await?;
    let (bandwidth_hz, sample_rate) = session.acq_parameters().await?;

    match table.lookup(bandwidth_hz) {
        Some(entry) if entry.sample_rate != sample_rate => warn!(
            bandwidth_hz,
            device_sample_rate = sample_rate,
            table_sample_rate = entry.sample_rate,
            "Device sample rate differs from bandwidth table; using device value"
        ),
        None => warn!(
            bandwidth_hz,
            "Device bandwidth is not in the bandwidth table; using device value"
        ),
        _ => {}
    }
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(RsaError::InvalidConfiguration {
            message: format!("device reported sample rate {sample_rate}"),
        });
    }
    if buffer_size == 0 {
        return Err(RsaError::InvalidConfiguration {
            message: "device reported an empty client buffer".to_string(),
        });
    }

    Ok(ResolvedParameters {
        bandwidth_hz,
        sample_rate,
        buffer_size,
        destination,
        datatype,
    })
}
