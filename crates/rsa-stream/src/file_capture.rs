//! File round-trip capture.
//!
//! Streams a bounded-length split SIQ file into a scoped temporary
//! directory, waits for the device to finish writing, reads the raw
//! `.siqd` samples back and deinterleaves them. The directory is removed on
//! every exit path.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rsa_core::iq::{deinterleave, f32_from_le_bytes};
use rsa_core::validation::{check_path, check_range_i64};
use rsa_core::{
    BandwidthTable, CaptureError, DataType, Destination, DeviceSession, FilenameSuffix,
    IncompleteReason, IqCapture, Result, RsaError, StatusMode, StatusReport,
};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::configuration::{self, FileOutput, StreamPlan, Tuning};
use crate::engine::{self, Outcome};
use crate::state::{RunGuard, StreamState};

/// Extension of the raw sample file in a split SIQ capture.
pub const DATA_FILE_EXTENSION: &str = "siqd";

/// Per-run options for a file capture.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FileOptions {
    pub mode: StatusMode,
    pub poll_interval: Duration,
    pub stall_deadline: Option<Duration>,
}

/// Check a bare file name for the scoped capture directory.
pub(crate) fn check_file_name(name: &str) -> Result<()> {
    check_path(name).map_err(|e| RsaError::validation("capture filename", e))?;
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(RsaError::InvalidConfiguration {
            message: format!("capture filename '{name}' must not contain a directory"),
        });
    }
    Ok(())
}

/// Capture `duration_ms` of IQ through a temporary split SIQ file.
pub(crate) async fn capture_via_file<S: DeviceSession + ?Sized>(
    session: &S,
    table: &BandwidthTable,
    tuning: Option<&Tuning>,
    duration_ms: u32,
    file_name: &str,
    guard: &RunGuard,
    options: FileOptions,
) -> Result<IqCapture> {
    check_range_i64(i64::from(duration_ms), 1, i64::from(u32::MAX))
        .map_err(|e| RsaError::validation("capture duration", e))?;
    check_file_name(file_name)?;

    let dir = tempfile::Builder::new()
        .prefix("rsa-iq-")
        .tempdir()
        .map_err(CaptureError::TempDir)?;
    let base_path = dir.path().join(file_name);
    let base = base_path
        .to_str()
        .ok_or_else(|| CaptureError::NonUtf8Path {
            path: base_path.clone(),
        })?
        .to_string();

    let result = run(session, table, tuning, duration_ms, &base, guard, options).await;

    let dir_path = dir.path().to_path_buf();
    if let Err(err) = dir.close() {
        warn!(dir = %dir_path.display(), error = %err, "Failed to remove capture directory");
    }
    result
}

async fn run<S: DeviceSession + ?Sized>(
    session: &S,
    table: &BandwidthTable,
    tuning: Option<&Tuning>,
    duration_ms: u32,
    base: &str,
    guard: &RunGuard,
    options: FileOptions,
) -> Result<IqCapture> {
    session.stop().await?;
    if let Some(tuning) = tuning {
        configuration::tune(session, table, tuning).await?;
    }
    let plan = StreamPlan {
        bandwidth_hz: None,
        destination: Destination::FileSiqSplit,
        datatype: DataType::Single,
        buffer_request: None,
        file: Some(FileOutput {
            base,
            suffix: FilenameSuffix::None,
            length_ms: duration_ms,
        }),
    };
    let params = configuration::apply_plan(session, table, &plan).await?;
    guard.advance(StreamState::Configured);

    let written = write_file(session, duration_ms, guard, options).await;
    let (outcome, report) = match written {
        Ok(done) => done,
        Err(err) => {
            if let Err(cleanup) = engine::shutdown(session).await {
                error!(error = %cleanup, "Failed to stop streaming after device error");
            }
            return Err(err);
        }
    };

    let data_path = PathBuf::from(format!("{base}.{DATA_FILE_EXTENSION}"));
    let values = read_samples(&data_path)?;
    let samples = deinterleave(&values);
    let requested = match outcome {
        Outcome::Complete => samples.len(),
        Outcome::Ended(_) => params.samples_for(duration_ms),
    };
    let capture = IqCapture::new(samples, requested, params.sample_rate, report);
    info!(
        samples = capture.len(),
        values = values.len(),
        status = %report,
        "File capture read back"
    );

    match outcome {
        Outcome::Ended(reason) => Err(RsaError::Incomplete {
            reason,
            capture: Box::new(capture),
        }),
        Outcome::Complete => engine::finish(capture, options.mode),
    }
}

/// Run the device until the file is closed; returns the file status.
async fn write_file<S: DeviceSession + ?Sized>(
    session: &S,
    duration_ms: u32,
    guard: &RunGuard,
    options: FileOptions,
) -> Result<(Outcome, StatusReport)> {
    session.run().await?;
    session.start_streaming().await?;
    guard.advance(StreamState::Running);

    let started = Instant::now();
    let give_up = options
        .stall_deadline
        .map(|deadline| Duration::from_millis(u64::from(duration_ms)) + deadline);
    let mut polls = 0u32;

    guard.advance(StreamState::Draining);
    let outcome = loop {
        tokio::time::sleep(options.poll_interval).await;
        polls += 1;
        let status = session.disk_write_status().await?;
        if status.is_complete {
            break Outcome::Complete;
        }
        if give_up.is_some_and(|limit| started.elapsed() >= limit) {
            warn!(polls, "File not closed within stall deadline");
            break Outcome::Ended(IncompleteReason::Stalled);
        }
    };
    debug!(polls, "Disk write finished");

    session.stop_streaming().await?;
    let info = session.disk_file_info().await?;
    let report = StatusReport::decode(info.acq_status);
    session.stop().await?;
    debug!(
        number_samples = info.number_samples,
        files = ?info.filenames,
        status = %report,
        "Disk file info"
    );
    Ok((outcome, report))
}

/// Read a raw little-endian float32 sample file.
pub(crate) fn read_samples(path: &Path) -> Result<Vec<f32>> {
    if !path.exists() {
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        return Err(CaptureError::MissingDataFile { dir }.into());
    }
    let bytes = fs::read(path).map_err(|source| CaptureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let values = f32_from_le_bytes(&bytes).ok_or_else(|| CaptureError::UnexpectedFileSize {
        path: path.to_path_buf(),
        len: bytes.len() as u64,
    })?;
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_checks() {
        assert!(check_file_name("tempIQ").is_ok());
        assert!(matches!(
            check_file_name(""),
            Err(RsaError::Validation { .. })
        ));
        assert!(matches!(
            check_file_name("../tempIQ"),
            Err(RsaError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_read_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.siqd");
        let bytes: Vec<u8> = [0.25f32, -0.5, 1.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        fs::write(&path, &bytes).unwrap();
        assert_eq!(read_samples(&path).unwrap(), vec![0.25, -0.5, 1.0]);

        fs::write(&path, &bytes[..6]).unwrap();
        assert!(matches!(
            read_samples(&path),
            Err(RsaError::Capture(CaptureError::UnexpectedFileSize { len: 6, .. }))
        ));
    }

    #[test]
    fn test_missing_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_samples(&dir.path().join("absent.siqd")).unwrap_err();
        assert!(matches!(
            err,
            RsaError::Capture(CaptureError::MissingDataFile { .. })
        ));
    }
}
