//! Streaming acquisition engine.
//!
//! Drains client-destination IQ blocks into a preallocated output buffer.
//! A readiness timeout is a poll interval, not an error: the engine waits
//! again until data arrives, the caller cancels, the optional stall deadline
//! passes, or the device reports an error. Streaming and the device run
//! state are stopped on every exit path before control returns.

use std::time::Duration;

use rsa_core::{
    Complex32, DeviceSession, IncompleteReason, IqBlock, IqCapture, ResolvedParameters, Result,
    RsaError, StatusMode, StatusReport,
};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::cancel::CancelHandle;
use crate::state::{RunGuard, StreamState};

/// Per-run options for a memory capture.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DrainOptions<'a> {
    pub mode: StatusMode,
    pub stall_deadline: Option<Duration>,
    pub cancel: Option<&'a CancelHandle>,
}

/// How a run ended when no device error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Complete,
    Ended(IncompleteReason),
}

struct Drained {
    outcome: Outcome,
    filled: usize,
    status_word: u32,
    timeouts: usize,
}

/// Run one capture into memory.
///
/// The device must already be `Configured` with `params`.
pub(crate) async fn capture_to_memory<S: DeviceSession + ?Sized>(
    session: &S,
    params: &ResolvedParameters,
    duration_ms: u32,
    guard: &RunGuard,
    options: DrainOptions<'_>,
) -> Result<IqCapture> {
    let required = params.checked_samples_for(duration_ms)?;
    let mut samples = Vec::new();
    samples
        .try_reserve_exact(required)
        .map_err(|e| RsaError::InvalidConfiguration {
            message: format!("cannot hold {required} samples in memory: {e}"),
        })?;
    samples.resize(required, Complex32::default());
    let mut block = IqBlock::with_capacity(params.datatype, params.buffer_size);

    let drained = start_and_drain(session, params, guard, &mut block, &mut samples, options).await;
    let stopped = shutdown(session).await;

    let drained = match drained {
        Ok(drained) => drained,
        Err(err) => {
            if let Err(cleanup) = stopped {
                error!(error = %cleanup, "Failed to stop streaming after device error");
            }
            return Err(err);
        }
    };
    stopped?;

    samples.truncate(drained.filled);
    let report = StatusReport::decode(drained.status_word);
    let capture = IqCapture::new(samples, required, params.sample_rate, report);
    info!(
        samples = capture.len(),
        requested = required,
        timeouts = drained.timeouts,
        status = %report,
        "Memory capture finished"
    );

    match drained.outcome {
        Outcome::Ended(reason) => {
            warn!(%reason, collected = capture.len(), requested = required, "Capture ended early");
            Err(RsaError::Incomplete {
                reason,
                capture: Box::new(capture),
            })
        }
        Outcome::Complete => finish(capture, options.mode),
    }
}

async fn start_and_drain<S: DeviceSession + ?Sized>(
    session: &S,
    params: &ResolvedParameters,
    guard: &RunGuard,
    block: &mut IqBlock,
    out: &mut [Complex32],
    options: DrainOptions<'_>,
) -> Result<Drained> {
    session.run().await?;
    session.start_streaming().await?;
    guard.advance(StreamState::Running);
    debug!(required = out.len(), "Streaming started");

    let timeout_ms = params.ready_timeout_ms();
    let mut filled = 0;
    let mut status_word = 0u32;
    let mut timeouts = 0;
    let mut last_data = Instant::now();

    guard.advance(StreamState::Draining);
    while filled < out.len() {
        let ready = match wait_ready(session, timeout_ms, options.cancel).await? {
            Some(ready) => ready,
            None => {
                return Ok(Drained {
                    outcome: Outcome::Ended(IncompleteReason::Cancelled),
                    filled,
                    status_word,
                    timeouts,
                })
            }
        };

        if ready {
            block.clear();
            session.pull_block(block).await?;
            status_word |= block.acq_status;
            let copied = block.deinterleave_into(&mut out[filled..]);
            filled += copied;
            if copied > 0 {
                last_data = Instant::now();
            }
            trace!(
                pairs = block.len(),
                copied,
                filled,
                status = block.acq_status,
                "Block drained"
            );
            let latest = StatusReport::per_block(block.acq_status);
            if !latest.is_empty() {
                debug!(status = %latest, "Block reported acquisition conditions");
            }
        } else {
            timeouts += 1;
            debug!(timeout_ms, timeouts, "Data not ready, waiting again");
        }

        if let Some(deadline) = options.stall_deadline {
            if filled < out.len() && last_data.elapsed() >= deadline {
                warn!(
                    deadline_ms = deadline.as_millis() as u64,
                    filled, "No data within stall deadline"
                );
                return Ok(Drained {
                    outcome: Outcome::Ended(IncompleteReason::Stalled),
                    filled,
                    status_word,
                    timeouts,
                });
            }
        }
    }

    Ok(Drained {
        outcome: Outcome::Complete,
        filled,
        status_word,
        timeouts,
    })
}

/// Wait for a block; `None` when cancelled first.
async fn wait_ready<S: DeviceSession + ?Sized>(
    session: &S,
    timeout_ms: u32,
    cancel: Option<&CancelHandle>,
) -> Result<Option<bool>> {
    match cancel {
        Some(cancel) if cancel.is_cancelled() => Ok(None),
        Some(cancel) => tokio::select! {
            ready = session.wait_for_data_ready(timeout_ms) => ready.map(Some),
            () = cancel.cancelled() => Ok(None),
        },
        None => session.wait_for_data_ready(timeout_ms).await.map(Some),
    }
}

/// Stop streaming and the device run state.
///
/// Both stops are attempted even if the first fails; the first error wins.
pub(crate) async fn shutdown<S: DeviceSession + ?Sized>(session: &S) -> Result<()> {
    let stream = session.stop_streaming().await;
    let device = session.stop().await;

    match session.is_streaming().await {
        Ok(true) => warn!("Streaming still enabled after stop"),
        Ok(false) => {}
        Err(err) => debug!(error = %err, "Could not query stream enable after stop"),
    }

    stream?;
    device?;
    debug!("Streaming stopped");
    Ok(())
}

/// Apply the caller's status mode to a finished capture.
pub(crate) fn finish(capture: IqCapture, mode: StatusMode) -> Result<IqCapture> {
    let report = capture.status;
    if report.is_empty() {
        return Ok(capture);
    }
    match mode {
        StatusMode::Strict => Err(RsaError::StreamingFault {
            report,
            capture: Some(Box::new(capture)),
        }),
        StatusMode::Observational => {
            warn!(
                status = %report,
                data_lost = report.data_lost(),
                "Acquisition status reported conditions"
            );
            Ok(capture)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(word: u32) -> IqCapture {
        IqCapture::new(vec![Complex32::default(); 4], 4, 1000.0, StatusReport::decode(word))
    }

    #[test]
    fn test_finish_clean() {
        assert_eq!(finish(capture(0), StatusMode::Strict).unwrap().len(), 4);
    }

    #[test]
    fn test_finish_strict_keeps_samples() {
        let err = finish(capture(1 << 21), StatusMode::Strict).unwrap_err();
        assert!(err.is_streaming_fault());
        assert_eq!(err.capture().map(IqCapture::len), Some(4));
    }

    #[test]
    fn test_finish_observational() {
        let capture = finish(capture(1 << 16), StatusMode::Observational).unwrap();
        assert!(!capture.status.is_empty());
    }
}
