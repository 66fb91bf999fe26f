//! Simulated RSA spectrum analyzer.
//!
//! Implements [`DeviceSession`] in-process. Bandwidth selection follows the
//! instrument's ladder exactly; IQ data comes from an [`IqPattern`] indexed
//! by absolute sample number, so results do not depend on block sizes.
//!
//! Tests keep a clone of the analyzer (clones share state) to program its
//! behavior while a client drives it:
//!
//! - block sizes per pull ([`SimulatedAnalyzer::set_block_size`])
//! - status words per block and per file
//! - readiness stalls and held data ([`SimulatedAnalyzer::hold_data`])
//! - sample-rate overrides and raw file payloads
//!
//! Every native call is recorded in a call log for ordering assertions.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use rsa_core::registry::{TRIGGER_MODES, TRIGGER_SOURCES, TRIGGER_TRANSITIONS};
use rsa_core::{
    BandwidthEntry, BandwidthTable, DataType, Destination, DeviceSession, DiskFileInfo,
    DiskWriteStatus, FilenameSuffix, IqBlock, Result, ReturnStatus, RsaError, SampleBuffer,
};
use tokio::sync::watch;

use crate::common::{ErrorConfig, MockMode, MockRng, TimingConfig};
use crate::disk::{self, SiqHeader};
use crate::pattern::IqPattern;

/// Largest client buffer the device accepts, in sample pairs.
pub const MAX_BUFFER_SIZE: usize = 1_000_000;

/// INT16 samples are scaled so that 1.0 maps to this value.
pub const INT16_FULL_SCALE: f32 = 16_384.0;

/// INT32 samples are scaled so that 1.0 maps to this value.
pub const INT32_FULL_SCALE: f32 = 1_073_741_824.0;

const REFERENCE_LEVEL_RANGE: (f64, f64) = (-130.0, 30.0);
const TRIGGER_LEVEL_RANGE: (f64, f64) = (-130.0, 30.0);
const TRIGGER_POSITION_RANGE: (f64, f64) = (1.0, 99.0);
const INSTANT_WRITE_POLLS: u32 = 2;

/// Trigger settings as last programmed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerSettings {
    /// Mode code
    pub mode: i32,
    /// Source code
    pub source: i32,
    /// Transition code
    pub transition: i32,
    /// IF power level in dBm
    pub if_power_level_dbm: f64,
    /// Position in percent of the record
    pub position_percent: f64,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            mode: 0,
            source: 0,
            transition: 0,
            if_power_level_dbm: -20.0,
            position_percent: 10.0,
        }
    }
}

#[derive(Debug)]
struct AnalyzerState {
    connected: Option<i32>,
    running: bool,
    streaming: bool,
    prepared: bool,

    center_frequency_hz: f64,
    reference_level_dbm: f64,
    requested_bandwidth_hz: f64,
    destination: Destination,
    datatype: DataType,
    buffer_request: usize,
    filename_base: String,
    suffix: FilenameSuffix,
    file_length_ms: u32,
    trigger: TriggerSettings,

    // Current run
    sample_cursor: u64,
    sticky: u32,
    write_polls: u32,
    stream_started: Option<(Instant, DateTime<Local>)>,
    file_info: Option<DiskFileInfo>,

    // Programmed behavior
    block_size: Option<usize>,
    status_script: VecDeque<u32>,
    file_status: u32,
    sample_rate_override: Option<f64>,
    file_payload: Option<Vec<f32>>,
    ready_timeouts: usize,

    // Statistics
    calls: Vec<&'static str>,
    timeouts_reported: usize,
    blocks_delivered: usize,
}

impl AnalyzerState {
    fn new(table: &BandwidthTable) -> Self {
        Self {
            connected: None,
            running: false,
            streaming: false,
            prepared: false,
            center_frequency_hz: 1.0e9,
            reference_level_dbm: 0.0,
            requested_bandwidth_hz: table.max_bandwidth(),
            destination: Destination::Client,
            datatype: DataType::Single,
            buffer_request: 0,
            filename_base: String::new(),
            suffix: FilenameSuffix::None,
            file_length_ms: 0,
            trigger: TriggerSettings::default(),
            sample_cursor: 0,
            sticky: 0,
            write_polls: 0,
            stream_started: None,
            file_info: None,
            block_size: None,
            status_script: VecDeque::new(),
            file_status: 0,
            sample_rate_override: None,
            file_payload: None,
            ready_timeouts: 0,
            calls: Vec::new(),
            timeouts_reported: 0,
            blocks_delivered: 0,
        }
    }
}

struct Inner {
    state: Mutex<AnalyzerState>,
    table: BandwidthTable,
    center_frequency_bounds: (f64, f64),
    pattern: IqPattern,
    noise_amplitude: f32,
    mode: MockMode,
    timing: TimingConfig,
    errors: ErrorConfig,
    rng: MockRng,
    hold: watch::Sender<bool>,
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`SimulatedAnalyzer`]
pub struct SimulatedAnalyzerBuilder {
    mode: MockMode,
    timing: TimingConfig,
    errors: ErrorConfig,
    table: BandwidthTable,
    center_frequency_bounds: (f64, f64),
    pattern: IqPattern,
    noise_amplitude: f32,
    seed: Option<u64>,
    block_size: Option<usize>,
    sample_rate_override: Option<f64>,
}

impl SimulatedAnalyzerBuilder {
    fn new() -> Self {
        Self {
            mode: MockMode::Instant,
            timing: TimingConfig::default(),
            errors: ErrorConfig::none(),
            table: BandwidthTable::rsa_family(),
            center_frequency_bounds: (9.0e3, 6.2e9),
            pattern: IqPattern::default(),
            noise_amplitude: 0.0,
            seed: None,
            block_size: None,
            sample_rate_override: None,
        }
    }

    /// Operational mode
    pub fn mode(mut self, mode: MockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Timing used in realistic mode
    pub fn timing_config(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Injected native errors
    pub fn error_config(mut self, errors: ErrorConfig) -> Self {
        self.errors = errors;
        self
    }

    /// Bandwidth ladder (defaults to the RSA family table)
    pub fn bandwidth_table(mut self, table: BandwidthTable) -> Self {
        self.table = table;
        self
    }

    /// Center frequency limits in Hz
    pub fn center_frequency_bounds(mut self, min: f64, max: f64) -> Self {
        self.center_frequency_bounds = (min, max);
        self
    }

    /// Generated signal
    pub fn pattern(mut self, pattern: IqPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Additive uniform noise with a seeded generator
    pub fn noise(mut self, amplitude: f32, seed: Option<u64>) -> Self {
        self.noise_amplitude = amplitude.max(0.0);
        self.seed = seed;
        self
    }

    /// Pairs delivered per pull (defaults to the configured buffer size)
    pub fn block_size(mut self, pairs: usize) -> Self {
        self.block_size = Some(pairs);
        self
    }

    /// Report this sample rate instead of the ladder's
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate_override = Some(sample_rate);
        self
    }

    /// Build the analyzer
    pub fn build(self) -> SimulatedAnalyzer {
        let mut state = AnalyzerState::new(&self.table);
        state.block_size = self.block_size;
        state.sample_rate_override = self.sample_rate_override;
        let (hold, _) = watch::channel(false);
        SimulatedAnalyzer {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                table: self.table,
                center_frequency_bounds: self.center_frequency_bounds,
                pattern: self.pattern,
                noise_amplitude: self.noise_amplitude,
                mode: self.mode,
                timing: self.timing,
                errors: self.errors,
                rng: MockRng::new(self.seed),
                hold,
            }),
        }
    }
}

// =============================================================================
// SimulatedAnalyzer
// =============================================================================

/// In-process stand-in for an RSA instrument.
#[derive(Clone)]
pub struct SimulatedAnalyzer {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SimulatedAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedAnalyzer")
            .field("mode", &self.inner.mode)
            .field("pattern", &self.inner.pattern)
            .finish_non_exhaustive()
    }
}

impl Default for SimulatedAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedAnalyzer {
    /// Instant-mode analyzer with the RSA family bandwidth ladder.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Builder for advanced configuration
    pub fn builder() -> SimulatedAnalyzerBuilder {
        SimulatedAnalyzerBuilder::new()
    }

    // -------------------------------------------------------------------------
    // Programming (test side)
    // -------------------------------------------------------------------------

    /// Pairs delivered per pull; `None` fills the whole buffer.
    pub fn set_block_size(&self, pairs: Option<usize>) {
        self.inner.state.lock().block_size = pairs;
    }

    /// Status words for the next pulled blocks, in order.
    pub fn push_status_words(&self, words: impl IntoIterator<Item = u32>) {
        self.inner.state.lock().status_script.extend(words);
    }

    /// Status word reported for the next finished file.
    pub fn set_file_status(&self, word: u32) {
        self.inner.state.lock().file_status = word;
    }

    /// Report `sample_rate` instead of the ladder's rate.
    pub fn set_sample_rate_override(&self, sample_rate: Option<f64>) {
        self.inner.state.lock().sample_rate_override = sample_rate;
    }

    /// Raw interleaved values written to the next data file.
    pub fn set_file_payload(&self, values: Option<Vec<f32>>) {
        self.inner.state.lock().file_payload = values;
    }

    /// Report `count` readiness timeouts before delivering data.
    pub fn stall_readiness(&self, count: usize) {
        self.inner.state.lock().ready_timeouts = count;
    }

    /// Withhold data: readiness waits time out until [`release_data`](Self::release_data).
    pub fn hold_data(&self) {
        self.inner.hold.send_replace(true);
    }

    /// Resume delivering data.
    pub fn release_data(&self) {
        self.inner.hold.send_replace(false);
    }

    // -------------------------------------------------------------------------
    // Inspection (test side)
    // -------------------------------------------------------------------------

    /// Native calls in the order they were issued.
    pub fn calls(&self) -> Vec<&'static str> {
        self.inner.state.lock().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.inner.state.lock().calls.clear();
    }

    /// Readiness waits that ended in a timeout.
    pub fn timeouts_reported(&self) -> usize {
        self.inner.state.lock().timeouts_reported
    }

    /// Blocks delivered since creation.
    pub fn blocks_delivered(&self) -> usize {
        self.inner.state.lock().blocks_delivered
    }

    /// Last requested acquisition bandwidth.
    pub fn requested_bandwidth(&self) -> f64 {
        self.inner.state.lock().requested_bandwidth_hz
    }

    /// Current center frequency.
    pub fn center_frequency(&self) -> f64 {
        self.inner.state.lock().center_frequency_hz
    }

    /// Current reference level.
    pub fn reference_level(&self) -> f64 {
        self.inner.state.lock().reference_level_dbm
    }

    /// Current output destination and datatype.
    pub fn output_config(&self) -> (Destination, DataType) {
        let state = self.inner.state.lock();
        (state.destination, state.datatype)
    }

    /// Current filename base, suffix control and file length.
    pub fn file_settings(&self) -> (String, FilenameSuffix, u32) {
        let state = self.inner.state.lock();
        (state.filename_base.clone(), state.suffix, state.file_length_ms)
    }

    /// Last programmed trigger settings.
    pub fn trigger_settings(&self) -> TriggerSettings {
        self.inner.state.lock().trigger
    }

    /// Whether the device is in the run state.
    pub fn running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// Whether the acquisition hardware was prepared since the last stop.
    pub fn prepared(&self) -> bool {
        self.inner.state.lock().prepared
    }

    /// Whether IQ streaming is enabled.
    pub fn streaming(&self) -> bool {
        self.inner.state.lock().streaming
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Record the call, enforce connection and injected errors, apply latency.
    async fn enter(&self, operation: &'static str) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            state.calls.push(operation);
            if operation != "DEVICE_Connect" && state.connected.is_none() {
                return Err(RsaError::DeviceCall {
                    operation,
                    status: ReturnStatus::ErrorNotConnected,
                });
            }
        }
        self.inner.errors.check_operation(operation)?;
        if self.inner.mode.is_paced() && self.inner.timing.command_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.inner.timing.command_delay_ms)).await;
        }
        Ok(())
    }

    fn resolved(&self, state: &AnalyzerState) -> Result<BandwidthEntry> {
        self.inner.table.resolve(state.requested_bandwidth_hz)
    }

    fn sample_rate(&self, state: &AnalyzerState) -> Result<f64> {
        match state.sample_rate_override {
            Some(rate) => Ok(rate),
            None => Ok(self.resolved(state)?.sample_rate),
        }
    }

    fn configured_buffer_size(&self, state: &AnalyzerState) -> Result<usize> {
        if state.buffer_request == 0 {
            Ok(self.resolved(state)?.default_buffer_size)
        } else {
            Ok(state.buffer_request)
        }
    }

    fn reject_while_running(state: &AnalyzerState, operation: &'static str) -> Result<()> {
        if state.running || state.streaming {
            return Err(RsaError::DeviceCall {
                operation,
                status: ReturnStatus::ErrorStreamingOperationNotSupported,
            });
        }
        Ok(())
    }

    fn check_range(operation: &'static str, value: f64, (min, max): (f64, f64)) -> Result<()> {
        if value.is_finite() && min <= value && value <= max {
            Ok(())
        } else {
            Err(RsaError::DeviceCall {
                operation,
                status: ReturnStatus::ErrorParameter,
            })
        }
    }

    fn check_code(operation: &'static str, code: i32, count: usize) -> Result<()> {
        match usize::try_from(code) {
            Ok(index) if index < count => Ok(()),
            _ => Err(RsaError::DeviceCall {
                operation,
                status: ReturnStatus::ErrorParameter,
            }),
        }
    }

    /// Write the capture files for the current run.
    fn finalize_file(&self, state: &mut AnalyzerState) -> Result<()> {
        if state.file_info.is_some() {
            return Ok(());
        }
        let sample_rate = self.sample_rate(state)?;
        let bandwidth_hz = self.resolved(state)?.output_bandwidth;
        let (started_at, started) = state
            .stream_started
            .unwrap_or_else(|| (Instant::now(), Local::now()));

        let length_ms = if state.file_length_ms > 0 {
            f64::from(state.file_length_ms)
        } else {
            started_at.elapsed().as_secs_f64() * 1e3
        };
        let pairs = (length_ms * sample_rate / 1e3) as usize;
        let values = state
            .file_payload
            .take()
            .unwrap_or_else(|| self.inner.pattern.interleaved(0, pairs, sample_rate));

        let full_scale = match state.datatype {
            DataType::Int16 => INT16_FULL_SCALE,
            _ => INT32_FULL_SCALE,
        };
        let data = disk::encode(&values, state.datatype, full_scale);
        let acq_status = state.file_status | state.sticky;
        let header = SiqHeader {
            number_samples: (values.len() / 2) as u64,
            sample_rate,
            bandwidth_hz,
            center_frequency_hz: state.center_frequency_hz,
            reference_level_dbm: state.reference_level_dbm,
            datatype: state.datatype,
            acq_status,
            started,
        };
        let suffix = disk::next_suffix(&mut state.suffix, Local::now());
        let stem = format!("{}{}", state.filename_base, suffix);

        let filenames = disk::write_capture(state.destination, &stem, &header, &data)
            .map_err(|e| {
                tracing::warn!(path = %stem, error = %e, "SimulatedAnalyzer: file write failed");
                RsaError::DeviceCall {
                    operation: "IQSTREAM_GetDiskFileWriteStatus",
                    status: ReturnStatus::ErrorIqStreamFileOpenFailed,
                }
            })?;
        tracing::debug!(?filenames, pairs = header.number_samples, "SimulatedAnalyzer: file written");

        state.file_info = Some(DiskFileInfo {
            number_samples: header.number_samples,
            sample0_timestamp: started.timestamp_nanos_opt().unwrap_or(0).max(0) as u64,
            trigger_sample_index: 0,
            trigger_timestamp: 0,
            acq_status,
            filenames,
        });
        Ok(())
    }

    fn fill(&self, block: &mut IqBlock, start: u64, pairs: usize, sample_rate: f64) {
        let mut values = self.inner.pattern.interleaved(start, pairs, sample_rate);
        if self.inner.noise_amplitude > 0.0 {
            for v in values.iter_mut() {
                *v += self.inner.rng.noise(self.inner.noise_amplitude);
            }
        }
        let scale_factor = match block.data_mut() {
            SampleBuffer::Single(buf) => {
                buf[..values.len()].copy_from_slice(&values);
                1.0
            }
            SampleBuffer::Int32(buf) => {
                for (dst, src) in buf.iter_mut().zip(&values) {
                    *dst = (src * INT32_FULL_SCALE).round() as i32;
                }
                1.0 / f64::from(INT32_FULL_SCALE)
            }
            SampleBuffer::Int16(buf) => {
                for (dst, src) in buf.iter_mut().zip(&values) {
                    *dst = (src * INT16_FULL_SCALE).round() as i16;
                }
                1.0 / f64::from(INT16_FULL_SCALE)
            }
        };
        block.set_len(pairs);
        block.scale_factor = scale_factor;
    }
}

#[async_trait]
impl DeviceSession for SimulatedAnalyzer {
    async fn connect(&self, device_id: i32) -> Result<()> {
        self.enter("DEVICE_Connect").await?;
        self.inner.state.lock().connected = Some(device_id);
        tracing::info!(device_id, "SimulatedAnalyzer: connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.enter("DEVICE_Disconnect").await?;
        let mut state = self.inner.state.lock();
        state.connected = None;
        state.running = false;
        state.streaming = false;
        tracing::info!("SimulatedAnalyzer: disconnected");
        Ok(())
    }

    async fn run(&self) -> Result<()> {
        self.enter("DEVICE_Run").await?;
        self.inner.state.lock().running = true;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.enter("DEVICE_Stop").await?;
        let mut state = self.inner.state.lock();
        state.running = false;
        state.prepared = false;
        Ok(())
    }

    async fn is_running(&self) -> Result<bool> {
        self.enter("DEVICE_GetEnable").await?;
        Ok(self.inner.state.lock().running)
    }

    async fn prepare_for_run(&self) -> Result<()> {
        self.enter("DEVICE_PrepareForRun").await?;
        self.inner.state.lock().prepared = true;
        Ok(())
    }

    async fn center_frequency_bounds(&self) -> Result<(f64, f64)> {
        self.enter("CONFIG_GetMinMaxCenterFreq").await?;
        Ok(self.inner.center_frequency_bounds)
    }

    async fn set_center_frequency(&self, hz: f64) -> Result<()> {
        self.enter("CONFIG_SetCenterFreq").await?;
        Self::check_range("CONFIG_SetCenterFreq", hz, self.inner.center_frequency_bounds)?;
        self.inner.state.lock().center_frequency_hz = hz;
        Ok(())
    }

    async fn set_reference_level(&self, dbm: f64) -> Result<()> {
        self.enter("CONFIG_SetReferenceLevel").await?;
        Self::check_range("CONFIG_SetReferenceLevel", dbm, REFERENCE_LEVEL_RANGE)?;
        self.inner.state.lock().reference_level_dbm = dbm;
        Ok(())
    }

    async fn acq_bandwidth_bounds(&self) -> Result<(f64, f64)> {
        self.enter("IQSTREAM_GetMinMaxAcqBandwidth").await?;
        Ok((self.inner.table.min_bandwidth(), self.inner.table.max_bandwidth()))
    }

    async fn set_acq_bandwidth(&self, hz: f64) -> Result<()> {
        self.enter("IQSTREAM_SetAcqBandwidth").await?;
        let mut state = self.inner.state.lock();
        Self::reject_while_running(&state, "IQSTREAM_SetAcqBandwidth")?;
        let bounds = (self.inner.table.min_bandwidth(), self.inner.table.max_bandwidth());
        if Self::check_range("IQSTREAM_SetAcqBandwidth", hz, bounds).is_err() {
            return Err(RsaError::DeviceCall {
                operation: "IQSTREAM_SetAcqBandwidth",
                status: ReturnStatus::ErrorIqStreamBandwidthOutOfRange,
            });
        }
        state.requested_bandwidth_hz = hz;
        tracing::debug!(bandwidth_hz = hz, "SimulatedAnalyzer: acquisition bandwidth set");
        Ok(())
    }

    async fn acq_parameters(&self) -> Result<(f64, f64)> {
        self.enter("IQSTREAM_GetAcqParameters").await?;
        let state = self.inner.state.lock();
        let entry = self.resolved(&state)?;
        Ok((entry.output_bandwidth, self.sample_rate(&state)?))
    }

    async fn set_output_config(&self, destination: i32, datatype: i32) -> Result<()> {
        self.enter("IQSTREAM_SetOutputConfiguration").await?;
        let mut state = self.inner.state.lock();
        Self::reject_while_running(&state, "IQSTREAM_SetOutputConfiguration")?;
        let invalid = || RsaError::DeviceCall {
            operation: "IQSTREAM_SetOutputConfiguration",
            status: ReturnStatus::ErrorParameter,
        };
        let destination = Destination::from_code(destination).ok_or_else(invalid)?;
        let datatype = DataType::from_code(datatype).ok_or_else(invalid)?;
        if destination == Destination::FileTiq && datatype.is_float() {
            return Err(RsaError::DeviceCall {
                operation: "IQSTREAM_SetOutputConfiguration",
                status: ReturnStatus::ErrorIqStreamInvalidFileDataType,
            });
        }
        state.destination = destination;
        state.datatype = datatype;
        Ok(())
    }

    async fn set_buffer_size_request(&self, pairs: usize) -> Result<()> {
        self.enter("IQSTREAM_SetIQDataBufferSize").await?;
        let mut state = self.inner.state.lock();
        Self::reject_while_running(&state, "IQSTREAM_SetIQDataBufferSize")?;
        state.buffer_request = pairs.min(MAX_BUFFER_SIZE);
        Ok(())
    }

    async fn buffer_size(&self) -> Result<usize> {
        self.enter("IQSTREAM_GetIQDataBufferSize").await?;
        let state = self.inner.state.lock();
        self.configured_buffer_size(&state)
    }

    async fn clear_sticky_status(&self) -> Result<()> {
        self.enter("IQSTREAM_ClearAcqStatus").await?;
        self.inner.state.lock().sticky = 0;
        Ok(())
    }

    async fn set_disk_filename_base(&self, path: &str) -> Result<()> {
        self.enter("IQSTREAM_SetDiskFilenameBase").await?;
        self.inner.state.lock().filename_base = path.to_string();
        Ok(())
    }

    async fn set_disk_filename_suffix(&self, control: i32) -> Result<()> {
        self.enter("IQSTREAM_SetDiskFilenameSuffix").await?;
        let suffix = FilenameSuffix::from_control(i64::from(control)).map_err(|_| {
            RsaError::DeviceCall {
                operation: "IQSTREAM_SetDiskFilenameSuffix",
                status: ReturnStatus::ErrorParameter,
            }
        })?;
        self.inner.state.lock().suffix = suffix;
        Ok(())
    }

    async fn set_disk_file_length(&self, msec: u32) -> Result<()> {
        self.enter("IQSTREAM_SetDiskFileLength").await?;
        self.inner.state.lock().file_length_ms = msec;
        Ok(())
    }

    async fn start_streaming(&self) -> Result<()> {
        self.enter("IQSTREAM_Start").await?;
        let mut state = self.inner.state.lock();
        if !state.running {
            return Err(RsaError::DeviceCall {
                operation: "IQSTREAM_Start",
                status: ReturnStatus::ErrorStreamingOperationNotSupported,
            });
        }
        state.streaming = true;
        state.sample_cursor = 0;
        state.write_polls = 0;
        state.file_info = None;
        state.stream_started = Some((Instant::now(), Local::now()));
        tracing::debug!(destination = %state.destination, "SimulatedAnalyzer: streaming started");
        Ok(())
    }

    async fn stop_streaming(&self) -> Result<()> {
        self.enter("IQSTREAM_Stop").await?;
        let mut state = self.inner.state.lock();
        if state.streaming && state.destination.is_file() {
            self.finalize_file(&mut state)?;
        }
        state.streaming = false;
        Ok(())
    }

    async fn is_streaming(&self) -> Result<bool> {
        self.enter("IQSTREAM_GetEnable").await?;
        Ok(self.inner.state.lock().streaming)
    }

    async fn wait_for_data_ready(&self, timeout_ms: u32) -> Result<bool> {
        self.enter("IQSTREAM_WaitForIQDataReady").await?;
        let stalled = {
            let mut state = self.inner.state.lock();
            if !state.streaming {
                return Err(RsaError::DeviceCall {
                    operation: "IQSTREAM_WaitForIQDataReady",
                    status: ReturnStatus::ErrorStreamingOperationNotSupported,
                });
            }
            if state.ready_timeouts > 0 {
                state.ready_timeouts -= 1;
                state.timeouts_reported += 1;
                true
            } else {
                false
            }
        };
        let timeout = Duration::from_millis(u64::from(timeout_ms));
        if stalled {
            if self.inner.mode.is_paced() {
                tokio::time::sleep(timeout).await;
            }
            return Ok(false);
        }

        if *self.inner.hold.borrow() {
            let mut rx = self.inner.hold.subscribe();
            let released = tokio::time::timeout(timeout, rx.wait_for(|held| !*held))
                .await
                .is_ok();
            if !released {
                self.inner.state.lock().timeouts_reported += 1;
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn pull_block(&self, block: &mut IqBlock) -> Result<()> {
        self.enter("IQSTREAM_GetIQData").await?;
        let (start, pairs, sample_rate) = {
            let mut state = self.inner.state.lock();
            if !state.streaming {
                return Err(RsaError::DeviceCall {
                    operation: "IQSTREAM_GetIQData",
                    status: ReturnStatus::ErrorStreamingOperationNotSupported,
                });
            }
            let configured = self.configured_buffer_size(&state)?;
            let pairs = state
                .block_size
                .unwrap_or(configured)
                .min(configured)
                .min(block.capacity());
            let injected = state.status_script.pop_front().unwrap_or(0);
            state.sticky |= injected & 0xFFFF_0000;
            block.acq_status = (injected & 0x0000_FFFF) | state.sticky;

            let start = state.sample_cursor;
            state.sample_cursor += pairs as u64;
            state.blocks_delivered += 1;
            (start, pairs, self.sample_rate(&state)?)
        };

        self.fill(block, start, pairs, sample_rate);
        tracing::trace!(start, pairs, status = block.acq_status, "SimulatedAnalyzer: block delivered");

        if self.inner.mode.is_paced() {
            tokio::time::sleep(self.inner.timing.block_delay(pairs, sample_rate)).await;
        }
        Ok(())
    }

    async fn disk_write_status(&self) -> Result<DiskWriteStatus> {
        self.enter("IQSTREAM_GetDiskFileWriteStatus").await?;
        let mut state = self.inner.state.lock();
        if !state.destination.is_file() || state.stream_started.is_none() {
            return Ok(DiskWriteStatus::default());
        }
        if state.file_info.is_some() {
            return Ok(DiskWriteStatus {
                is_complete: true,
                is_writing: false,
            });
        }
        if !state.streaming {
            return Ok(DiskWriteStatus::default());
        }

        state.write_polls += 1;
        let complete = state.file_length_ms > 0
            && match self.inner.mode {
                MockMode::Instant => state.write_polls >= INSTANT_WRITE_POLLS,
                MockMode::Realistic => state.stream_started.is_some_and(|(at, _)| {
                    at.elapsed()
                        >= Duration::from_millis(
                            u64::from(state.file_length_ms) + self.inner.timing.file_close_ms,
                        )
                }),
            };
        if complete {
            self.finalize_file(&mut state)?;
        }
        Ok(DiskWriteStatus {
            is_complete: complete,
            is_writing: !complete,
        })
    }

    async fn disk_file_info(&self) -> Result<DiskFileInfo> {
        self.enter("IQSTREAM_GetDiskFileInfo").await?;
        self.inner
            .state
            .lock()
            .file_info
            .clone()
            .ok_or(RsaError::DeviceCall {
                operation: "IQSTREAM_GetDiskFileInfo",
                status: ReturnStatus::ErrorDataNotReady,
            })
    }

    async fn set_trigger_mode(&self, mode: i32) -> Result<()> {
        self.enter("TRIG_SetTriggerMode").await?;
        Self::check_code("TRIG_SetTriggerMode", mode, TRIGGER_MODES.names().len())?;
        self.inner.state.lock().trigger.mode = mode;
        Ok(())
    }

    async fn set_trigger_source(&self, source: i32) -> Result<()> {
        self.enter("TRIG_SetTriggerSource").await?;
        Self::check_code("TRIG_SetTriggerSource", source, TRIGGER_SOURCES.names().len())?;
        self.inner.state.lock().trigger.source = source;
        Ok(())
    }

    async fn set_trigger_transition(&self, transition: i32) -> Result<()> {
        self.enter("TRIG_SetTriggerTransition").await?;
        Self::check_code(
            "TRIG_SetTriggerTransition",
            transition,
            TRIGGER_TRANSITIONS.names().len(),
        )?;
        self.inner.state.lock().trigger.transition = transition;
        Ok(())
    }

    async fn set_if_power_trigger_level(&self, dbm: f64) -> Result<()> {
        self.enter("TRIG_SetIFPowerTriggerLevel").await?;
        Self::check_range("TRIG_SetIFPowerTriggerLevel", dbm, TRIGGER_LEVEL_RANGE)?;
        self.inner.state.lock().trigger.if_power_level_dbm = dbm;
        Ok(())
    }

    async fn set_trigger_position_percent(&self, percent: f64) -> Result<()> {
        self.enter("TRIG_SetTriggerPositionPercent").await?;
        Self::check_range("TRIG_SetTriggerPositionPercent", percent, TRIGGER_POSITION_RANGE)?;
        self.inner.state.lock().trigger.position_percent = percent;
        Ok(())
    }
}
