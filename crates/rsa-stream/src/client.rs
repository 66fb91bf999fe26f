//! IQ streaming client.
//!
//! [`IqStreamClient`] owns one [`DeviceSession`] and serializes every call
//! to it. Captures hold the session for their whole run; while a run is
//! `Running` or `Draining`, configuration and control calls fail fast with
//! [`RsaError::DeviceBusy`] instead of waiting.
//!
//! [`RsaError::DeviceBusy`]: rsa_core::RsaError::DeviceBusy

use parking_lot::Mutex;
use rsa_core::{
    AcquisitionConfiguration, BandwidthTable, DataType, Destination, DeviceSession,
    FilenameSuffix, IqCapture, ResolvedParameters, Result, StatusMode, StatusReport,
};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tracing::{debug, info, instrument};

use crate::cancel::CancelHandle;
use crate::config::StreamSettings;
use crate::configuration::{self, StreamPlan, Tuning};
use crate::engine::{self, DrainOptions};
use crate::file_capture::{self, FileOptions};
use crate::state::{StateCell, StreamState};
use crate::trigger::{self, TriggerConfig};

/// Validated, serialized access to one instrument's IQ stream.
pub struct IqStreamClient<S> {
    session: S,
    gate: AsyncMutex<()>,
    state: StateCell,
    table: BandwidthTable,
    settings: StreamSettings,
    configuration: Mutex<Option<AcquisitionConfiguration>>,
    resolved: Mutex<Option<ResolvedParameters>>,
}

impl<S> std::fmt::Debug for IqStreamClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IqStreamClient")
            .field("state", &self.state.get())
            .field("configuration", &*self.configuration.lock())
            .finish_non_exhaustive()
    }
}

impl<S: DeviceSession> IqStreamClient<S> {
    /// Client with default settings.
    pub fn new(session: S) -> Self {
        Self::with_settings(session, StreamSettings::default())
    }

    /// Client with explicit settings.
    pub fn with_settings(session: S, settings: StreamSettings) -> Self {
        Self {
            session,
            gate: AsyncMutex::new(()),
            state: StateCell::default(),
            table: BandwidthTable::rsa_family(),
            settings,
            configuration: Mutex::new(None),
            resolved: Mutex::new(None),
        }
    }

    /// Replace the bandwidth table used to validate and cross-check requests.
    pub fn with_bandwidth_table(mut self, table: BandwidthTable) -> Self {
        self.table = table;
        self
    }

    /// The wrapped session.
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Active settings.
    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Bandwidth table in use.
    pub fn bandwidth_table(&self) -> &BandwidthTable {
        &self.table
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state.get()
    }

    /// Parameters from the last successful configuration.
    pub fn resolved(&self) -> Option<ResolvedParameters> {
        *self.resolved.lock()
    }

    /// Take the session for a device-state-changing call.
    async fn acquire(&self, operation: &'static str) -> Result<MutexGuard<'_, ()>> {
        self.state.ensure_idle(operation)?;
        Ok(self.gate.lock().await)
    }

    // =========================================================================
    // Device session
    // =========================================================================

    /// Connect to the configured device.
    pub async fn connect(&self) -> Result<()> {
        let _session = self.acquire("connect").await?;
        self.session.connect(self.settings.device_id).await?;
        info!(device_id = self.settings.device_id, "Connected");
        Ok(())
    }

    /// Stop the device and disconnect.
    pub async fn disconnect(&self) -> Result<()> {
        let _session = self.acquire("disconnect").await?;
        self.session.stop().await?;
        self.session.disconnect().await?;
        self.state.set(StreamState::Idle);
        *self.resolved.lock() = None;
        info!("Disconnected");
        Ok(())
    }

    // =========================================================================
    // Stream configuration
    // =========================================================================

    /// Apply a full acquisition configuration and report what the device set.
    ///
    /// Leaves the client `Configured`: sticky status cleared and the device
    /// prepared for a run.
    #[instrument(skip(self, config), fields(bandwidth_hz = config.bandwidth_hz), err)]
    pub async fn configure_stream(
        &self,
        config: AcquisitionConfiguration,
    ) -> Result<ResolvedParameters> {
        let _session = self.acquire("configure stream").await?;
        let plan = StreamPlan {
            bandwidth_hz: Some(config.bandwidth_hz),
            destination: config.destination,
            datatype: config.datatype,
            buffer_request: Some(config.buffer_size),
            file: None,
        };
        self.state.set(StreamState::Idle);
        let resolved = configuration::apply_plan(&self.session, &self.table, &plan).await?;
        *self.configuration.lock() = Some(config);
        *self.resolved.lock() = Some(resolved);
        self.state.set(StreamState::Configured);
        Ok(resolved)
    }

    /// Set output destination and datatype by vendor name.
    pub async fn set_output_configuration(&self, destination: &str, datatype: &str) -> Result<()> {
        let (destination, datatype) =
            configuration::parse_output_configuration(destination, datatype)?;
        self.set_output(destination, datatype).await
    }

    /// Set output destination and datatype.
    pub async fn set_output(&self, destination: Destination, datatype: DataType) -> Result<()> {
        rsa_core::types::check_output_pair(destination, datatype)?;
        let _session = self.acquire("set output configuration").await?;
        configuration::output_configuration(&self.session, destination, datatype).await?;
        self.update_configuration(|config| {
            config.destination = destination;
            config.datatype = datatype;
        });
        self.state.set(StreamState::Idle);
        Ok(())
    }

    /// Request an acquisition bandwidth.
    ///
    /// Cycles the device: stop, set, run.
    pub async fn set_acquisition_bandwidth(&self, hz: f64) -> Result<()> {
        let _session = self.acquire("set acquisition bandwidth").await?;
        configuration::acquisition_bandwidth(&self.session, &self.table, hz, true).await?;
        let mut configuration = self.configuration.lock();
        match configuration.as_mut() {
            Some(config) => config.bandwidth_hz = hz,
            None => {
                *configuration = Some(
                    AcquisitionConfiguration::client(hz)
                        .with_buffer_size(self.settings.client_buffer_request),
                )
            }
        }
        drop(configuration);
        self.state.set(StreamState::Idle);
        Ok(())
    }

    /// Request a client buffer size; 0 selects the device default.
    ///
    /// Returns the size the device actually applied.
    pub async fn set_buffer_size(&self, pairs: usize) -> Result<usize> {
        let _session = self.acquire("set buffer size").await?;
        let actual = configuration::buffer_size(&self.session, pairs).await?;
        self.update_configuration(|config| config.buffer_size = pairs);
        self.state.set(StreamState::Idle);
        Ok(actual)
    }

    /// Bound file captures to `msec`; 0 runs until stopped.
    pub async fn set_disk_file_length(&self, msec: u32) -> Result<()> {
        let _session = self.acquire("set disk file length").await?;
        self.session.set_disk_file_length(msec).await
    }

    /// Set the output file base path.
    pub async fn set_filename_base(&self, path: &str) -> Result<()> {
        let _session = self.acquire("set filename base").await?;
        configuration::filename_base(&self.session, path).await
    }

    /// Set the file suffix control: -2 none, -1 timestamp, >= 0 index.
    pub async fn set_filename_suffix(&self, control: i64) -> Result<()> {
        let suffix = FilenameSuffix::from_control(control)?;
        let _session = self.acquire("set filename suffix").await?;
        configuration::filename_suffix(&self.session, suffix).await
    }

    /// Set the center frequency within the device limits.
    pub async fn set_center_frequency(&self, hz: f64) -> Result<()> {
        let _session = self.acquire("set center frequency").await?;
        configuration::center_frequency(&self.session, hz).await
    }

    /// Set the reference level in dBm.
    pub async fn set_reference_level(&self, dbm: f64) -> Result<()> {
        let _session = self.acquire("set reference level").await?;
        configuration::reference_level(&self.session, dbm).await
    }

    /// Apply a trigger setup.
    pub async fn set_trigger(&self, trigger: &TriggerConfig) -> Result<()> {
        trigger.validate()?;
        let _session = self.acquire("set trigger").await?;
        trigger::apply(&self.session, trigger).await
    }

    /// Output rate a capture at `bandwidth_hz` will run at, before the
    /// device is asked. Unknown bandwidths assume the fastest entry.
    fn expected_sample_rate(&self, bandwidth_hz: Option<f64>) -> f64 {
        bandwidth_hz
            .and_then(|hz| self.table.resolve(hz).ok())
            .map(|entry| entry.sample_rate)
            .unwrap_or_else(|| {
                self.table
                    .entries()
                    .iter()
                    .map(|entry| entry.sample_rate)
                    .fold(0.0, f64::max)
            })
    }

    fn update_configuration(&self, update: impl FnOnce(&mut AcquisitionConfiguration)) {
        if let Some(config) = self.configuration.lock().as_mut() {
            update(config);
        }
    }

    // =========================================================================
    // Acquisition
    // =========================================================================

    /// Capture `duration_ms` of IQ into memory.
    ///
    /// In strict mode a non-empty acquisition status fails with
    /// [`RsaError::StreamingFault`] after the full transfer, carrying the data.
    ///
    /// [`RsaError::StreamingFault`]: rsa_core::RsaError::StreamingFault
    pub async fn capture_to_memory(&self, duration_ms: u32, strict: bool) -> Result<IqCapture> {
        self.memory_capture(duration_ms, strict, None).await
    }

    /// [`capture_to_memory`](Self::capture_to_memory) that stops early when
    /// `cancel` fires, returning the partial capture in
    /// [`RsaError::Incomplete`](rsa_core::RsaError::Incomplete).
    pub async fn capture_to_memory_with(
        &self,
        duration_ms: u32,
        strict: bool,
        cancel: &CancelHandle,
    ) -> Result<IqCapture> {
        self.memory_capture(duration_ms, strict, Some(cancel)).await
    }

    #[instrument(skip(self, cancel), err)]
    async fn memory_capture(
        &self,
        duration_ms: u32,
        strict: bool,
        cancel: Option<&CancelHandle>,
    ) -> Result<IqCapture> {
        check_duration(duration_ms)?;
        let _session = self.acquire("capture to memory").await?;
        let guard = self.state.run_guard();

        let stored = self.configuration.lock().clone();
        let plan = match &stored {
            Some(config) => {
                if config.destination != Destination::Client {
                    debug!(
                        destination = %config.destination,
                        "Memory capture overrides destination"
                    );
                }
                StreamPlan {
                    bandwidth_hz: Some(config.bandwidth_hz),
                    destination: Destination::Client,
                    datatype: config.datatype,
                    buffer_request: Some(config.buffer_size),
                    file: None,
                }
            }
            None => StreamPlan {
                bandwidth_hz: None,
                destination: Destination::Client,
                datatype: DataType::Single,
                buffer_request: Some(self.settings.client_buffer_request),
                file: None,
            },
        };

        rsa_core::capture_samples(duration_ms, self.expected_sample_rate(plan.bandwidth_hz))?;
        let params = configuration::apply_plan(&self.session, &self.table, &plan).await?;
        *self.resolved.lock() = Some(params);
        guard.advance(StreamState::Configured);

        let options = DrainOptions {
            mode: StatusMode::from_strict(strict),
            stall_deadline: self.settings.stall_deadline(),
            cancel,
        };
        engine::capture_to_memory(&self.session, &params, duration_ms, &guard, options).await
    }

    /// Capture `duration_ms` of IQ through a temporary split SIQ file named
    /// `file_name`, without changing the front-end tuning.
    pub async fn capture_to_file(
        &self,
        duration_ms: u32,
        file_name: &str,
        strict: bool,
    ) -> Result<IqCapture> {
        self.file_capture(None, duration_ms, file_name, strict).await
    }

    /// Tune center frequency, reference level and bandwidth, then
    /// [`capture_to_file`](Self::capture_to_file).
    pub async fn capture_to_file_configured(
        &self,
        tuning: &Tuning,
        duration_ms: u32,
        file_name: &str,
        strict: bool,
    ) -> Result<IqCapture> {
        self.file_capture(Some(tuning), duration_ms, file_name, strict)
            .await
    }

    #[instrument(skip(self, tuning), err)]
    async fn file_capture(
        &self,
        tuning: Option<&Tuning>,
        duration_ms: u32,
        file_name: &str,
        strict: bool,
    ) -> Result<IqCapture> {
        check_duration(duration_ms)?;
        file_capture::check_file_name(file_name)?;
        let bandwidth_hz = match tuning {
            Some(tuning) => Some(tuning.bandwidth_hz),
            None => self
                .configuration
                .lock()
                .as_ref()
                .map(|config| config.bandwidth_hz),
        };
        rsa_core::capture_samples(duration_ms, self.expected_sample_rate(bandwidth_hz))?;
        let _session = self.acquire("capture to file").await?;
        let guard = self.state.run_guard();

        let options = FileOptions {
            mode: StatusMode::from_strict(strict),
            poll_interval: self.settings.file_poll_interval(),
            stall_deadline: self.settings.stall_deadline(),
        };
        let capture = file_capture::capture_via_file(
            &self.session,
            &self.table,
            tuning,
            duration_ms,
            file_name,
            &guard,
            options,
        )
        .await;

        // The file path reprograms destination and tuning.
        *self.resolved.lock() = None;
        if let Some(tuning) = tuning {
            self.update_configuration(|config| config.bandwidth_hz = tuning.bandwidth_hz);
        }
        capture
    }

    /// Decode an acquisition status word.
    ///
    /// In strict mode any condition fails with a streaming fault.
    pub fn decode_status(&self, word: u32, strict: bool) -> Result<StatusReport> {
        rsa_core::decode_status(word, StatusMode::from_strict(strict))
    }
}

fn check_duration(duration_ms: u32) -> Result<()> {
    rsa_core::validation::check_range_i64(i64::from(duration_ms), 1, i64::from(u32::MAX))
        .map(|_| ())
        .map_err(|e| rsa_core::RsaError::validation("capture duration", e))
}
