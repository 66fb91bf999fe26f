//! Trigger configuration.

use rsa_core::validation::check_range;
use rsa_core::{DeviceSession, Result, RsaError, TriggerMode, TriggerSource, TriggerTransition};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// IF power trigger level limits in dBm.
pub const IF_POWER_LEVEL_RANGE: (f64, f64) = (-130.0, 30.0);

/// Trigger position limits in percent of the record.
pub const POSITION_PERCENT_RANGE: (f64, f64) = (1.0, 99.0);

/// Complete trigger setup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Free run or triggered
    pub mode: TriggerMode,
    /// Event source
    pub source: TriggerSource,
    /// Edge detection
    pub transition: TriggerTransition,
    /// IF power level for the `IFPowerLevel` source, in dBm
    pub if_power_level_dbm: f64,
    /// Trigger position in percent of the record
    pub position_percent: f64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            mode: TriggerMode::FreeRun,
            source: TriggerSource::External,
            transition: TriggerTransition::LowHigh,
            if_power_level_dbm: -20.0,
            position_percent: 10.0,
        }
    }
}

impl TriggerConfig {
    /// Build from vendor setting names.
    ///
    /// Mode names ignore case; source and transition names are exact.
    pub fn from_names(mode: &str, source: &str, transition: &str) -> Result<Self> {
        Ok(Self {
            mode: mode.parse()?,
            source: source.parse()?,
            transition: transition.parse()?,
            ..Self::default()
        })
    }

    /// IF power trigger at `level_dbm`.
    pub fn if_power(level_dbm: f64, transition: TriggerTransition) -> Self {
        Self {
            mode: TriggerMode::Triggered,
            source: TriggerSource::IfPowerLevel,
            transition,
            if_power_level_dbm: level_dbm,
            ..Self::default()
        }
    }

    /// Range-check the numeric settings.
    pub fn validate(&self) -> Result<()> {
        let (min, max) = IF_POWER_LEVEL_RANGE;
        check_range(self.if_power_level_dbm, min, max, true)
            .map_err(|e| RsaError::validation("IF power trigger level", e))?;
        let (min, max) = POSITION_PERCENT_RANGE;
        check_range(self.position_percent, min, max, true)
            .map_err(|e| RsaError::validation("trigger position percent", e))?;
        Ok(())
    }
}

pub(crate) async fn apply<S: DeviceSession + ?Sized>(
    session: &S,
    trigger: &TriggerConfig,
) -> Result<()> {
    trigger.validate()?;
    session.set_trigger_mode(trigger.mode.code()).await?;
    session.set_trigger_source(trigger.source.code()).await?;
    session
        .set_trigger_transition(trigger.transition.code())
        .await?;
    session
        .set_if_power_trigger_level(trigger.if_power_level_dbm)
        .await?;
    session
        .set_trigger_position_percent(trigger.position_percent)
        .await?;
    debug!(
        mode = %trigger.mode,
        source = %trigger.source,
        transition = %trigger.transition,
        level_dbm = trigger.if_power_level_dbm,
        position_percent = trigger.position_percent,
        "Trigger configured"
    );
    Ok(())
}
