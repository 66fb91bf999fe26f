//! Layered settings for the streaming client.
//!
//! Settings are resolved from three layers, each overriding the previous:
//!
//! 1. Built-in defaults from [`StreamSettings::default()`]
//! 2. An optional TOML file
//! 3. Environment variables prefixed with `RSA_STREAM_`
//!
//! # Environment Variables
//!
//! Every field can be overridden from the environment. Nested keys use a
//! double underscore:
//!
//! ```bash
//! export RSA_STREAM_LOG_LEVEL=debug
//! export RSA_STREAM_STALL_DEADLINE_MS=5000
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use rsa_core::validation::{
    check_bool, check_int, check_number, check_path, check_range, check_range_i64,
    check_string, ValidationError,
};
use rsa_core::Param;
use serde::{Deserialize, Serialize};

/// Largest client buffer request the instruments accept, in sample pairs.
pub const MAX_CLIENT_BUFFER: usize = 1_000_000;

/// Default config file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/rsa-stream.toml";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human-oriented output
    Pretty,
    /// Single-line output
    #[default]
    Compact,
    /// Newline-delimited JSON
    Json,
}

/// Streaming client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Default log filter directive (`RUST_LOG` takes precedence)
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Device index passed to connect
    pub device_id: i32,
    /// Client buffer request for in-memory captures, in sample pairs
    pub client_buffer_request: usize,
    /// Disk write status poll interval for file captures
    pub file_poll_interval_ms: u64,
    /// Give up on a run after this long without data; 0 waits forever
    pub stall_deadline_ms: u64,
    /// File name used inside the scoped capture directory
    pub temp_filename: String,
    /// Acquisition bandwidth for captures that do not name one, in Hz
    pub default_bandwidth_hz: f64,
    /// Fail captures on any acquisition status condition
    pub strict_status: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            device_id: 0,
            client_buffer_request: MAX_CLIENT_BUFFER,
            file_poll_interval_ms: 50,
            stall_deadline_ms: 30_000,
            temp_filename: "tempIQ".to_string(),
            default_bandwidth_hz: 1.0e6,
            strict_status: false,
        }
    }
}

impl StreamSettings {
    /// Load settings from defaults, an optional TOML file and the environment.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        Self::from_figment(Self::figment(config_path))
    }

    /// The layered provider stack used by [`load`](Self::load).
    pub fn figment(config_path: Option<PathBuf>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let file_path = config_path.unwrap_or_else(|| DEFAULT_CONFIG_PATH.into());
        if file_path.exists() {
            figment = figment.merge(Toml::file(&file_path));
        } else {
            // Logging is not up yet; it is configured from these settings.
            eprintln!(
                "Config file not found: {}. Using defaults.",
                file_path.display()
            );
        }

        figment.merge(Env::prefixed("RSA_STREAM_").split("__"))
    }

    /// Extract and validate settings from a provider stack.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Self = figment
            .extract()
            .context("Failed to extract configuration from Figment")?;
        settings
            .validate()
            .context("Configuration validation failed")?;
        Ok(settings)
    }

    /// Check values the client cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.log_level.trim().is_empty() {
            anyhow::bail!("log_level cannot be empty");
        }
        check_path(&self.temp_filename).map_err(|e| invalid("temp_filename", e))?;
        if self
            .temp_filename
            .contains(|c: char| c == '/' || c == '\\')
        {
            anyhow::bail!(
                "temp_filename '{}' must be a bare file name",
                self.temp_filename
            );
        }
        check_range_i64(to_i64(self.file_poll_interval_ms), 1, i64::MAX)
            .map_err(|e| invalid("file_poll_interval_ms", e))?;
        check_range_i64(to_i64(self.client_buffer_request), 0, to_i64(MAX_CLIENT_BUFFER))
            .map_err(|e| invalid("client_buffer_request (0 selects the device default)", e))?;
        check_range(self.default_bandwidth_hz, 0.0, f64::INFINITY, false)
            .map_err(|e| invalid("default_bandwidth_hz", e))?;
        Ok(())
    }

    /// Apply `key=value` overrides on top of the loaded layers.
    ///
    /// Values are parsed with [`Param::parse_token`] and must match the
    /// type of the setting they replace. Nothing changes unless every
    /// override applies and the result validates.
    pub fn apply_overrides<'a>(&mut self, pairs: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let mut next = self.clone();
        for pair in pairs {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Override '{pair}' is not of the form key=value"))?;
            next.apply_override(key.trim(), &Param::parse_token(value.trim()))?;
        }
        next.validate().context("Configuration validation failed")?;
        *self = next;
        Ok(())
    }

    /// Replace one setting with a loosely-typed value.
    pub fn apply_override(&mut self, key: &str, value: &Param) -> Result<()> {
        let bad = |e: ValidationError| anyhow::anyhow!("Invalid value {value} for {key}: {e}");
        match key {
            "log_level" => self.log_level = check_string(value).map_err(bad)?.to_string(),
            "log_format" => {
                self.log_format = match check_string(value).map_err(bad)? {
                    "pretty" => LogFormat::Pretty,
                    "compact" => LogFormat::Compact,
                    "json" => LogFormat::Json,
                    other => anyhow::bail!(
                        "Invalid value \"{other}\" for log_format: expected pretty, compact or json"
                    ),
                }
            }
            "device_id" => {
                let id = check_int(value).and_then(|v| check_range_i64(v, 0, i64::from(i32::MAX)));
                self.device_id = i32::try_from(id.map_err(bad)?)?;
            }
            "client_buffer_request" => {
                let pairs = check_int(value)
                    .and_then(|v| check_range_i64(v, 0, to_i64(MAX_CLIENT_BUFFER)));
                self.client_buffer_request = usize::try_from(pairs.map_err(bad)?)?;
            }
            "file_poll_interval_ms" | "stall_deadline_ms" => {
                let ms = check_int(value).and_then(|v| check_range_i64(v, 0, i64::MAX));
                let ms = u64::try_from(ms.map_err(bad)?)?;
                if key == "stall_deadline_ms" {
                    self.stall_deadline_ms = ms;
                } else {
                    self.file_poll_interval_ms = ms;
                }
            }
            "temp_filename" => self.temp_filename = check_string(value).map_err(bad)?.to_string(),
            "default_bandwidth_hz" => {
                self.default_bandwidth_hz = check_number(value).map_err(bad)?;
            }
            "strict_status" => self.strict_status = check_bool(value).map_err(bad)?,
            other => anyhow::bail!("Unknown setting '{other}'"),
        }
        Ok(())
    }

    /// Disk write status poll interval.
    pub fn file_poll_interval(&self) -> Duration {
        Duration::from_millis(self.file_poll_interval_ms)
    }

    /// Stall deadline, `None` when disabled.
    pub fn stall_deadline(&self) -> Option<Duration> {
        (self.stall_deadline_ms > 0).then(|| Duration::from_millis(self.stall_deadline_ms))
    }
}

fn invalid(key: &str, source: ValidationError) -> anyhow::Error {
    anyhow::anyhow!("{key}: {source}")
}

fn to_i64<T: TryInto<i64>>(value: T) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}
