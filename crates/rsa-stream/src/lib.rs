//! IQ streaming acquisition client for RSA spectrum analyzers.
//!
//! This crate drives an instrument through the [`DeviceSession`] boundary
//! from `rsa-core`:
//!
//! - **configuration**: validated stream setters (bandwidth with its
//!   stop/set/run cycle, output destination and datatype, buffer size, file
//!   controls, tuning)
//! - **engine**: readiness polling and block draining into a preallocated
//!   output buffer, status accumulation, guaranteed stop on every exit path
//! - **file_capture**: bounded split SIQ capture through a scoped temporary
//!   directory, read back and deinterleaved
//! - **client**: [`IqStreamClient`], the serialized facade with busy
//!   rejection while a run owns the device
//! - **config**: layered [`StreamSettings`] (defaults, TOML, environment)
//!
//! # Example
//!
//! ```rust,ignore
//! use rsa_core::AcquisitionConfiguration;
//! use rsa_stream::IqStreamClient;
//!
//! let client = IqStreamClient::new(session);
//! client.connect().await?;
//! let params = client.configure_stream(AcquisitionConfiguration::client(10e6)).await?;
//! let capture = client.capture_to_memory(100, true).await?;
//! assert_eq!(capture.len(), params.samples_for(100));
//! ```
//!
//! [`DeviceSession`]: rsa_core::DeviceSession

pub mod cancel;
pub mod client;
pub mod config;
pub mod configuration;
mod engine;
pub mod file_capture;
pub mod state;
pub mod trigger;

pub use cancel::CancelHandle;
pub use client::IqStreamClient;
pub use config::{LogFormat, StreamSettings};
pub use configuration::{parse_output_configuration, Tuning};
pub use state::StreamState;
pub use trigger::TriggerConfig;
