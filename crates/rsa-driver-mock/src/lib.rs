//! Simulated RSA spectrum analyzer for rsa-stream
//!
//! This crate provides an in-process [`DeviceSession`](rsa_core::DeviceSession)
//! so the streaming client can be exercised without an instrument. All waits
//! are async-safe (`tokio::time`, never `std::thread::sleep`).
//!
//! # Behavior
//!
//! - Bandwidth selection uses the instrument's ladder exactly
//! - IQ data is generated from an [`IqPattern`] by absolute sample index
//! - Sticky status bits latch until cleared, as on hardware
//! - File destinations write real `.siqh`/`.siqd`, `.siq` or `.tiq` files
//! - Configuration calls are rejected while the device is running
//!
//! # Example
//!
//! ```rust,ignore
//! use rsa_driver_mock::SimulatedAnalyzer;
//!
//! let analyzer = SimulatedAnalyzer::builder().sample_rate(10_000.0).block_size(1000).build();
//! let probe = analyzer.clone(); // shares state
//! ```

pub mod analyzer;
pub mod common;
pub mod disk;
pub mod pattern;

pub use analyzer::{
    SimulatedAnalyzer, SimulatedAnalyzerBuilder, TriggerSettings, INT16_FULL_SCALE,
    INT32_FULL_SCALE, MAX_BUFFER_SIZE,
};
pub use common::{ErrorConfig, ErrorScenario, MockMode, MockRng, TimingConfig};
pub use pattern::IqPattern;
