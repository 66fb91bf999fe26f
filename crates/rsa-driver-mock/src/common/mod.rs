//! Common infrastructure for the simulated analyzer.
//!
//! - **mode**: Operational modes (Instant, Realistic)
//! - **timing**: Hardware-like pacing for realistic mode
//! - **errors**: Native error injection
//! - **rng**: Seeded random number generator

pub mod errors;
pub mod mode;
pub mod rng;
pub mod timing;

pub use errors::{ErrorConfig, ErrorScenario};
pub use mode::MockMode;
pub use rng::MockRng;
pub use timing::TimingConfig;
