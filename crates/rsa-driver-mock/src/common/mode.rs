//! Operational modes for the simulated analyzer.
//!
//! - **Instant**: No pacing; readiness timeouts return immediately. For unit tests.
//! - **Realistic**: Blocks arrive at the configured sample rate and readiness
//!   timeouts take their full duration. For integration tests and demos.

/// Operational modes for the simulated analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockMode {
    /// No delays, deterministic - for unit tests
    #[default]
    Instant,
    /// Hardware-like timing - for integration tests
    Realistic,
}

impl MockMode {
    /// Whether this mode sleeps to imitate hardware timing.
    pub fn is_paced(self) -> bool {
        matches!(self, Self::Realistic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode() {
        assert_eq!(MockMode::default(), MockMode::Instant);
        assert!(!MockMode::Instant.is_paced());
        assert!(MockMode::Realistic.is_paced());
    }
}
