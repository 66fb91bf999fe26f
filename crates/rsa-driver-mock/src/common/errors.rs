//! Native error injection for the simulated analyzer.
//!
//! Injected failures surface exactly as a real driver's would: as
//! [`RsaError::DeviceCall`] carrying a vendor [`ReturnStatus`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rsa_core::{ReturnStatus, RsaError};

use super::rng::MockRng;

/// Error injection configuration
#[derive(Clone, Debug)]
pub struct ErrorConfig {
    /// Per-operation failure rate (0.0 to 1.0); `"*"` applies to all
    failure_rates: Arc<HashMap<&'static str, f64>>,
    /// Specific failure scenarios
    scenarios: Arc<Vec<ErrorScenario>>,
    /// RNG for failure decisions
    rng: Arc<MockRng>,
    /// State tracking for scenarios
    state: Arc<Mutex<ErrorState>>,
}

/// A scripted failure.
#[derive(Debug, Clone)]
pub enum ErrorScenario {
    /// Fail with `status` after `count` successful calls of `operation`
    FailAfterN {
        operation: &'static str,
        count: u32,
        status: ReturnStatus,
    },
    /// Every call of `operation` fails with `status`
    Always {
        operation: &'static str,
        status: ReturnStatus,
    },
    /// Device removed: this and every later call fails
    Disconnect { after_calls: u32 },
}

#[derive(Default, Debug)]
struct ErrorState {
    operation_counts: HashMap<&'static str, u32>,
    total_calls: u32,
    disconnected: bool,
}

impl ErrorConfig {
    /// No injected errors
    pub fn none() -> Self {
        Self::build(HashMap::new(), Vec::new(), None)
    }

    /// Uniform random failures on every operation
    pub fn random_failures_seeded(rate: f64, seed: Option<u64>) -> Self {
        let mut rates = HashMap::new();
        rates.insert("*", rate);
        Self::build(rates, Vec::new(), seed)
    }

    /// A single scripted scenario
    pub fn scenario(scenario: ErrorScenario) -> Self {
        Self::scenarios(vec![scenario])
    }

    /// Several scripted scenarios
    pub fn scenarios(scenarios: Vec<ErrorScenario>) -> Self {
        Self::build(HashMap::new(), scenarios, None)
    }

    fn build(
        rates: HashMap<&'static str, f64>,
        scenarios: Vec<ErrorScenario>,
        seed: Option<u64>,
    ) -> Self {
        Self {
            failure_rates: Arc::new(rates),
            scenarios: Arc::new(scenarios),
            rng: Arc::new(MockRng::new(seed)),
            state: Arc::new(Mutex::new(ErrorState::default())),
        }
    }

    /// Decide whether `operation` fails on this call.
    pub fn check_operation(&self, operation: &'static str) -> Result<(), RsaError> {
        let mut state = self.state.lock();
        state.total_calls += 1;
        let total = state.total_calls;

        if state.disconnected {
            return Err(fail(operation, ReturnStatus::ErrorDisconnectedDeviceRemoved));
        }

        for scenario in self.scenarios.iter() {
            match scenario {
                ErrorScenario::FailAfterN {
                    operation: op,
                    count,
                    status,
                } if *op == operation => {
                    let current = state.operation_counts.entry(operation).or_insert(0);
                    *current += 1;
                    if *current > *count {
                        return Err(fail(operation, *status));
                    }
                }
                ErrorScenario::Always {
                    operation: op,
                    status,
                } if *op == operation => {
                    return Err(fail(operation, *status));
                }
                ErrorScenario::Disconnect { after_calls } if total > *after_calls => {
                    state.disconnected = true;
                    return Err(fail(operation, ReturnStatus::ErrorDisconnectedDeviceRemoved));
                }
                _ => {}
            }
        }

        let rate = self
            .failure_rates
            .get(operation)
            .or_else(|| self.failure_rates.get("*"))
            .copied()
            .unwrap_or(0.0);
        if self.rng.should_fail(rate) {
            return Err(fail(operation, ReturnStatus::ErrorTransfer));
        }

        Ok(())
    }

    /// Clear counters and the disconnected latch
    pub fn reset(&self) {
        *self.state.lock() = ErrorState::default();
    }
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::none()
    }
}

fn fail(operation: &'static str, status: ReturnStatus) -> RsaError {
    tracing::debug!(operation, %status, "Injected device error");
    RsaError::DeviceCall { operation, status }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_errors() {
        let config = ErrorConfig::none();
        for _ in 0..100 {
            assert!(config.check_operation("IQSTREAM_GetIQData").is_ok());
        }
    }

    #[test]
    fn test_random_failures() {
        let config = ErrorConfig::random_failures_seeded(0.5, Some(42));
        let failures = (0..1000)
            .filter(|_| config.check_operation("IQSTREAM_GetIQData").is_err())
            .count();
        assert!(failures > 400 && failures < 600, "Got {} failures", failures);
    }

    #[test]
    fn test_fail_after_n() {
        let config = ErrorConfig::scenario(ErrorScenario::FailAfterN {
            operation: "IQSTREAM_GetIQData",
            count: 3,
            status: ReturnStatus::ErrorTransfer,
        });
        for _ in 0..3 {
            assert!(config.check_operation("IQSTREAM_GetIQData").is_ok());
        }
        assert!(config.check_operation("DEVICE_Run").is_ok());
        let err = config.check_operation("IQSTREAM_GetIQData").unwrap_err();
        assert!(matches!(
            err,
            RsaError::DeviceCall {
                status: ReturnStatus::ErrorTransfer,
                ..
            }
        ));

        config.reset();
        assert!(config.check_operation("IQSTREAM_GetIQData").is_ok());
    }

    #[test]
    fn test_disconnect_latches() {
        let config = ErrorConfig::scenario(ErrorScenario::Disconnect { after_calls: 2 });
        assert!(config.check_operation("DEVICE_Run").is_ok());
        assert!(config.check_operation("IQSTREAM_Start").is_ok());
        assert!(config.check_operation("IQSTREAM_GetIQData").is_err());
        assert!(config.check_operation("DEVICE_Stop").is_err());
    }
}
