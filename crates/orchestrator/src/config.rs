//! Orchestrator configuration.

use std::time::Duration;

use crate::activity::RetryPolicy;

/// Tuning knobs for the engine and worker pool, with sensible defaults.
///
/// Environment overrides (all optional):
/// - `WORKER_COUNT` — worker tasks draining the queue (default: `4`)
/// - `QUEUE_CAPACITY` — bounded queue depth before submit backpressure
///   (default: `64`)
/// - `ACTIVITY_MAX_ATTEMPTS` — attempts per activity (default: `3`)
/// - `ACTIVITY_TIMEOUT_SECS` — per-attempt timeout (default: `60`)
/// - `COMPENSATION_MAX_ATTEMPTS` — attempts per compensating activity
///   before the manual-intervention queue (default: `5`)
/// - `MAX_PARALLEL_PAYOUTS` — concurrent payout sub-sagas per batch
///   (default: `8`)
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub activity_retry: RetryPolicy,
    pub compensation_retry: RetryPolicy,
    pub max_parallel_payouts: usize,
}

impl OrchestratorConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            worker_count: env_parse("WORKER_COUNT").unwrap_or(defaults.worker_count),
            queue_capacity: env_parse("QUEUE_CAPACITY").unwrap_or(defaults.queue_capacity),
            activity_retry: RetryPolicy {
                max_attempts: env_parse("ACTIVITY_MAX_ATTEMPTS")
                    .unwrap_or(defaults.activity_retry.max_attempts),
                attempt_timeout: env_parse("ACTIVITY_TIMEOUT_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.activity_retry.attempt_timeout),
            },
            compensation_retry: RetryPolicy {
                max_attempts: env_parse("COMPENSATION_MAX_ATTEMPTS")
                    .unwrap_or(defaults.compensation_retry.max_attempts),
                attempt_timeout: defaults.compensation_retry.attempt_timeout,
            },
            max_parallel_payouts: env_parse("MAX_PARALLEL_PAYOUTS")
                .unwrap_or(defaults.max_parallel_payouts),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_capacity: 64,
            activity_retry: RetryPolicy::default(),
            compensation_retry: RetryPolicy {
                max_attempts: 5,
                attempt_timeout: Duration::from_secs(60),
            },
            max_parallel_payouts: 8,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.activity_retry.max_attempts, 3);
        assert_eq!(config.activity_retry.attempt_timeout, Duration::from_secs(60));
        assert_eq!(config.compensation_retry.max_attempts, 5);
        assert_eq!(config.max_parallel_payouts, 8);
    }
}
