use std::time::Duration;

use cadence_core::config::RefreshConfig;
use rand::Rng;

/// Delays between slow cycles.
///
/// Successful cycles wait the regular period plus random jitter. After the
/// n-th consecutive failure the n-th backoff step is used instead, the last
/// step repeating as the cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    period: Duration,
    jitter: Duration,
    steps: Vec<Duration>,
}

impl BackoffPolicy {
    #[must_use]
    pub fn new(period: Duration, jitter: Duration, steps: Vec<Duration>) -> Self {
        Self {
            period,
            jitter,
            steps,
        }
    }

    #[must_use]
    pub fn from_config(config: &RefreshConfig) -> Self {
        Self::new(config.period(), config.jitter(), config.backoff())
    }

    /// Delay before the next attempt, without jitter.
    #[must_use]
    pub fn base_delay(&self, consecutive_failures: u32) -> Duration {
        let Some(step) = consecutive_failures.checked_sub(1) else {
            return self.period;
        };
        let idx = usize::try_from(step).unwrap_or(usize::MAX);
        self.steps
            .get(idx)
            .or_else(|| self.steps.last())
            .copied()
            .unwrap_or(self.period)
    }

    /// Delay before the next attempt, with up to `jitter` added.
    #[must_use]
    pub fn next_delay(&self, consecutive_failures: u32) -> Duration {
        let base = self.base_delay(consecutive_failures);
        let max_jitter = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if max_jitter == 0 {
            return base;
        }
        let jitter = rand::rng().random_range(0..=max_jitter);
        base.saturating_add(Duration::from_millis(jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter_secs: u64) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_secs(60),
            Duration::from_secs(jitter_secs),
            [60, 120, 300, 600].map(Duration::from_secs).to_vec(),
        )
    }

    #[test]
    fn test_steps_then_cap() {
        let policy = policy(0);
        let delays: Vec<u64> = (0..7)
            .map(|failures| policy.next_delay(failures).as_secs())
            .collect();
        assert_eq!(delays, vec![60, 60, 120, 300, 600, 600, 600]);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = policy(10);
        for failures in [0, 2, 9] {
            let base = policy.base_delay(failures);
            for _ in 0..50 {
                let delay = policy.next_delay(failures);
                assert!(delay >= base);
                assert!(delay <= base + Duration::from_secs(10));
            }
        }
    }

    #[test]
    fn test_empty_steps_fall_back_to_period() {
        let policy = BackoffPolicy::new(Duration::from_secs(30), Duration::ZERO, Vec::new());
        assert_eq!(policy.base_delay(3), Duration::from_secs(30));
    }
}
