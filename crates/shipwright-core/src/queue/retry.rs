//! Retry policy: decides backoff delays.

use std::time::Duration;

/// Exponential backoff: `delay = base_delay * multiplier^(attempts - 1)`.
///
/// Used in two places:
/// - the round queue, between whole-round attempts (`rounds()`)
/// - the notifier, between callback POSTs (`notification()`)
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay after the first failure.
    pub base_delay: Duration,

    /// Backoff multiplier.
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, multiplier: f64) -> Self {
        Self {
            base_delay,
            multiplier,
        }
    }

    /// Between round attempts: 2s, 4s, 8s, ...
    pub fn rounds() -> Self {
        Self::new(Duration::from_secs(2), 2.0)
    }

    /// Between callback attempts: 1s, 2s, 4s, 8s.
    pub fn notification() -> Self {
        Self::new(Duration::from_secs(1), 2.0)
    }

    /// Delay before the next try, given how many attempts were already made.
    ///
    /// # Arguments
    /// * `attempts` - Number of attempts already made (1-indexed). `0` is
    ///   treated like `1`.
    ///
    /// Example with base_delay=1s, multiplier=2.0:
    /// - attempt 1: 1s
    /// - attempt 2: 2s
    /// - attempt 3: 4s
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let delay_secs = base_secs * self.multiplier.powi(attempts.saturating_sub(1) as i32);
        Duration::from_secs_f64(delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_backoff_doubles_from_one_second() {
        let policy = RetryPolicy::notification();
        let delays: Vec<_> = (1..=4).map(|n| policy.next_delay(n)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
    }

    #[test]
    fn round_backoff_increases() {
        let policy = RetryPolicy::rounds();

        let d1 = policy.next_delay(1);
        let d2 = policy.next_delay(2);
        let d3 = policy.next_delay(3);

        assert!(d2 > d1);
        assert!(d3 > d2);
        assert_eq!(d1, Duration::from_secs(2));
        assert_eq!(d3, Duration::from_secs(8));
    }

    #[test]
    fn zero_attempts_uses_base_delay() {
        let policy = RetryPolicy::notification();
        assert_eq!(policy.next_delay(0), policy.base_delay);
    }
}
