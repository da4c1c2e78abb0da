//! # Fibonacci Poll Backoff
//!
//! Provides a Fibonacci-based backoff for polling remote tasks.
//! Short tasks are observed quickly while long-running ones are not hammered:
//! with the defaults the delays are 250ms, 250ms, 500ms, 750ms, 1.25s, 2s, 3.25s, 5s (max).

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, capped at the maximum.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    /// Previous delay
    prev: Duration,
    /// Current delay
    current: Duration,
    /// Maximum delay
    max: Duration,
}

impl PollBackoff {
    /// Create a new backoff with the given minimum and maximum delays
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            prev: Duration::ZERO,
            current: min,
            max,
        }
    }

    /// Get the next delay and advance the sequence
    pub fn next_delay(&mut self) -> Duration {
        let result = self.current;
        let next = self.prev + self.current;
        self.prev = self.current;
        self.current = std::cmp::min(next, self.max);
        result
    }
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(250), Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_backoff_sequence() {
        let mut backoff = PollBackoff::default();

        let millis: Vec<u128> = (0..9).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(millis, vec![250, 250, 500, 750, 1250, 2000, 3250, 5000, 5000]);
    }

    #[test]
    fn test_poll_backoff_starts_at_min() {
        let mut backoff = PollBackoff::new(Duration::from_millis(10), Duration::from_millis(100));

        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
        assert_eq!(backoff.next_delay(), Duration::from_millis(20));
        assert_eq!(backoff.next_delay(), Duration::from_millis(30));
    }

    #[test]
    fn test_poll_backoff_max_cap() {
        let mut backoff = PollBackoff::new(Duration::from_secs(1), Duration::from_secs(2));

        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
    }
}
