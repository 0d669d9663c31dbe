use crate::domain::ports::Pacer;
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_PACE_EVERY: usize = 10;
pub const DEFAULT_PACE_DELAY: Duration = Duration::from_millis(500);

/// Sleeps for a fixed delay after every `every` rows.
///
/// The first row never waits, so a run over `n` rows pauses
/// `(n - 1) / every` times.
#[derive(Debug, Clone)]
pub struct FixedIntervalPacer {
    every: usize,
    delay: Duration,
    pauses: usize,
}

impl FixedIntervalPacer {
    pub fn new(every: usize, delay: Duration) -> Self {
        Self {
            every: every.max(1),
            delay,
            pauses: 0,
        }
    }

    pub fn should_pause(&self, index: usize) -> bool {
        index > 0 && index % self.every == 0
    }

    /// Delays inserted so far.
    pub fn pauses(&self) -> usize {
        self.pauses
    }
}

impl Default for FixedIntervalPacer {
    fn default() -> Self {
        Self::new(DEFAULT_PACE_EVERY, DEFAULT_PACE_DELAY)
    }
}

#[async_trait]
impl Pacer for FixedIntervalPacer {
    async fn before_request(&mut self, index: usize) {
        if self.should_pause(index) {
            self.pauses += 1;
            tracing::debug!("Pausing {:?} before row {}", self.delay, index + 1);
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run_pacer(rows: usize) -> usize {
        let mut pacer = FixedIntervalPacer::new(10, Duration::ZERO);
        for index in 0..rows {
            pacer.before_request(index).await;
        }
        pacer.pauses()
    }

    #[tokio::test]
    async fn test_pause_count_over_a_run() {
        assert_eq!(run_pacer(0).await, 0);
        assert_eq!(run_pacer(1).await, 0);
        assert_eq!(run_pacer(10).await, 0);
        assert_eq!(run_pacer(11).await, 1);
        assert_eq!(run_pacer(25).await, 2);
        assert_eq!(run_pacer(101).await, 10);
    }

    #[test]
    fn test_pauses_before_eleventh_and_twenty_first_rows() {
        let pacer = FixedIntervalPacer::default();
        let paused: Vec<usize> = (0..25).filter(|&i| pacer.should_pause(i)).collect();
        assert_eq!(paused, vec![10, 20]);
    }

    #[tokio::test]
    async fn test_pause_actually_waits() {
        let mut pacer = FixedIntervalPacer::new(1, Duration::from_millis(20));
        let started = std::time::Instant::now();
        pacer.before_request(1).await;
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let pacer = FixedIntervalPacer::new(0, Duration::ZERO);
        assert!(!pacer.should_pause(0));
        assert!(pacer.should_pause(1));
    }
}
