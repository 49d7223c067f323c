// src/sampler.rs - Rate limiting for pose estimation
use std::time::{Duration, Instant};

/// Decides, once per display tick, whether the pose source should run.
///
/// A sample counts from the moment it starts, whether or not the estimate
/// succeeds. At most one sample is in flight: `try_begin` refuses while the
/// previous one has not been `finish`ed. `begin` ties the in-flight flag to a
/// guard, so a sample whose caller is cancelled still ends.
#[derive(Debug, Clone)]
pub struct ThrottledSampler {
    min_interval: Duration,
    last_sample: Option<Instant>,
    in_flight: bool,
}

impl ThrottledSampler {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_sample: None,
            in_flight: false,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn last_sample(&self) -> Option<Instant> {
        self.last_sample
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// True if a sample is due at `now` (without starting one).
    pub fn is_due(&self, now: Instant) -> bool {
        if self.in_flight {
            return false;
        }
        match self.last_sample {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        }
    }

    /// Starts a sample if one is due, stamping `now` as its time.
    pub fn try_begin(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.last_sample = Some(now);
        self.in_flight = true;
        true
    }

    /// Like `try_begin`, but the sample stays in flight only as long as the
    /// returned guard lives.
    pub fn begin(&mut self, now: Instant) -> Option<SampleGuard<'_>> {
        if !self.try_begin(now) {
            return None;
        }
        Some(SampleGuard { sampler: self })
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
    }
}

/// An in-flight sample. Dropping it finishes the sample.
#[derive(Debug)]
pub struct SampleGuard<'a> {
    sampler: &'a mut ThrottledSampler,
}

impl Drop for SampleGuard<'_> {
    fn drop(&mut self) {
        self.sampler.finish();
    }
}

impl Default for ThrottledSampler {
    fn default() -> Self {
        Self::new(Duration::from_millis(200))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tick_is_due() {
        let sampler = ThrottledSampler::default();
        assert!(sampler.is_due(Instant::now()));
    }

    #[test]
    fn test_ticks_at_0_50_120_210() {
        let start = Instant::now();
        let mut sampler = ThrottledSampler::new(Duration::from_millis(200));
        let sampled: Vec<u64> = [0, 50, 120, 210]
            .into_iter()
            .filter(|&ms| {
                let due = sampler.try_begin(start + Duration::from_millis(ms));
                sampler.finish();
                due
            })
            .collect();
        assert_eq!(sampled, vec![0, 210]);
    }

    #[test]
    fn test_exact_interval_is_due() {
        let start = Instant::now();
        let mut sampler = ThrottledSampler::new(Duration::from_millis(200));
        assert!(sampler.try_begin(start));
        sampler.finish();
        assert!(!sampler.try_begin(start + Duration::from_millis(199)));
        assert!(sampler.try_begin(start + Duration::from_millis(200)));
    }

    #[test]
    fn test_in_flight_blocks_next_sample() {
        let start = Instant::now();
        let mut sampler = ThrottledSampler::new(Duration::from_millis(10));
        assert!(sampler.try_begin(start));
        assert!(sampler.is_in_flight());
        assert!(!sampler.try_begin(start + Duration::from_secs(1)));
        sampler.finish();
        assert!(sampler.try_begin(start + Duration::from_secs(1)));
        assert_eq!(sampler.last_sample(), Some(start + Duration::from_secs(1)));
    }

    #[test]
    fn test_dropping_guard_ends_the_sample() {
        let start = Instant::now();
        let mut sampler = ThrottledSampler::new(Duration::from_millis(200));
        let guard = sampler.begin(start);
        assert!(guard.is_some());
        drop(guard);
        assert!(!sampler.is_in_flight());
        assert_eq!(sampler.last_sample(), Some(start));
        assert!(sampler.begin(start + Duration::from_millis(100)).is_none());
        assert!(sampler.begin(start + Duration::from_millis(200)).is_some());
    }

    #[test]
    fn test_clock_going_backwards_is_not_due() {
        let start = Instant::now() + Duration::from_secs(1);
        let mut sampler = ThrottledSampler::new(Duration::from_millis(200));
        assert!(sampler.try_begin(start));
        sampler.finish();
        assert!(!sampler.is_due(start - Duration::from_millis(500)));
    }
}
