use std::time::Duration;

use tokio::time::Instant;

use crate::error::FocusError;

/// One accepted focus request on the monotonic clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusInterval {
    pub start: Instant,
    pub end: Instant,
}

impl FocusInterval {
    pub fn duration(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }
}

/// Active focus intervals. Every query takes `now` so callers decide which
/// clock reading a whole locked section works against.
#[derive(Debug, Default)]
pub struct IntervalTracker {
    intervals: Vec<FocusInterval>,
}

impl IntervalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new interval. While still focusing the interval starts where
    /// the latest one ends, so consecutive requests concatenate.
    pub fn add_interval(
        &mut self,
        duration: Duration,
        now: Instant,
    ) -> Result<FocusInterval, FocusError> {
        if duration.is_zero() {
            return Err(FocusError::InvalidArgument(
                "focus duration must be greater than zero".to_string(),
            ));
        }
        let start = match self.latest_end() {
            Some(end) if end > now => end,
            _ => now,
        };
        let end = start.checked_add(duration).ok_or_else(|| {
            FocusError::InvalidArgument(format!(
                "focus duration of {}s is out of range",
                duration.as_secs()
            ))
        })?;
        let interval = FocusInterval { start, end };
        self.intervals.push(interval);
        Ok(interval)
    }

    pub fn time_left(&self, now: Instant) -> Duration {
        self.latest_end()
            .map(|end| end.saturating_duration_since(now))
            .unwrap_or_default()
    }

    pub fn is_focusing(&self, now: Instant) -> bool {
        !self.time_left(now).is_zero()
    }

    /// Drops every interval whose end is at or before `now`.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.intervals.len();
        self.intervals.retain(|interval| interval.end > now);
        before - self.intervals.len()
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.intervals.len();
        self.intervals.clear();
        removed
    }

    pub fn latest_end(&self) -> Option<Instant> {
        self.intervals.iter().map(|interval| interval.end).max()
    }

    pub fn intervals(&self) -> &[FocusInterval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}
