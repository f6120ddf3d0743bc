//! Live/DVR availability bounds.

use chrono::{DateTime, TimeDelta, Utc};

/// Wall-clock view adjusted by a server/client offset.
///
/// Computing the offset (e.g. from a `UTCTiming` time server) is the job of
/// an external collaborator; this type only applies it.
#[derive(Debug, Clone, Default)]
pub struct SyncClock {
    /// How much time the local clock is behind the remote clock
    offset: TimeDelta,
}

impl SyncClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(offset: TimeDelta) -> Self {
        Self { offset }
    }

    pub fn set_offset(&mut self, offset: TimeDelta) {
        self.offset = offset;
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now() + self.offset
    }

    /// Current time as fractional unix seconds.
    pub fn now_seconds(&self) -> f64 {
        self.now().timestamp_millis() as f64 / 1000.0
    }
}

#[derive(Debug, Clone, Copy)]
struct LastPosition {
    /// Last known maximum position, in media-time seconds.
    position: f64,
    /// Clock time (unix seconds) at which that position was observed.
    at: f64,
}

/// Computes the minimum and maximum positions reachable in a manifest,
/// accounting for the sliding live/DVR window of dynamic content.
///
/// One instance is shared by every index of a Period; the manifest-refresh
/// coordinator feeds it the most recent known position.
#[derive(Debug, Clone)]
pub struct ManifestBoundsCalculator {
    is_dynamic: bool,
    /// Wall-clock time (unix seconds) media time 0 maps to, for dynamic
    /// content.
    availability_start_time: f64,
    time_shift_buffer_depth: Option<f64>,
    last_position: Option<LastPosition>,
    clock: SyncClock,
}

impl ManifestBoundsCalculator {
    pub fn new(
        is_dynamic: bool,
        availability_start_time: f64,
        time_shift_buffer_depth: Option<f64>,
        clock: SyncClock,
    ) -> Self {
        Self {
            is_dynamic,
            availability_start_time,
            time_shift_buffer_depth,
            last_position: None,
            clock,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }

    pub fn clock(&self) -> &SyncClock {
        &self.clock
    }

    /// Record the last position the manifest is known to reach, observed at
    /// clock time `at` (unix seconds).
    pub fn set_last_position(&mut self, position: f64, at: f64) {
        self.last_position = Some(LastPosition { position, at });
    }

    pub fn last_position_is_known(&self) -> bool {
        self.last_position.is_some()
    }

    /// Estimated maximum reachable position, in media-time seconds.
    ///
    /// For dynamic content a known last position keeps progressing with the
    /// wall clock; without one the position is derived from the availability
    /// start time. Static content without a known last position is entirely
    /// available.
    pub fn maximum_bound(&self) -> f64 {
        match self.last_position {
            Some(last) if self.is_dynamic => {
                last.position + (self.clock.now_seconds() - last.at).max(0.0)
            }
            Some(last) => last.position,
            None if self.is_dynamic => self.clock.now_seconds() - self.availability_start_time,
            None => f64::INFINITY,
        }
    }

    /// Estimated minimum still-available position, in media-time seconds.
    pub fn minimum_bound(&self) -> f64 {
        match self.time_shift_buffer_depth {
            Some(depth) if self.is_dynamic => (self.maximum_bound() - depth).max(0.0),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_bounds() {
        let calculator = ManifestBoundsCalculator::new(false, 0.0, None, SyncClock::new());
        assert_eq!(calculator.minimum_bound(), 0.0);
        assert_eq!(calculator.maximum_bound(), f64::INFINITY);
    }

    #[test]
    fn test_dynamic_bounds_follow_last_position() {
        let clock = SyncClock::new();
        let now = clock.now_seconds();
        let mut calculator =
            ManifestBoundsCalculator::new(true, 0.0, Some(30.0), clock);
        calculator.set_last_position(600.0, now);

        let maximum = calculator.maximum_bound();
        assert!(maximum >= 600.0 && maximum < 601.0);
        let minimum = calculator.minimum_bound();
        assert!(minimum >= 570.0 && minimum < 571.0);
    }

    #[test]
    fn test_dynamic_bounds_without_last_position() {
        let clock = SyncClock::new();
        let start = clock.now_seconds() - 120.0;
        let calculator = ManifestBoundsCalculator::new(true, start, None, clock);

        let maximum = calculator.maximum_bound();
        assert!(maximum >= 120.0 && maximum < 121.0);
        assert_eq!(calculator.minimum_bound(), 0.0);
    }
}
