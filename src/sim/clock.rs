use chrono::{DateTime, Duration, Utc};

/// A clock that steps through a half-open UTC range `[start, end)` at a fixed
/// resolution.
///
/// The `Clock` provides methods to advance time step-by-step or run a
/// function at each instant until the range is exhausted.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use glare_sim::sim::clock::Clock;
///
/// let start = Utc.with_ymd_and_hms(2025, 6, 21, 12, 0, 0).unwrap();
/// let end = Utc.with_ymd_and_hms(2025, 6, 21, 12, 30, 0).unwrap();
/// let mut clock = Clock::new(start, end, 10);
/// let mut minutes = Vec::new();
///
/// clock.run(|t| minutes.push(t.format("%M").to_string()));
/// assert_eq!(minutes, vec!["00", "10", "20"]);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    /// Next instant to hand out
    next: DateTime<Utc>,
    /// Exclusive end of the range
    end: DateTime<Utc>,
    step: Duration,
}

impl Clock {
    /// Creates a new clock.
    ///
    /// # Arguments
    ///
    /// * `start` - First instant (inclusive)
    /// * `end` - Last instant (exclusive)
    /// * `step_minutes` - Step length in minutes (values below 1 are treated as 1)
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, step_minutes: u32) -> Self {
        Self {
            next: start,
            end,
            step: Duration::minutes(i64::from(step_minutes.max(1))),
        }
    }

    /// Advances the clock by one step.
    ///
    /// # Returns
    ///
    /// * `Some(instant)` - The current instant before advancing
    /// * `None` - If the range is exhausted
    pub fn tick(&mut self) -> Option<DateTime<Utc>> {
        if self.next < self.end {
            let t = self.next;
            self.next += self.step;
            Some(t)
        } else {
            None
        }
    }

    /// Number of instants not yet handed out.
    pub fn remaining(&self) -> usize {
        if self.next >= self.end {
            return 0;
        }
        let span = (self.end - self.next).num_seconds();
        let step = self.step.num_seconds();
        ((span + step - 1) / step) as usize
    }

    /// Runs a function for each remaining instant.
    pub fn run(&mut self, mut f: impl FnMut(DateTime<Utc>)) {
        while let Some(t) = self.tick() {
            f(t);
        }
    }
}

impl Iterator for Clock {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        self.tick()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}
