use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    /// Create a Stopwatch that is considered started at `start`.
    pub fn started_at(start: Instant) -> Stopwatch {
        Stopwatch { start }
    }

    /// Time between the start and `now`, saturating at zero if `now` is earlier.
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start)
    }
}
