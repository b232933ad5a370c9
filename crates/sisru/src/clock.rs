use chrono::NaiveDateTime;
use std::cell::Cell;
use std::time::{Duration, Instant};

/// Time source for the engine.
pub trait Clock {
    /// Monotonic time since the clock was created.
    fn now(&self) -> Duration;
    /// Local wall time, for peak classification.
    fn local_time(&self) -> NaiveDateTime;
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn local_time(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A clock that only moves when slept on. Wall time advances with it.
pub struct ManualClock {
    elapsed: Cell<Duration>,
    wall_origin: NaiveDateTime,
}

impl ManualClock {
    pub fn new(wall_origin: NaiveDateTime) -> Self {
        Self {
            elapsed: Cell::new(Duration::ZERO),
            wall_origin,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.elapsed.get()
    }

    fn local_time(&self) -> NaiveDateTime {
        self.wall_origin + chrono::Duration::from_std(self.elapsed.get()).unwrap_or_default()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
