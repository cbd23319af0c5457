//! Monotonic time source for timeouts, kept behind a trait so tests can
//! substitute a controllable clock instead of depending on wall-clock time.

use std::time::Duration;

/// A monotonic clock. No wall-clock dependency: only elapsed-time
/// comparisons matter to the components that consume it.
pub trait Clock: Send + Sync {
    /// Time elapsed since some fixed, implementation-defined epoch.
    fn now(&self) -> Duration;
}

/// The default [`Clock`], backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    start: std::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokio_clock_advances() {
        let clock = TokioClock::new();
        let first = clock.now();
        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.now() >= first);
    }
}
