use std::time::{Duration, Instant};

/// Countdown computed from a start instant; nothing runs in the background.
///
/// Callers poll [`remaining_time`](Self::remaining_time) (or the `_at`
/// variants with an explicit clock reading) and detect expiry by comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizTimer {
    pub started_at: Instant,
    pub duration: Duration,
}

impl QuizTimer {
    /// Starts now.
    pub fn start(duration: Duration) -> Self {
        Self::starting_at(Instant::now(), duration)
    }

    pub fn starting_at(started_at: Instant, duration: Duration) -> Self {
        Self {
            started_at,
            duration,
        }
    }

    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.duration
            .saturating_sub(now.saturating_duration_since(self.started_at))
    }

    pub fn remaining_time(&self) -> Duration {
        self.remaining_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.remaining_at(now).is_zero()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// `MM:SS`, rounded down.
    pub fn display_at(&self, now: Instant) -> String {
        let secs = self.remaining_at(now).as_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}
