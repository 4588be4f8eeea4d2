use std::sync::{Arc, Mutex, PoisonError};

use time::{Duration, OffsetDateTime};

/// A manual clock was moved outside the representable date range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot move clock from {from} by {by}")]
pub struct ClockError {
    pub from: OffsetDateTime,
    pub by: Duration,
}

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<OffsetDateTime>>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, at: OffsetDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    /// Move the clock by `by` and return the new time. The clock is left
    /// untouched when the result would be out of range.
    pub fn advance(&self, by: Duration) -> Result<OffsetDateTime, ClockError> {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        let next = now.checked_add(by).ok_or(ClockError { from: *now, by })?;
        *now = next;
        Ok(next)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
