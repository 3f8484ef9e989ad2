//!
//! Injectable time source
//!
//! Signers read `created`/`expires` from it, verifiers run their timing checks against it
//!

use std::{
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

/// Handle to move a mockable clock around
#[derive(Clone, Debug)]
pub struct MockHandle {
    delta: Arc<AtomicI64>,
}

impl MockHandle {
    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.delta.fetch_add(secs(by), Ordering::AcqRel);
    }

    /// Move the clock backwards
    pub fn rewind(&self, by: Duration) {
        self.delta.fetch_sub(secs(by), Ordering::AcqRel);
    }
}

fn secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

/// Clock reading the system time, optionally pinned and/or shifted by a delta (in seconds)
#[derive(Clone, Debug, Default)]
pub struct Clock {
    fixed: Option<SystemTime>,
    delta: Option<Arc<AtomicI64>>,
}

impl Clock {
    /// Clock following the system time
    #[must_use]
    pub fn system() -> Self {
        Self::default()
    }

    /// Clock that always reads the same instant
    #[must_use]
    pub fn fixed(at: SystemTime) -> Self {
        Self {
            fixed: Some(at),
            delta: None,
        }
    }

    /// Clock pinned at an instant whose delta can be adjusted through the returned handle
    #[must_use]
    pub fn mockable(at: SystemTime) -> (Self, MockHandle) {
        let delta = Arc::new(AtomicI64::default());
        let handle = MockHandle {
            delta: Arc::clone(&delta),
        };
        let clock = Self {
            fixed: Some(at),
            delta: Some(delta),
        };

        (clock, handle)
    }

    /// Current time of this clock
    #[must_use]
    pub fn now(&self) -> SystemTime {
        let now = self.fixed.unwrap_or_else(SystemTime::now);

        let Some(ref delta) = self.delta else {
            return now;
        };

        let delta = delta.load(Ordering::Acquire);
        if delta.is_negative() {
            now.checked_sub(Duration::from_secs(delta.unsigned_abs()))
                .unwrap_or(SystemTime::UNIX_EPOCH)
        } else {
            now + Duration::from_secs(delta.unsigned_abs())
        }
    }
}
