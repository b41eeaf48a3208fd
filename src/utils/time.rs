use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Default bound on how stale a fetched book may be, in seconds
pub const DEFAULT_MAX_BOOK_DELAY_SECS: u64 = 3600;

/// Time inputs used to derive a book's `now`
///
/// The freshest order timestamp on the book is a lower bound for the ledger
/// clock; `unix_now - max_book_delay` caps how far behind that may lag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookClock {
    pub unix_now: u64,
    pub max_book_delay: u64,
}

impl BookClock {
    pub fn at(unix_now: u64) -> Self {
        Self {
            unix_now,
            max_book_delay: DEFAULT_MAX_BOOK_DELAY_SECS,
        }
    }

    pub fn with_max_book_delay(mut self, max_book_delay: u64) -> Self {
        self.max_book_delay = max_book_delay;
        self
    }

    /// Book-wide `now` given the newest leaf timestamp seen on the book
    pub fn book_now(&self, max_leaf_timestamp: Option<u64>) -> u64 {
        let floor = self.unix_now.saturating_sub(self.max_book_delay);
        max_leaf_timestamp.map_or(floor, |ts| floor.max(ts))
    }
}

/// Convert a unix timestamp in seconds to UTC
pub fn to_utc(unix_secs: u64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(i64::try_from(unix_secs).ok()?, 0)
}

/// Timer for measuring operation latency
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Stop the timer and return elapsed duration
    pub fn stop(self) -> Duration {
        self.start.elapsed()
    }
}

/// Wall clock access, kept out of the decoding core
pub struct Clock;

impl Clock {
    /// Seconds since the Unix epoch
    pub fn unix_seconds() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    pub fn book_clock() -> BookClock {
        BookClock::at(Self::unix_seconds())
    }
}
