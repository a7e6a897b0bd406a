//! Time sources for the rate gate
//!
//! The gate never reads a global clock. It asks a [`TimeSource`] for the
//! current instant in nanoseconds, which keeps the decision logic
//! deterministic under test:
//!
//! - [`MonotonicClock`]: production clock backed by [`Instant`]
//! - [`ManualClock`]: frozen clock that only moves when told to

use chrono::{DateTime, NaiveDateTime, Utc};
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

const WALL_CLOCK_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Source of monotonic nanosecond readings
///
/// Readings share an arbitrary origin that stays fixed for the lifetime of
/// the process. Only differences between readings are meaningful.
pub trait TimeSource {
    /// Current instant in nanoseconds
    fn now_ns(&self) -> i64;

    /// Nanoseconds elapsed since `since_ns`
    ///
    /// Must be numerically equal to `self.now_ns() - since_ns`.
    fn elapsed_ns(&self, since_ns: i64) -> i64 {
        self.now_ns() - since_ns
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now_ns(&self) -> i64 {
        (**self).now_ns()
    }

    fn elapsed_ns(&self, since_ns: i64) -> i64 {
        (**self).elapsed_ns(since_ns)
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn now_ns(&self) -> i64 {
        (**self).now_ns()
    }

    fn elapsed_ns(&self, since_ns: i64) -> i64 {
        (**self).elapsed_ns(since_ns)
    }
}

/// Monotonic clock backed by [`Instant`]
///
/// All instances measure from the same process-wide origin, so readings from
/// two `MonotonicClock` values can be compared directly.
///
/// # Example
///
/// ```
/// use rategate::{MonotonicClock, TimeSource};
///
/// let clock = MonotonicClock::new();
/// let start = clock.now_ns();
/// assert!(clock.elapsed_ns(start) >= 0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl MonotonicClock {
    /// Create a new monotonic clock.
    pub fn new() -> Self {
        Self
    }

    fn origin() -> Instant {
        static ORIGIN: OnceLock<Instant> = OnceLock::new();
        *ORIGIN.get_or_init(Instant::now)
    }
}

impl TimeSource for MonotonicClock {
    fn now_ns(&self) -> i64 {
        // Saturates after ~292 years of process uptime
        i64::try_from(Self::origin().elapsed().as_nanos()).unwrap_or(i64::MAX)
    }
}

/// Errors raised while seeding a [`ManualClock`] from a wall-clock string
#[derive(Error, Debug)]
pub enum ClockError {
    /// The text is neither `YYYY-MM-DD HH:MM:SS[.fff] UTC` nor RFC 3339
    #[error("unparseable wall-clock time: {0}")]
    Parse(#[from] chrono::ParseError),
    /// The instant cannot be represented in nanoseconds since the Unix epoch
    #[error("wall-clock time out of range: {0}")]
    OutOfRange(String),
}

/// Manually driven clock for deterministic tests
///
/// The clock is frozen at construction and only moves through
/// [`advance`](ManualClock::advance), [`advance_by`](ManualClock::advance_by)
/// or [`set_ns`](ManualClock::set_ns). Clones share one timeline, so a test
/// can hand one clone to a gate and keep another to move time.
///
/// # Example
///
/// ```
/// use rategate::{ManualClock, TimeSource};
///
/// let clock = ManualClock::frozen(0);
/// let handle = clock.clone();
///
/// handle.advance_by(250);
/// assert_eq!(clock.now_ns(), 250_000_000);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock frozen at `now_ns`.
    pub fn frozen(now_ns: i64) -> Self {
        Self {
            now_ns: Arc::new(AtomicI64::new(now_ns)),
        }
    }

    /// Create a clock frozen at a wall-clock instant plus `offset_ms`
    ///
    /// Accepts `2017-01-01 12:00:00.000 UTC` style text or RFC 3339. The
    /// reading is nanoseconds since the Unix epoch, which keeps failures easy
    /// to correlate with the seed.
    pub fn from_wall_clock(text: &str, offset_ms: i64) -> Result<Self, ClockError> {
        let trimmed = text.trim();
        let instant = match trimmed.strip_suffix("UTC") {
            Some(naive) => {
                NaiveDateTime::parse_from_str(naive.trim_end(), WALL_CLOCK_FORMAT)?.and_utc()
            }
            None => DateTime::parse_from_rfc3339(trimmed)?.with_timezone(&Utc),
        };

        let out_of_range = || ClockError::OutOfRange(trimmed.to_string());
        let base = instant.timestamp_nanos_opt().ok_or_else(out_of_range)?;
        let offset = offset_ms.checked_mul(1_000_000).ok_or_else(out_of_range)?;
        let now_ns = base.checked_add(offset).ok_or_else(out_of_range)?;

        Ok(Self::frozen(now_ns))
    }

    /// Move the clock forward by `delta_ms` milliseconds.
    pub fn advance_by(&self, delta_ms: u64) {
        self.advance(Duration::from_millis(delta_ms));
    }

    /// Move the clock forward by a duration, saturating at `i64::MAX`.
    pub fn advance(&self, delta: Duration) {
        let delta_ns = i64::try_from(delta.as_nanos()).unwrap_or(i64::MAX);
        let _ = self
            .now_ns
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |now| {
                Some(now.saturating_add(delta_ns))
            });
    }

    /// Set the clock to an absolute reading. This is the only way to move it
    /// backwards.
    pub fn set_ns(&self, now_ns: i64) {
        self.now_ns.store(now_ns, Ordering::Relaxed);
    }
}

impl TimeSource for ManualClock {
    fn now_ns(&self) -> i64 {
        self.now_ns.load(Ordering::Relaxed)
    }
}
