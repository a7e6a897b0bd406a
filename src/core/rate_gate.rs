//! Sliding-deadline rate gate
//!
//! This module provides [`RateGate`], which admits or rejects a stream of
//! events so that the long-run admitted rate stays at or under a configured
//! maximum. Instead of counting in fixed windows, the gate keeps a deadline:
//! when a sub-period's allowance runs out early, the deadline is pushed
//! forward by exactly the time the excess events would have needed, and the
//! gate stays closed until then.

use super::clock::{MonotonicClock, TimeSource};
use super::schedule::{GateSettings, Granularity, Schedule};
use super::Result;
use std::time::Duration;

/// Gate deciding whether an event may proceed
///
/// This is the combined check-and-register contract: one call both asks for
/// admission and records the event when it is admitted.
pub trait EventGate {
    /// Reopen the gate and forget every registered event.
    fn reset(&mut self);

    /// Decide whether the current event may proceed
    ///
    /// Returns `true` when the event is admitted. Rejected events leave the
    /// gate untouched.
    fn decide(&mut self) -> bool;
}

/// Split check/register contract
///
/// [`open`](SplitGate::open) only looks, [`register`](SplitGate::register)
/// always records. Driving a gate as "`open()` then `register()` on every
/// attempt" is **not** equivalent to [`EventGate::decide`]: rejected attempts
/// still count against the allowance and push the deadline further out, so
/// fewer events get through under sustained overload.
///
/// # Example
///
/// ```
/// use rategate::{Granularity, ManualClock, RateGate, SplitGate};
/// use std::time::Duration;
///
/// let clock = ManualClock::frozen(0);
/// let mut gate =
///     RateGate::with_clock(800, Duration::from_secs(1), Granularity::Auto, clock.clone())
///         .unwrap();
///
/// let mut admitted = 0;
/// for _ in 0..800 {
///     if gate.open() {
///         admitted += 1;
///     }
///     gate.register();
/// }
/// assert_eq!(admitted, 16);
///
/// // Every attempt was registered, so the gate stays shut for the full second
/// clock.advance_by(991);
/// assert!(!gate.open());
/// clock.advance_by(9);
/// assert!(gate.open());
/// ```
pub trait SplitGate {
    /// True when an event arriving now would be admitted. Never mutates.
    fn open(&self) -> bool;

    /// Record an event, whether or not it was checked first.
    fn register(&mut self);
}

/// Rate gate driven by a pluggable [`TimeSource`]
///
/// The requested "`rate` per `period`" is split into sub-periods (see
/// [`Schedule`]). Within a sub-period events are admitted until the
/// allowance is used up or the sub-period elapses. At that point the gate
/// compares the events it saw with what the elapsed time actually allows and,
/// if the caller ran ahead, closes until the surplus has been paid back.
///
/// # Thread Safety
///
/// The gate is not thread-safe. Every mutating operation takes `&mut self`,
/// so sharing one across threads requires the caller to serialize access,
/// for instance with [`SharedGate`](super::SharedGate).
///
/// # Example
///
/// ```
/// use rategate::{EventGate, Granularity, ManualClock, RateGate};
/// use std::time::Duration;
///
/// let clock = ManualClock::frozen(0);
/// let mut gate =
///     RateGate::with_clock(1, Duration::from_secs(1), Granularity::Auto, clock.clone())
///         .unwrap();
///
/// assert!(gate.decide());
/// clock.advance_by(999);
/// assert!(!gate.decide());
/// clock.advance_by(2);
/// assert!(gate.decide());
/// ```
#[derive(Debug, Clone)]
pub struct RateGate<C: TimeSource = MonotonicClock> {
    clock: C,
    schedule: Schedule,
    deadline_ns: i64,
    count: i64,
}

impl RateGate<MonotonicClock> {
    /// Gate admitting `rate` events per `period` with auto granularity
    ///
    /// # Errors
    ///
    /// Returns a [`GateError`](super::GateError) when the derived sub-period
    /// schedule is out of range.
    pub fn new(rate: u64, period: Duration) -> Result<Self> {
        Self::with_clock(rate, period, Granularity::Auto, MonotonicClock::new())
    }

    /// Gate admitting `rate` events per `period` split `granularity` ways.
    pub fn with_granularity(
        rate: u64,
        period: Duration,
        granularity: Granularity,
    ) -> Result<Self> {
        Self::with_clock(rate, period, granularity, MonotonicClock::new())
    }
}

impl<C: TimeSource> RateGate<C> {
    /// Gate reading time from `clock`
    ///
    /// The gate starts open with its deadline at the clock's current reading.
    pub fn with_clock(
        rate: u64,
        period: Duration,
        granularity: Granularity,
        clock: C,
    ) -> Result<Self> {
        let schedule = Schedule::new(rate, period, granularity)?;
        Ok(Self::from_schedule(schedule, clock))
    }

    /// Gate described by `settings`, reading time from `clock`.
    pub fn from_settings(settings: &GateSettings, clock: C) -> Result<Self> {
        Self::with_clock(settings.rate, settings.period, settings.granularity, clock)
    }

    /// Gate running an already validated schedule.
    pub fn from_schedule(schedule: Schedule, clock: C) -> Self {
        trace_schedule(&schedule);
        let deadline_ns = clock.now_ns();
        RateGate {
            clock,
            schedule,
            deadline_ns,
            count: 0,
        }
    }

    /// Replace the schedule
    ///
    /// The registered count and the deadline are kept: a gate closed by a
    /// burst stays closed after reconfiguration. On error the previous
    /// schedule stays in effect.
    pub fn configure(
        &mut self,
        rate: u64,
        period: Duration,
        granularity: Granularity,
    ) -> Result<()> {
        let schedule = Schedule::new(rate, period, granularity)?;
        trace_schedule(&schedule);
        self.schedule = schedule;
        Ok(())
    }

    /// Current schedule
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Events allowed per sub-period
    pub fn target_rate(&self) -> i64 {
        self.schedule.rate
    }

    /// Length of one sub-period
    pub fn target_period(&self) -> Duration {
        self.schedule.period()
    }

    /// Instant, in the clock's nanoseconds, before which the gate is closed
    pub fn deadline_ns(&self) -> i64 {
        self.deadline_ns
    }

    /// Events registered since the last rollover
    pub fn pending(&self) -> i64 {
        self.count
    }

    /// Time source the gate reads from
    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn record(&mut self, now_ns: i64) {
        let period_ns = self.schedule.period_ns;
        let rate = self.schedule.rate;
        let elapsed_ns = now_ns - self.deadline_ns;

        self.count += 1;

        if self.count < rate && elapsed_ns < period_ns {
            return;
        }

        // Allowance earned by the time since the last rollover
        let allowed = rate as f64 * elapsed_ns as f64 / period_ns as f64;
        let excess = self.count as f64 - allowed;

        if excess > 0.0 {
            let delay_ns = (period_ns as f64 * excess / rate as f64).round() as i64;
            tracing::trace!(count = self.count, excess, delay_ns, "rate gate closing");
            self.deadline_ns = now_ns.saturating_add(delay_ns);
        } else {
            self.deadline_ns = now_ns;
        }

        self.count = 0;
    }
}

fn trace_schedule(schedule: &Schedule) {
    tracing::debug!(
        granularity = schedule.granularity(),
        rate = schedule.rate(),
        period_ns = schedule.period_ns(),
        "rate gate schedule applied"
    );
}

impl<C: TimeSource> EventGate for RateGate<C> {
    fn reset(&mut self) {
        self.deadline_ns = self.clock.now_ns();
        self.count = 0;
    }

    fn decide(&mut self) -> bool {
        if self.schedule.is_degenerate() {
            return false;
        }

        let now_ns = self.clock.now_ns();
        if now_ns < self.deadline_ns {
            return false;
        }

        // Admitted even when this event is the one that closes the gate
        self.record(now_ns);
        true
    }
}

impl<C: TimeSource> SplitGate for RateGate<C> {
    fn open(&self) -> bool {
        !self.schedule.is_degenerate() && self.clock.elapsed_ns(self.deadline_ns) >= 0
    }

    fn register(&mut self) {
        if self.schedule.is_degenerate() {
            return;
        }
        let now_ns = self.clock.now_ns();
        self.record(now_ns);
    }
}
