//! # rategate
//!
//! A sliding-deadline event rate gate for throttling a caller's own actions.
//!
//! ## Overview
//!
//! A [`RateGate`] answers one question, many times per second: may this event
//! proceed? It keeps the long-run rate of admitted events at or under a
//! configured "N events per period":
//! - **No edge bursts**: there are no fixed windows to straddle
//! - **Fast feedback**: accounting runs over short sub-periods
//! - **Allocation-free**: a decision is a clock read and a few integer ops
//! - **Deterministic**: time comes from a pluggable [`TimeSource`]
//!
//! ## Quick Start
//!
//! ```
//! use rategate::{EventGate, RateGate};
//! use std::time::Duration;
//!
//! // At most 100 events per second
//! let mut gate = RateGate::new(100, Duration::from_secs(1)).unwrap();
//!
//! if gate.decide() {
//!     println!("event admitted");
//! } else {
//!     println!("event rejected");
//! }
//! ```
//!
//! ## How It Works
//!
//! The requested period is split into sub-periods (the granularity) and the
//! rate is divided the same way, see [`Schedule`]. Within a sub-period events
//! pass until its allowance is used up or it elapses. The gate then compares
//! the events it admitted with what the elapsed time allows. When the caller
//! ran ahead, the gate's deadline moves forward by exactly the time the
//! surplus needs and every event before that deadline is rejected.
//!
//! ## Testing With a Manual Clock
//!
//! ```
//! use rategate::{EventGate, Granularity, ManualClock, RateGate};
//! use std::time::Duration;
//!
//! let clock = ManualClock::from_wall_clock("2017-01-01 12:00:00.000 UTC", 0).unwrap();
//! let mut gate =
//!     RateGate::with_clock(800, Duration::from_secs(1), Granularity::Auto, clock.clone())
//!         .unwrap();
//!
//! // 800 per second becomes 16 per 20 ms
//! let admitted = (0..800).filter(|_| gate.decide()).count();
//! assert_eq!(admitted, 16);
//!
//! clock.advance_by(20);
//! assert!(gate.decide());
//! ```
//!
//! ## Gate Contracts
//!
//! - [`EventGate`]: `decide()` checks and registers in one call. Rejected
//!   events are not counted. This is the recommended contract.
//! - [`SplitGate`]: `open()` only looks, `register()` always counts. Useful
//!   for recording events that were never gated; not equivalent to `decide()`
//!   when rejected attempts are registered too.
//!
//! [`RateGate::configure`] swaps the schedule but keeps the registered count
//! and the deadline.
//!
//! ## Thread Safety
//!
//! The gate itself is not thread-safe. For concurrent access, wrap it in a
//! [`SharedGate`]:
//!
//! ```
//! use rategate::{RateGate, SharedGate};
//! use std::time::Duration;
//!
//! let gate = SharedGate::new(RateGate::new(100, Duration::from_secs(1)).unwrap());
//! ```
//!
//! ## Features
//!
//! - `serde`: `Serialize`/`Deserialize` for [`GateSettings`] and [`Granularity`]
//! - `bin`: the `rategate` workload replay tool

pub mod core;

pub use core::{
    ClockError, EventGate, GateError, GateSettings, Granularity, ManualClock, MonotonicClock,
    RateGate, Schedule, SharedGate, SplitGate, TimeSource,
};
