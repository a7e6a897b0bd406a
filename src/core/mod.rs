//! Core components of the rategate library
//!
//! This module contains the fundamental building blocks:
//! - [`schedule`]: Sub-period derivation and validation
//! - [`rate_gate`]: The sliding-deadline gate
//! - [`clock`]: Time sources the gate reads from
//! - [`shared`]: Mutex decorator for callers that need to share a gate

pub mod clock;
pub mod rate_gate;
pub mod schedule;
pub mod shared;
#[cfg(test)]
mod tests;

pub use clock::{ClockError, ManualClock, MonotonicClock, TimeSource};
pub use rate_gate::{EventGate, RateGate, SplitGate};
pub use schedule::{GateSettings, Granularity, Schedule};
pub use shared::SharedGate;

use std::time::Duration;
use thiserror::Error;

/// Errors raised when a gate is configured
///
/// Configuration is validated after the requested period and rate have been
/// divided by the granularity. Nothing is ever clamped: an out-of-range
/// request fails and any existing gate keeps its previous schedule.
///
/// # Example
///
/// ```
/// use rategate::{GateError, RateGate};
/// use std::time::Duration;
///
/// match RateGate::new(100, Duration::from_millis(5)) {
///     Err(GateError::PeriodTooSmall { period, .. }) => {
///         println!("{period:?} is too short to gate on");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Events per sub-period is zero or does not fit in an `i32`
    #[error("rate value is invalid: {rate} events split {granularity} ways")]
    InvalidRate { rate: u64, granularity: u32 },
    /// Sub-period is longer than one hour
    #[error("period is too high: {period:?} split {granularity} ways exceeds 1h")]
    PeriodTooHigh { period: Duration, granularity: u32 },
    /// Sub-period is shorter than 10 ms
    #[error("period is too small: {period:?} split {granularity} ways is under 10ms")]
    PeriodTooSmall { period: Duration, granularity: u32 },
}

/// Result type for gate configuration
pub type Result<T> = std::result::Result<T, GateError>;
