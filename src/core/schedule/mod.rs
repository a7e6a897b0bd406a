//! Sub-period schedule derivation for the rate gate
//!
//! A caller asks for "N events per period". The gate does its accounting over
//! shorter sub-periods so that bursts are detected and corrected quickly. This
//! module turns the caller's request into a validated [`Schedule`]: a
//! sub-period length and the number of events allowed in each sub-period.

use super::{GateError, Result};
use std::num::NonZeroU32;
use std::time::Duration;


/// Shortest accepted sub-period
pub const MIN_PERIOD: Duration = Duration::from_millis(10);

/// Longest accepted sub-period
pub const MAX_PERIOD: Duration = Duration::from_secs(3600);

/// Auto granularity keeps at least this many events per sub-period
pub const MIN_AUTO_GRANULARITY_RATE: u64 = 3;

/// Auto granularity never makes sub-periods shorter than this
pub const MIN_AUTO_GRANULARITY_PERIOD_MS: u128 = 20;

/// Divisor applied to the requested period and rate
///
/// # Example
///
/// ```
/// use rategate::Granularity;
///
/// assert_eq!(Granularity::from_divisor(-1), Granularity::Auto);
/// assert_eq!(Granularity::from_divisor(4), Granularity::fixed(4));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    /// Pick the divisor from the rate and period, see [`Granularity::resolve`]
    #[default]
    Auto,
    /// Split the period into exactly this many sub-periods
    Fixed(NonZeroU32),
}

impl Granularity {
    /// Fixed divisor, or [`Granularity::Auto`] when `divisor` is zero.
    pub fn fixed(divisor: u32) -> Self {
        NonZeroU32::new(divisor).map_or(Granularity::Auto, Granularity::Fixed)
    }

    /// Map a signed divisor where any non-positive value means "auto".
    pub fn from_divisor(divisor: i32) -> Self {
        u32::try_from(divisor).map_or(Granularity::Auto, Granularity::fixed)
    }

    /// Resolve to a concrete divisor for the given request
    ///
    /// Auto picks `max(1, min(rate / 3, period_ms / 20))`: sub-periods get
    /// finer as the rate grows, but never shorter than 20 ms and never so
    /// short that a sub-period allows fewer than about 3 events.
    pub fn resolve(self, rate: u64, period: Duration) -> u32 {
        match self {
            Granularity::Fixed(divisor) => divisor.get(),
            Granularity::Auto => {
                let by_rate = saturate(u128::from(rate / MIN_AUTO_GRANULARITY_RATE));
                let by_period = saturate(period.as_millis() / MIN_AUTO_GRANULARITY_PERIOD_MS);
                by_rate.min(by_period).max(1)
            }
        }
    }
}

impl std::str::FromStr for Granularity {
    type Err = String;

    /// Parse `"auto"` or a positive divisor.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Granularity::Auto);
        }
        match s.parse::<u32>().ok().and_then(NonZeroU32::new) {
            Some(divisor) => Ok(Granularity::Fixed(divisor)),
            None => Err(format!(
                "invalid granularity: {s}. Expected \"auto\" or a positive divisor"
            )),
        }
    }
}

fn saturate(divisor: u128) -> u32 {
    u32::try_from(divisor).map_or(i32::MAX as u32, |d| d.min(i32::MAX as u32))
}

/// Validated sub-period schedule
///
/// `rate` events are allowed per `period` nanoseconds. A schedule built
/// through [`Schedule::new`] always has `rate` in `1..=i32::MAX` and `period`
/// in `[10 ms, 1 h]`.
///
/// # Example
///
/// ```
/// use rategate::{Granularity, Schedule};
/// use std::time::Duration;
///
/// // 800 per second splits into 50 sub-periods of 20 ms, 16 events each
/// let schedule = Schedule::new(800, Duration::from_secs(1), Granularity::Auto).unwrap();
/// assert_eq!(schedule.rate(), 16);
/// assert_eq!(schedule.period(), Duration::from_millis(20));
/// assert_eq!(schedule.granularity(), 50);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub(crate) rate: i64,
    pub(crate) period_ns: i64,
    pub(crate) granularity: u32,
}

impl Schedule {
    /// Derive a schedule from `rate` events per `period`
    ///
    /// # Errors
    ///
    /// - [`GateError::InvalidRate`]: the per-sub-period allowance is zero or
    ///   exceeds `i32::MAX`
    /// - [`GateError::PeriodTooHigh`]: the sub-period is longer than one hour
    /// - [`GateError::PeriodTooSmall`]: the sub-period is shorter than 10 ms
    pub fn new(rate: u64, period: Duration, granularity: Granularity) -> Result<Self> {
        let divisor = granularity.resolve(rate, period);

        let effective_rate = rate / u64::from(divisor);
        let effective_period = period.as_nanos() / u128::from(divisor);

        if effective_rate == 0 || effective_rate > i32::MAX as u64 {
            return Err(GateError::InvalidRate {
                rate,
                granularity: divisor,
            });
        }
        if effective_period > MAX_PERIOD.as_nanos() {
            return Err(GateError::PeriodTooHigh {
                period,
                granularity: divisor,
            });
        }
        if effective_period < MIN_PERIOD.as_nanos() {
            return Err(GateError::PeriodTooSmall {
                period,
                granularity: divisor,
            });
        }

        // Both bounded by the checks above
        Ok(Schedule {
            rate: effective_rate as i64,
            period_ns: effective_period as i64,
            granularity: divisor,
        })
    }

    /// Events allowed per sub-period
    pub fn rate(&self) -> i64 {
        self.rate
    }

    /// Length of one sub-period
    pub fn period(&self) -> Duration {
        Duration::from_nanos(self.period_ns.max(0) as u64)
    }

    /// Length of one sub-period in nanoseconds
    pub fn period_ns(&self) -> i64 {
        self.period_ns
    }

    /// Divisor the requested period was split by
    pub fn granularity(&self) -> u32 {
        self.granularity
    }

    /// True when the schedule can never admit anything
    pub(crate) fn is_degenerate(&self) -> bool {
        self.rate <= 0 || self.period_ns <= 0
    }
}

/// Description of a gate: `rate` events per `period`
///
/// A plain value that can be built in code, or deserialized with the `serde`
/// feature (period in milliseconds, granularity as `"auto"` or an integer).
///
/// # Example
///
/// ```
/// use rategate::{GateSettings, Granularity};
/// use std::time::Duration;
///
/// let settings = GateSettings::per_second(100).with_granularity(Granularity::fixed(10));
/// assert_eq!(settings.period, Duration::from_secs(1));
///
/// let schedule = settings.schedule().unwrap();
/// assert_eq!(schedule.rate(), 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GateSettings {
    /// Events allowed per period
    pub rate: u64,
    /// Requested period
    #[cfg_attr(feature = "serde", serde(rename = "period_ms", with = "millis"))]
    pub period: Duration,
    /// Sub-period divisor
    #[cfg_attr(feature = "serde", serde(default))]
    pub granularity: Granularity,
}

impl GateSettings {
    /// `rate` events per `period` with auto granularity.
    pub fn new(rate: u64, period: Duration) -> Self {
        GateSettings {
            rate,
            period,
            granularity: Granularity::Auto,
        }
    }

    /// `n` events per second.
    pub fn per_second(n: u64) -> Self {
        Self::new(n, Duration::from_secs(1))
    }

    /// `n` events per minute.
    pub fn per_minute(n: u64) -> Self {
        Self::new(n, Duration::from_secs(60))
    }

    /// `n` events per hour.
    pub fn per_hour(n: u64) -> Self {
        Self::new(n, Duration::from_secs(3600))
    }

    /// `n` events per day.
    pub fn per_day(n: u64) -> Self {
        Self::new(n, Duration::from_secs(86400))
    }

    /// Replace the granularity.
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Validate and derive the sub-period schedule.
    pub fn schedule(&self) -> Result<Schedule> {
        Schedule::new(self.rate, self.period, self.granularity)
    }
}

#[cfg(feature = "serde")]
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        period: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(period.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Granularity {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Granularity::Auto => serializer.serialize_str("auto"),
            Granularity::Fixed(divisor) => serializer.serialize_u32(divisor.get()),
        }
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Granularity {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        use serde::de::Error;

        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Divisor(u32),
            Text(String),
        }

        // Environment sources hand numbers over as strings
        match Repr::deserialize(deserializer)? {
            Repr::Divisor(divisor) => NonZeroU32::new(divisor)
                .map(Granularity::Fixed)
                .ok_or_else(|| D::Error::custom("granularity divisor must be positive")),
            Repr::Text(text) => text.parse().map_err(D::Error::custom),
        }
    }
}
