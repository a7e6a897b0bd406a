//! Workload replay against a gate on a manual clock

use crate::config::{Mode, Workload};
use rategate::{EventGate, GateError, GateSettings, ManualClock, RateGate, SplitGate};
use serde::Serialize;

/// Outcome of one replay
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub mode: Mode,
    pub offered: u64,
    pub admitted: u64,
    pub rejected: u64,
    /// Events allowed per sub-period
    pub target_rate: i64,
    /// Sub-period length in milliseconds
    pub target_period_ms: f64,
    pub granularity: u32,
    /// Admitted events per second of simulated time
    pub admitted_per_second: f64,
}

/// Offer `workload` to a fresh gate built from `settings`
///
/// The gate runs on a [`ManualClock`] frozen at zero, so the report depends
/// only on the inputs.
pub fn run(settings: &GateSettings, workload: &Workload) -> Result<Report, GateError> {
    let clock = ManualClock::frozen(0);
    let mut gate = RateGate::from_settings(settings, clock.clone())?;

    let tick_ms = u64::try_from(workload.tick.as_millis()).unwrap_or(u64::MAX);
    let ticks = workload.duration.as_millis() / workload.tick.as_millis().max(1);

    let mut offered = 0u64;
    let mut admitted = 0u64;

    for tick in 0..ticks {
        for _ in 0..workload.events_per_tick {
            let passed = match workload.mode {
                Mode::Combined => gate.decide(),
                Mode::Split => {
                    let open = gate.open();
                    gate.register();
                    open
                }
            };

            offered += 1;
            if passed {
                admitted += 1;
            }
        }

        if tick % 1000 == 999 {
            tracing::debug!(tick, offered, admitted, "replay progress");
        }
        clock.advance_by(tick_ms);
    }

    let simulated_secs = workload.duration.as_secs_f64();
    let report = Report {
        mode: workload.mode,
        offered,
        admitted,
        rejected: offered - admitted,
        target_rate: gate.target_rate(),
        target_period_ms: gate.target_period().as_secs_f64() * 1000.0,
        granularity: gate.schedule().granularity(),
        admitted_per_second: if simulated_secs > 0.0 {
            admitted as f64 / simulated_secs
        } else {
            0.0
        },
    };

    tracing::info!(
        offered = report.offered,
        admitted = report.admitted,
        rejected = report.rejected,
        "replay finished"
    );

    Ok(report)
}
