mod config;
mod replay;

use anyhow::Result;

use crate::config::Config;

fn main() -> Result<()> {
    // Parse configuration from environment variables, CLI arguments and file
    let config = Config::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("rategate={}", config.log_level).parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        rate = config.gate.rate,
        period = ?config.gate.period,
        granularity = ?config.gate.granularity,
        mode = ?config.workload.mode,
        "Replaying workload"
    );

    let report = replay::run(&config.gate, &config.workload)?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Gate: {} per {:?} (granularity {}: {} per {:.3}ms)",
            config.gate.rate,
            config.gate.period,
            report.granularity,
            report.target_rate,
            report.target_period_ms
        );
        println!(
            "Workload: {} event(s) every {:?} for {:?}, {:?} mode",
            config.workload.events_per_tick,
            config.workload.tick,
            config.workload.duration,
            report.mode
        );
        println!();
        println!("Offered:  {}", report.offered);
        println!("Admitted: {}", report.admitted);
        println!("Rejected: {}", report.rejected);
        println!("Admitted per second: {:.2}", report.admitted_per_second);
    }

    Ok(())
}
