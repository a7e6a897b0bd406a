//! Replay tool configuration and CLI argument parsing
//!
//! Settings come from three layers:
//! 1. CLI arguments (highest priority)
//! 2. Environment variables with the RATEGATE_ prefix
//! 3. An optional TOML/YAML/JSON file given with `--config`, whose keys can be
//!    overridden by `RATEGATE__<SECTION>__<KEY>` environment variables
//!
//! Anything left unset falls back to the defaults listed in `--help`.
//!
//! # Example Usage
//!
//! ```bash
//! # 800 per second offered 1000 per second for 10 seconds
//! rategate --rate 800 --period-ms 1000 --events-per-tick 1 --tick-ms 1
//!
//! # Same, from the environment
//! export RATEGATE_RATE=800
//! export RATEGATE_DURATION_MS=10000
//! rategate --json
//!
//! # From a file, with one value overridden
//! rategate --config gate.toml --mode split
//! ```

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use rategate::{GateSettings, Granularity};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_RATE: u64 = 800;
const DEFAULT_PERIOD_MS: u64 = 1000;
const DEFAULT_EVENTS_PER_TICK: u32 = 1;
const DEFAULT_TICK_MS: u64 = 1;
const DEFAULT_DURATION_MS: u64 = 10_000;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Fully resolved configuration for one replay
#[derive(Debug, Clone)]
pub struct Config {
    /// Gate under test
    pub gate: GateSettings,
    /// Synthetic event stream offered to the gate
    pub workload: Workload,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
    /// Print the report as JSON instead of text
    pub json: bool,
}

/// Synthetic event stream
///
/// `events_per_tick` events are offered at the same instant, then the clock
/// moves `tick` forward, until `duration` has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    /// Which gate contract drives the replay
    pub mode: Mode,
    /// Events offered per tick
    pub events_per_tick: u32,
    /// Clock step between ticks
    pub tick: Duration,
    /// Total simulated time
    pub duration: Duration,
}

/// Gate contract used by the replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// `decide()` on every event
    #[default]
    Combined,
    /// `open()` then `register()` on every event
    Split,
}

impl std::str::FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "combined" => Ok(Mode::Combined),
            "split" => Ok(Mode::Split),
            _ => Err(anyhow!(
                "Invalid mode: {}. Valid options are: combined, split",
                s
            )),
        }
    }
}

/// Configuration file layout
///
/// Every key is optional; CLI arguments and environment variables override
/// whatever the file sets.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub gate: FileGate,
    pub workload: FileWorkload,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileGate {
    pub rate: Option<u64>,
    pub period_ms: Option<u64>,
    pub granularity: Option<Granularity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileWorkload {
    pub mode: Option<Mode>,
    pub events_per_tick: Option<u32>,
    pub tick_ms: Option<u64>,
    pub duration_ms: Option<u64>,
}

impl FileConfig {
    /// Load a configuration file; the format follows the file extension.
    ///
    /// `RATEGATE__<SECTION>__<KEY>` environment variables (for example
    /// `RATEGATE__GATE__RATE`) override keys from the file.
    pub fn load(path: &PathBuf) -> Result<Self> {
        Self::layered(config::File::from(path.as_path()), environment())
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    fn layered<S>(file: S, env: config::Environment) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let file = config::Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?;
        Ok(file)
    }
}

/// Nested environment overrides for the file layer
fn environment() -> config::Environment {
    config::Environment::with_prefix("RATEGATE")
        .separator("__")
        .try_parsing(true)
}

/// Command-line arguments for the replay tool
///
/// All arguments can also be set via environment variables with the
/// RATEGATE_ prefix. CLI arguments take precedence over environment variables.
#[derive(Parser, Debug, Default)]
#[command(
    name = "rategate",
    about = "Replay a synthetic event stream through a rate gate",
    long_about = "Replays a synthetic event stream through a rate gate on a manual clock and reports how many events were admitted.\n\nThe replay never sleeps: simulated time advances explicitly, so the same arguments always produce the same report.\n\nEnvironment variables with RATEGATE_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    #[arg(
        long,
        value_name = "FILE",
        help = "Configuration file (toml, yaml or json)",
        env = "RATEGATE_CONFIG"
    )]
    pub config: Option<PathBuf>,

    // Gate
    #[arg(
        long,
        value_name = "N",
        help = "Events allowed per period [default: 800]",
        env = "RATEGATE_RATE"
    )]
    pub rate: Option<u64>,
    #[arg(
        long,
        value_name = "MS",
        help = "Period in milliseconds [default: 1000]",
        env = "RATEGATE_PERIOD_MS"
    )]
    pub period_ms: Option<u64>,
    #[arg(
        long,
        value_name = "DIVISOR",
        help = "Sub-period divisor, or \"auto\" [default: auto]",
        env = "RATEGATE_GRANULARITY"
    )]
    pub granularity: Option<Granularity>,

    // Workload
    #[arg(
        long,
        value_name = "MODE",
        help = "Gate contract: combined, split [default: combined]",
        env = "RATEGATE_MODE"
    )]
    pub mode: Option<Mode>,
    #[arg(
        long,
        value_name = "N",
        help = "Events offered per tick [default: 1]",
        env = "RATEGATE_EVENTS_PER_TICK"
    )]
    pub events_per_tick: Option<u32>,
    #[arg(
        long,
        value_name = "MS",
        help = "Milliseconds between ticks [default: 1]",
        env = "RATEGATE_TICK_MS"
    )]
    pub tick_ms: Option<u64>,
    #[arg(
        long,
        value_name = "MS",
        help = "Simulated duration in milliseconds [default: 10000]",
        env = "RATEGATE_DURATION_MS"
    )]
    pub duration_ms: Option<u64>,

    // Output
    #[arg(long, help = "Print the report as JSON", env = "RATEGATE_JSON")]
    pub json: bool,
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace [default: info]",
        env = "RATEGATE_LOG_LEVEL"
    )]
    pub log_level: Option<String>,
}

impl Config {
    /// Build configuration from CLI arguments, environment and config file
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or the resulting
    /// workload is invalid.
    pub fn from_env_and_args() -> Result<Self> {
        // Clap resolves CLI arguments over environment variables
        let args = Args::parse();

        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        Self::merge(args, file)
    }

    /// Layer parsed arguments over a file configuration and validate.
    pub fn merge(args: Args, file: FileConfig) -> Result<Self> {
        let gate = GateSettings {
            rate: args.rate.or(file.gate.rate).unwrap_or(DEFAULT_RATE),
            period: Duration::from_millis(
                args.period_ms
                    .or(file.gate.period_ms)
                    .unwrap_or(DEFAULT_PERIOD_MS),
            ),
            granularity: args
                .granularity
                .or(file.gate.granularity)
                .unwrap_or_default(),
        };

        let workload = Workload {
            mode: args.mode.or(file.workload.mode).unwrap_or_default(),
            events_per_tick: args
                .events_per_tick
                .or(file.workload.events_per_tick)
                .unwrap_or(DEFAULT_EVENTS_PER_TICK),
            tick: Duration::from_millis(
                args.tick_ms
                    .or(file.workload.tick_ms)
                    .unwrap_or(DEFAULT_TICK_MS),
            ),
            duration: Duration::from_millis(
                args.duration_ms
                    .or(file.workload.duration_ms)
                    .unwrap_or(DEFAULT_DURATION_MS),
            ),
        };

        let config = Config {
            gate,
            workload,
            log_level: args
                .log_level
                .or(file.log_level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            json: args.json,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// The gate schedule is checked here so that a bad rate or period is
    /// reported before logging starts.
    fn validate(&self) -> Result<()> {
        self.gate
            .schedule()
            .context("gate settings are out of range")?;

        if self.workload.events_per_tick == 0 {
            return Err(anyhow!("events per tick must be at least 1"));
        }
        if self.workload.tick.is_zero() {
            return Err(anyhow!(
                "tick must be at least 1ms, otherwise simulated time never advances"
            ));
        }
        if self.workload.duration < self.workload.tick {
            return Err(anyhow!(
                "duration ({:?}) must cover at least one tick ({:?})",
                self.workload.duration,
                self.workload.tick
            ));
        }

        Ok(())
    }
}
