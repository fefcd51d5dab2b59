//! Cadence simulator - drives the drift controller against a simulated host
//!
//! Runs a scripted scenario (lagging animation, stopped timeline, scrubbing,
//! audio hiccups, strategy switches) frame by frame and prints how well the
//! audio stayed in step with the timeline.
//!
//! ## Usage
//!
//! ```text
//! cadence-sim [SCENARIO.yaml] [--debug] [--strategy KEY] [--write-default PATH]
//! ```
//!
//! - `SCENARIO.yaml`: scenario to run (default: `~/.config/cadence/scenario.yaml`,
//!   or the built-in scenario if that doesn't exist)
//! - `--debug`: show the debug panel, logging each telemetry refresh
//! - `--strategy KEY`: override the scenario's strategy (`time_scale`,
//!   `audio_time_set`, `audio_pitch`, or `none`)
//! - `--write-default PATH`: write the built-in scenario to PATH and exit

mod host;
mod run;
mod scenario;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use cadence_core::config::{default_config_path, load_config, save_config};
use cadence_core::Strategy;

use scenario::Scenario;

/// Parsed command line
#[derive(Debug, Default)]
struct Args {
    scenario_path: Option<PathBuf>,
    debug: bool,
    strategy: Option<Option<Strategy>>,
    write_default: Option<PathBuf>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--debug" => parsed.debug = true,
            "--strategy" => {
                let value = args.next().context("--strategy needs a value")?;
                let strategy = if value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(value.parse::<Strategy>().map_err(anyhow::Error::msg)?)
                };
                parsed.strategy = Some(strategy);
            }
            "--write-default" => {
                let path = args.next().context("--write-default needs a path")?;
                parsed.write_default = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => bail!("Unknown flag: {}", flag),
            path => {
                if parsed.scenario_path.is_some() {
                    bail!("Only one scenario file can be given");
                }
                parsed.scenario_path = Some(PathBuf::from(path));
            }
        }
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for per-correction output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    if let Some(path) = &args.write_default {
        save_config(&Scenario::default(), path)?;
        println!("Wrote default scenario to {}", path.display());
        return Ok(());
    }

    let mut scenario = match &args.scenario_path {
        Some(path) => Scenario::load(path)?,
        None => load_config::<Scenario>(&default_config_path("scenario.yaml")),
    };
    if let Some(strategy) = args.strategy {
        scenario.settings.strategy = strategy;
    }

    let report = run::run(&scenario, args.debug)?;
    println!();
    print!("{}", report);
    if report.count("faulted") > 0 {
        log::warn!("[SIM] {} ticks faulted", report.count("faulted"));
    }

    let hard_jump = scenario.settings.thresholds.hard_jump;
    match report.final_drift {
        Some(drift) if drift.abs() > hard_jump => {
            bail!("Playback ended {:.3}s away from the timeline", drift)
        }
        _ => Ok(()),
    }
}
