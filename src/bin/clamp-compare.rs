//! clamp-compare - Current clamp vs dynamic clamp information transfer
//!
//! # Usage
//!
//! ```bash
//! # Ten pyramidal-cell trials with the built-in preset
//! clamp-compare
//!
//! # Interneuron preset, 4 trials, fixed seed
//! clamp-compare --class in --trials 4 --seed 7
//!
//! # Experiment from a JSON config, debug logging
//! clamp-compare --config experiment.json -v
//! ```
//!
//! The report is printed as JSON on stdout. Logging goes to stderr and
//! honors `RUST_LOG`.
//!
//! # Exit Codes
//!
//! - 0: All trials completed
//! - 1: Experiment failed (bad config file, trial budget exhausted, ...)
//! - 2: Invalid arguments

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use spikeinfo::experiment::{ExperimentConfig, TrialRunner};
use spikeinfo::neuron::CellClass;

const DEFAULT_SEED: u64 = 42;

struct Args {
    config: Option<PathBuf>,
    trials: Option<usize>,
    seed: u64,
    class: CellClass,
    verbose: bool,
}

fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(Some(args)) => args,
        Ok(None) => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("Error: {}\n", message);
            print_help();
            return ExitCode::from(2);
        }
    };

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn parse_args(mut iter: impl Iterator<Item = String>) -> Result<Option<Args>, String> {
    let mut args = Args {
        config: None,
        trials: None,
        seed: DEFAULT_SEED,
        class: CellClass::Pyramidal,
        verbose: false,
    };

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => args.verbose = true,
            "-h" | "--help" => return Ok(None),
            "--config" => {
                let path = iter.next().ok_or("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--trials" => {
                let value = iter.next().ok_or("--trials needs a number")?;
                let trials = value
                    .parse::<usize>()
                    .map_err(|_| format!("invalid trial count: {}", value))?;
                args.trials = Some(trials);
            }
            "--seed" => {
                let value = iter.next().ok_or("--seed needs a number")?;
                args.seed = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid seed: {}", value))?;
            }
            "--class" => {
                let value = iter.next().ok_or("--class needs `pc` or `in`")?;
                args.class = CellClass::from_name(&value).map_err(|e| e.to_string())?;
            }
            _ => return Err(format!("Unknown option: {}", arg)),
        }
    }

    Ok(Some(args))
}

fn run(args: &Args) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ExperimentConfig::from_json_file(path)
            .with_context(|| format!("loading experiment config {}", path.display()))?,
        None => ExperimentConfig::for_class(args.class),
    };
    if let Some(trials) = args.trials {
        config.trials = trials;
    }

    log::info!(
        "running {} trials ({} ms, N = {}, seed {})",
        config.trials,
        config.duration,
        config.population_size,
        args.seed
    );

    let runner = TrialRunner::from_config(config).context("building trial runner")?;
    let report = runner.run(args.seed).context("running trials")?;

    log::info!(
        "current clamp {:.4} bits, dynamic clamp {:.4} bits",
        report.current.mean_mi_bits,
        report.dynamic.mean_mi_bits
    );

    let json = serde_json::to_string_pretty(&report).context("serializing report")?;
    println!("{}", json);
    Ok(())
}

fn print_help() {
    eprintln!(
        r#"clamp-compare - Information transfer under current and dynamic clamp

USAGE:
    clamp-compare [OPTIONS]

OPTIONS:
    --config <json>    Experiment config file (overrides --class preset)
    --trials <n>       Number of trials
    --seed <u64>       Base seed (default {})
    --class <pc|in>    Preset cell class (default pc)
    -v, --verbose      Debug logging
    -h, --help         Print this help
"#,
        DEFAULT_SEED
    );
}
