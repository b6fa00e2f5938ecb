// SPDX-License-Identifier: MIT
//
// Keysearch: Constrained Keystream Key Recovery
// Copyright (c) 2025 Keysearch Contributors

//! Keysearch - Constrained Keystream Key Recovery
//!
//! Recovers an RC4 key by exhaustively testing a constrained key space against a
//! ciphertext whose plaintext starts with a known prefix.
//!
//! # Modes
//!
//! - Search (default): run the worker pool and print the recovered plaintext
//! - Estimate (`--estimate`): print the key-space size and a projected duration
//!
//! The job comes from `--config FILE` or the built-in sample. Engine settings are
//! read from `KEYSEARCH_*` environment variables and overridden by flags.
//! Logs go to stderr; results go to stdout.

use anyhow::{Context, Result};
use clap::Parser;
use keysearch_core::{
    CancelToken, EngineSettings, Estimate, Estimator, JobConfig, SearchEngine, SearchOutcome,
    SearchReport, StopPolicy,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "keysearch")]
#[command(version, about = "Keysearch - Recovers a stream-cipher key from a constrained key space", long_about = None)]
struct Args {
    /// Print the key-space size and projected search time instead of searching
    #[arg(long)]
    estimate: bool,

    /// YAML job file (defaults to the built-in sample job)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worker threads (overrides KEYSEARCH_WORKERS)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Keys per batch (overrides KEYSEARCH_BATCH_SIZE)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Work queue capacity in batches (overrides KEYSEARCH_QUEUE_DEPTH)
    #[arg(long)]
    queue_depth: Option<usize>,

    /// Scan the whole key space and report every match
    #[arg(long)]
    all: bool,

    /// Length of the all-free calibration key used by --estimate
    #[arg(long, default_value_t = keysearch_core::CALIBRATION_KEY_BYTES)]
    calibration_bytes: usize,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn engine_settings(&self) -> Result<EngineSettings> {
        let settings =
            EngineSettings::read_env().context("Failed to load engine settings from environment")?;
        self.apply_overrides(settings)
    }

    /// Flags win over environment values; validation runs on the merged result
    fn apply_overrides(&self, mut settings: EngineSettings) -> Result<EngineSettings> {
        if let Some(workers) = self.workers {
            settings.workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            settings.batch_size = batch_size;
        }
        if let Some(queue_depth) = self.queue_depth {
            settings.queue_depth = queue_depth;
        }
        if self.all {
            settings.stop_policy = StopPolicy::All;
        }

        settings.validate()?;
        Ok(settings)
    }

    fn job_config(&self) -> Result<JobConfig> {
        match &self.config {
            Some(path) => {
                info!("Loading job from {}", path.display());
                JobConfig::from_file(path)
                    .with_context(|| format!("Failed to load job file {}", path.display()))
            }
            None => {
                info!("No job file given, using the built-in sample job");
                Ok(JobConfig::sample())
            }
        }
    }
}

fn init_tracing(args: &Args) {
    let log_level = args
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true);

    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Cancel the search on SIGINT or SIGTERM
#[cfg(unix)]
fn install_signal_handler(cancel: CancelToken) -> Result<()> {
    use signal_hook::consts::signal::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;
    std::thread::Builder::new()
        .name("keysearch-signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                warn!("Received signal {}, cancelling search", signal);
                cancel.cancel();
            }
        })?;
    Ok(())
}

#[cfg(not(unix))]
fn install_signal_handler(_cancel: CancelToken) -> Result<()> {
    Ok(())
}

fn run_estimate(args: &Args, job: JobConfig, settings: EngineSettings) -> Result<ExitCode> {
    let cipher = Arc::new(job.cipher());
    let job = job.into_job()?;
    let estimator = Estimator::new(cipher, settings).with_calibration_bytes(args.calibration_bytes)?;
    let estimate = estimator.estimate(&job)?;

    print_estimate(&estimate, args.json)?;
    Ok(ExitCode::SUCCESS)
}

fn run_search(args: &Args, job: JobConfig, settings: EngineSettings) -> Result<ExitCode> {
    let cipher = Arc::new(job.cipher());
    let engine = SearchEngine::new(cipher, job.into_job()?, settings)?;
    install_signal_handler(engine.cancel_token())?;

    let report = engine.run()?;
    print_report(&report, args.json)?;

    Ok(match report.outcome {
        SearchOutcome::Found => ExitCode::SUCCESS,
        SearchOutcome::Exhausted => ExitCode::FAILURE,
        SearchOutcome::Cancelled => ExitCode::from(130),
    })
}

fn print_estimate(estimate: &Estimate, json: bool) -> Result<()> {
    if json {
        let value = serde_json::json!({
            "key_space_size": estimate.key_space_size.to_string(),
            "calibration_key_bytes": estimate.calibration.key_bytes,
            "calibration_keys": estimate.calibration.keys,
            "calibration_secs": estimate.calibration.elapsed.as_secs_f64(),
            "keys_per_second": estimate.keys_per_second(),
            "projected_secs": estimate.projected_secs(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("Key space size: {}", estimate.key_space_size);
        println!("Throughput: {:.0} keys/s", estimate.keys_per_second());
        println!("Projected search time: {:.2} s", estimate.projected_secs());
    }
    Ok(())
}

fn print_report(report: &SearchReport, json: bool) -> Result<()> {
    for m in &report.matches {
        info!("Key: {} (index {})", hex::encode(&m.key), m.index);
    }
    println!("{}", render_report(report, json)?);
    Ok(())
}

/// Result text for stdout; every outcome produces output
fn render_report(report: &SearchReport, json: bool) -> Result<String> {
    if json {
        let matches: Vec<_> = report
            .matches
            .iter()
            .map(|m| {
                serde_json::json!({
                    "index": m.index,
                    "key": hex::encode(&m.key),
                    "plaintext": m.plaintext_lossy(),
                    "plaintext_hex": hex::encode(&m.plaintext),
                })
            })
            .collect();
        let value = serde_json::json!({
            "outcome": report.outcome,
            "key_space_size": report.key_space_size.to_string(),
            "keys_tested": report.keys_tested,
            "workers": report.workers,
            "elapsed_secs": report.elapsed.as_secs_f64(),
            "matches": matches,
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }

    Ok(match report.outcome {
        SearchOutcome::Found if report.matches.is_empty() => {
            "Key found (matches were counted, not recorded)".to_string()
        }
        SearchOutcome::Found => report
            .matches
            .iter()
            .map(|m| m.plaintext_lossy())
            .collect::<Vec<_>>()
            .join("\n"),
        SearchOutcome::Exhausted => {
            format!("No key found ({} candidates tested)", report.keys_tested)
        }
        SearchOutcome::Cancelled => {
            format!("Search cancelled after {} keys", report.keys_tested)
        }
    })
}

fn run(args: &Args) -> Result<ExitCode> {
    info!("Keysearch v{}", keysearch_core::VERSION);

    let settings = args.engine_settings()?;
    let job = args.job_config()?;

    if args.estimate {
        run_estimate(args, job, settings)
    } else {
        run_search(args, job, settings)
    }
}

fn main() -> ExitCode {
    // Parse command-line arguments
    let args = Args::parse();

    // Initialize tracing
    init_tracing(&args);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use keysearch_core::KeyMatch;
    use std::time::Duration;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "keysearch",
            "--estimate",
            "--config",
            "job.yaml",
            "--workers",
            "8",
            "--all",
            "--calibration-bytes",
            "2",
            "--json",
        ])
        .unwrap();

        assert!(args.estimate);
        assert!(args.all);
        assert!(args.json);
        assert_eq!(args.workers, Some(8));
        assert_eq!(args.calibration_bytes, 2);
        assert_eq!(args.config, Some(PathBuf::from("job.yaml")));
        assert_eq!(args.batch_size, None);
    }

    fn report(outcome: SearchOutcome, matches: Vec<KeyMatch>) -> SearchReport {
        SearchReport {
            outcome,
            matches,
            key_space_size: 100,
            keys_tested: 100,
            batches_dispatched: 2,
            workers: 2,
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_flags_override_invalid_env_values() {
        let args = Args::try_parse_from(["keysearch", "--workers", "4", "--queue-depth", "8"]).unwrap();
        let mut from_env = EngineSettings::default();
        from_env.workers = 0;

        let settings = args.apply_overrides(from_env).unwrap();
        assert_eq!(settings.workers, 4);
        assert_eq!(settings.queue_depth, 8);
    }

    #[test]
    fn test_merged_settings_still_validated() {
        let args = Args::try_parse_from(["keysearch", "--batch-size", "0"]).unwrap();
        assert!(args.apply_overrides(EngineSettings::default()).is_err());
    }

    #[test]
    fn test_every_outcome_renders_text() {
        let exhausted = render_report(&report(SearchOutcome::Exhausted, vec![]), false).unwrap();
        assert_eq!(exhausted, "No key found (100 candidates tested)");

        let cancelled = render_report(&report(SearchOutcome::Cancelled, vec![]), false).unwrap();
        assert_eq!(cancelled, "Search cancelled after 100 keys");

        let found = KeyMatch {
            index: 7,
            key: vec![0x62, 0x30],
            raw: vec![0x62, 0x30],
            plaintext: b"Key:ok".to_vec(),
            worker: 1,
        };
        let text = render_report(&report(SearchOutcome::Found, vec![found]), false).unwrap();
        assert_eq!(text, "Key:ok");
    }

    #[test]
    fn test_json_report() {
        let text = render_report(&report(SearchOutcome::Exhausted, vec![]), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["outcome"], "exhausted");
        assert_eq!(value["key_space_size"], "100");
        assert_eq!(value["matches"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["keysearch"]).unwrap();
        assert!(!args.estimate);
        assert_eq!(args.log_level, "info");
        assert_eq!(args.calibration_bytes, keysearch_core::CALIBRATION_KEY_BYTES);
    }
}
