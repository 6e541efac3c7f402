//! Binary-side glue: merge CLI flags into configuration, run the scan
//! through the coordinator, render and emit the report.

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::engine::{SCAN_FAILURE, ScanCoordinator, ScanEngine, ScanOptions, ScanRun, ScanTrigger};
use crate::error::{AuditError, Result};
use crate::reporter::{JsonReporter, Reporter, TerminalReporter};
use crate::suppression::{
    DEFAULT_SUPPRESSION_DAYS, FindingSuppression, active_suppressions, load_suppressions,
    save_suppressions,
};

/// Configuration after CLI overrides have been applied.
pub fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load(std::env::current_dir().ok().as_deref()),
    };

    if let Some(path) = &cli.rule_pack {
        config.rule_pack.path = Some(path.clone());
    }
    if !cli.trusted_keys.is_empty() {
        config.rule_pack.trusted_keys = cli.trusted_keys.clone();
    }
    if cli.no_behavioral {
        config.scan.behavioral = false;
    }
    if cli.no_meta {
        config.scan.meta_filtering = false;
    }
    if let Some(mb) = cli.max_file_size_mb {
        config.scan.max_file_size_mb = mb;
    }
    if let Some(path) = &cli.suppressions {
        let loaded = load_suppressions(path)?;
        debug!(path = %path.display(), count = loaded.len(), "Loaded suppressions");
        config.suppressions.extend(loaded);
    }

    Ok(config)
}

/// Scan options for `config` with expired suppressions pruned at `now`.
pub fn scan_options(config: &Config, now: DateTime<Utc>) -> ScanOptions {
    let active = active_suppressions(&config.suppressions, now);
    let pruned = config.suppressions.len() - active.len();
    if pruned > 0 {
        debug!(pruned, "Ignoring expired suppressions");
    }
    ScanOptions::from(config)
        .with_suppressions(active)
        .with_reference_time(now)
}

pub fn run_scan(cli: &Cli) -> Result<ScanRun> {
    let config = resolve_config(cli)?;
    let engine = ScanEngine::from_config(&config)?;
    let options = scan_options(&config, Utc::now());
    let trigger = ScanTrigger::from(cli.trigger);

    let coordinator = ScanCoordinator::new();
    let runs = coordinator.run(trigger, |trigger| engine.scan(&cli.roots, trigger, &options));
    // A fresh coordinator always admits the first request.
    Ok(runs
        .into_iter()
        .last()
        .unwrap_or_else(|| engine.failed_run(trigger, "Scan was not admitted.")))
}

pub fn format_run(cli: &Cli, run: &ScanRun) -> String {
    match cli.format {
        OutputFormat::Terminal => TerminalReporter::new(cli.verbose)
            .with_high_signal_only(cli.high_only)
            .report(run),
        OutputFormat::Json => JsonReporter::new().report(run),
    }
}

/// Records every high or critical finding of `run` as a time-bounded
/// suppression at `path`.
pub fn write_suppressions(path: &Path, run: &ScanRun, now: DateTime<Utc>) -> Result<usize> {
    let suppressions: Vec<FindingSuppression> = run
        .high_signal_findings()
        .map(|finding| {
            FindingSuppression::for_finding(
                finding,
                DEFAULT_SUPPRESSION_DAYS,
                format!("Accepted from scan {}", run.id),
                now,
            )
        })
        .collect();
    save_suppressions(path, &suppressions)?;
    info!(path = %path.display(), count = suppressions.len(), "Wrote suppressions");
    Ok(suppressions.len())
}

fn emit(cli: &Cli, output: &str) -> Result<()> {
    match &cli.output {
        Some(path) => {
            fs::write(path, output).map_err(|e| AuditError::WriteError {
                path: path.display().to_string(),
                source: e,
            })?;
            println!("Output written to {}", path.display());
        }
        None => println!("{}", output),
    }
    Ok(())
}

/// Exit code 0 when no high or critical finding remains, 1 otherwise, 2 on
/// configuration or I/O failures (including a scan with no readable roots).
pub fn run_normal_mode(cli: &Cli) -> ExitCode {
    info!(roots = ?cli.roots, "Starting scan");
    let run = match run_scan(cli) {
        Ok(run) => run,
        Err(e) => {
            error!(error = %e, "Scan could not start");
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let output = format_run(cli, &run);
    if let Err(e) = emit(cli, &output) {
        eprintln!("Error: {}", e);
        return ExitCode::from(2);
    }
    if let Some(path) = &cli.write_suppressions
        && let Err(e) = write_suppressions(path, &run, Utc::now())
    {
        eprintln!("Error: {}", e);
        return ExitCode::from(2);
    }

    debug!(
        run_id = %run.id,
        findings = run.finding_count,
        high_or_critical = run.high_or_critical_count(),
        "Scan completed"
    );

    if run.skill_count == 0 && run.findings.iter().any(|f| f.rule_id == SCAN_FAILURE) {
        ExitCode::from(2)
    } else if run.high_or_critical_count() > 0 {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
