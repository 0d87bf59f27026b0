//! Drives the failinj workflow: launch a payload under `LD_PRELOAD` again
//! and again until a run completes without a new injected failure, then
//! report what happened. After each earlier run the database has grown by
//! one callsite; convergence means every fallible callsite the payload
//! reaches has now been failed exactly once.

use std::path::PathBuf;
use std::process::Command;

use clap::Parser;

use failinj_harness::{CycleReport, RunOutcome, database_records, mentions_injection};

/// Run a payload to failure-injection convergence.
#[derive(Debug, Parser)]
#[command(name = "failinj-cycle")]
#[command(about = "Repeatedly runs a payload under failinj until its database stops growing")]
struct Cli {
    /// The interposable shared object (libfailinj.so).
    #[arg(long)]
    library: PathBuf,
    /// Callsite database path, handed to the payload's environment.
    #[arg(long)]
    database: PathBuf,
    /// Keep an existing database instead of starting a fresh cycle.
    #[arg(long)]
    keep_database: bool,
    /// Give up after this many runs without convergence.
    #[arg(long, default_value_t = 256)]
    max_runs: usize,
    /// Announcement tag the library was built with.
    #[arg(long, default_value = "FAILINJ")]
    tag: String,
    /// Write the JSON report here instead of stdout.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Payload command and its arguments.
    #[arg(required = true, trailing_var_arg = true)]
    payload: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if !cli.keep_database {
        let _ = std::fs::remove_file(&cli.database);
    }

    let mut runs = Vec::new();
    let mut converged = false;
    for run in 0..cli.max_runs {
        let before = database_records(&cli.database);
        let output = Command::new(&cli.payload[0])
            .args(&cli.payload[1..])
            .env("LD_PRELOAD", &cli.library)
            .env(format!("{}_DATABASE", cli.tag), &cli.database)
            .output()?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        let outcome = RunOutcome {
            run,
            exit_code: output.status.code(),
            injected: mentions_injection(&cli.tag, &stderr),
            new_records: database_records(&cli.database).saturating_sub(before),
        };
        eprintln!(
            "run {}: exit={:?} injected={} new_records={}",
            run, outcome.exit_code, outcome.injected, outcome.new_records
        );
        let done = !outcome.injected && outcome.new_records == 0;
        runs.push(outcome);
        if done {
            converged = true;
            break;
        }
    }

    let report = CycleReport {
        payload: cli.payload.join(" "),
        database: cli.database.display().to_string(),
        converged,
        database_records: database_records(&cli.database),
        runs,
    };
    eprintln!(
        "{} after {} runs, {} callsites recorded",
        if report.converged { "converged" } else { "gave up" },
        report.runs.len(),
        report.database_records
    );

    match &cli.report {
        Some(path) => std::fs::write(path, report.to_json())?,
        None => println!("{}", report.to_json()),
    }

    if !report.converged {
        return Err(format!("no convergence within {} runs", cli.max_runs).into());
    }
    Ok(())
}
