// src/lib.rs

pub mod cli;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod logging;
pub mod resolve;
pub mod unit;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::command::CommandSpec;
use crate::config::loader::load_and_validate;
use crate::dispatch::{Dispatcher, TargetOutcome, UnitOutcome};
use crate::errors::FanrunError;
use crate::resolve::{RosterResolver, Target, TargetResolver};
use crate::unit::RosterUnitFactory;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - roster loading
/// - target resolution (pattern, or --all as a point-in-time snapshot)
/// - the JSON command descriptor from stdin
/// - factory + dispatcher
/// - the per-target outcome summary
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    // Resolver over the static roster.
    let resolver = RosterResolver::from_config(&cfg);
    let targets = resolve_targets(&args, &resolver)?;

    // The command descriptor arrives as JSON on stdin.
    let mut command = command::read_from_stdin().await?;
    if args.scrub {
        command.scrub = true;
    }
    command.validate()?;

    if command.scrub {
        info!("command text withheld from logs (scrub)");
    } else {
        debug!(path = %command.path, args = ?command.args, "command descriptor parsed");
    }

    if args.dry_run {
        print_dry_run(&targets, &command)?;
        return Ok(());
    }

    let factory = Arc::new(RosterUnitFactory::from_config(&cfg));
    let dispatcher = Dispatcher::new(factory);
    let outcomes = dispatcher.dispatch(targets, command, args.tag).await?;

    summarize(&outcomes);
    Ok(())
}

fn resolve_targets(args: &CliArgs, resolver: &RosterResolver) -> crate::errors::Result<Vec<Target>> {
    if args.all {
        return resolver.resolve_all();
    }
    match &args.pattern {
        Some(pattern) => resolver.resolve(pattern),
        None => Err(FanrunError::ConfigError(
            "a target pattern is required unless --all is given".to_string(),
        )),
    }
}

/// Per-target report once every driver has completed.
///
/// Partial success is an expected outcome: failed targets are listed, never
/// escalated to a batch error.
fn summarize(outcomes: &[TargetOutcome]) {
    let mut failed = 0usize;
    for outcome in outcomes {
        match &outcome.outcome {
            UnitOutcome::Completed(status) if status.success() => {
                info!(addr = %outcome.target, status = %status, "completed");
            }
            UnitOutcome::Completed(status) => {
                failed += 1;
                warn!(addr = %outcome.target, status = %status, "completed with failure status");
            }
            UnitOutcome::Failed(err) => {
                failed += 1;
                warn!(addr = %outcome.target, error = %err, "dispatch failed");
            }
        }
    }
    info!(
        total = outcomes.len(),
        succeeded = outcomes.len() - failed,
        failed,
        "dispatch finished"
    );
}

/// Simple dry-run output: print the resolved targets and the parsed command.
fn print_dry_run(targets: &[Target], command: &CommandSpec) -> Result<()> {
    println!("fanrun dry-run");
    println!("targets ({}):", targets.len());
    for target in targets {
        println!("  - {target}");
    }
    println!("command:");
    println!("{}", serde_json::to_string_pretty(command)?);

    debug!("dry-run complete (no execution)");
    Ok(())
}
