// src/dispatch/driver.rs

//! Per-target unit lifecycle driver.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::command::CommandSpec;
use crate::errors::UnitError;
use crate::resolve::Target;
use crate::unit::{UnitFactory, UnitStream};

use super::controller::{Completion, UnitOutcome};
use super::sink::OutputSink;
use super::tag::{copy_raw, tag_lines};

/// How a driver forwards its unit's drained output.
#[derive(Debug, Clone)]
pub(crate) enum OutputMode {
    /// Prefix each line with the target address and emit it to the shared
    /// sink.
    Tagged(OutputSink),
    /// Byte-for-byte passthrough to this process's stdout/stderr.
    Raw,
}

/// Drive one unit from creation to completion, posting exactly one
/// completion signal whatever happens along the way.
///
/// The steps, in order:
///
/// 1. create the unit via the factory,
/// 2. close its stdin,
/// 3. drain stdout and stderr concurrently,
/// 4. wait for the terminal status.
///
/// A stdin-close failure is recorded but does not abort the remaining
/// steps; the unit may still produce output worth draining. When several
/// steps fail, the earliest failure wins the completion signal.
pub(crate) async fn drive_unit(
    index: usize,
    target: Target,
    command: CommandSpec,
    factory: Arc<dyn UnitFactory>,
    mode: OutputMode,
    done_tx: mpsc::Sender<Completion>,
) {
    let outcome = drive_unit_inner(&target, &command, factory.as_ref(), mode).await;

    match &outcome {
        UnitOutcome::Completed(status) => {
            debug!(addr = %target, status = %status, "unit completed");
        }
        UnitOutcome::Failed(err) => {
            warn!(addr = %target, error = %err, "unit failed");
        }
    }

    // The collector hanging up early means nobody is listening anymore;
    // there is nothing left to report to.
    let _ = done_tx
        .send(Completion {
            index,
            target,
            outcome,
        })
        .await;
}

async fn drive_unit_inner(
    target: &Target,
    command: &CommandSpec,
    factory: &dyn UnitFactory,
    mode: OutputMode,
) -> UnitOutcome {
    let mut unit = match factory.create(target, command).await {
        Ok(unit) => unit,
        Err(err) => return UnitOutcome::Failed(UnitError::Create(err)),
    };

    let mut first_error: Option<UnitError> = None;

    if let Err(err) = unit.close_stdin().await {
        warn!(addr = %target, error = %err, "failed to close unit stdin");
        first_error = Some(UnitError::CloseStdin(err));
    }

    // Drains run concurrently with each other and with the wait below: a
    // command filling one pipe while we sat reading the other would
    // deadlock.
    let stdout = spawn_drain("stdout", unit.take_stdout(), target, &mode);
    let stderr = spawn_drain("stderr", unit.take_stderr(), target, &mode);

    let waited = unit.wait().await;

    for (stream, handle) in [("stdout", stdout), ("stderr", stderr)] {
        let Some(handle) = handle else { continue };
        if waited.is_err() {
            // The unit never reached a terminal status, so its streams may
            // never hit end-of-stream. Cut them loose; the completion
            // signal must still flow.
            handle.abort();
            continue;
        }
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(addr = %target, stream, error = %err, "stream drain failed");
                if first_error.is_none() {
                    first_error = Some(UnitError::Drain {
                        stream,
                        source: err,
                    });
                }
            }
            Err(err) => {
                warn!(addr = %target, stream, error = %err, "stream drain task died");
                if first_error.is_none() {
                    first_error = Some(UnitError::Drain {
                        stream,
                        source: std::io::Error::other(err),
                    });
                }
            }
        }
    }

    match (waited, first_error) {
        (Ok(status), None) => UnitOutcome::Completed(status),
        (Ok(_), Some(err)) => UnitOutcome::Failed(err),
        (Err(err), first) => UnitOutcome::Failed(first.unwrap_or(UnitError::Wait(err))),
    }
}

/// Spawn a drain task for one stream, if the unit exposes it.
fn spawn_drain(
    stream: &'static str,
    source: Option<UnitStream>,
    target: &Target,
    mode: &OutputMode,
) -> Option<JoinHandle<std::io::Result<()>>> {
    let source = source?;
    let handle = match mode {
        OutputMode::Tagged(sink) => {
            let sink = sink.clone();
            let label = target.addr().to_string();
            tokio::spawn(async move { tag_lines(source, &label, &sink).await })
        }
        OutputMode::Raw if stream == "stdout" => {
            tokio::spawn(async move { copy_raw(source, tokio::io::stdout()).await })
        }
        OutputMode::Raw => tokio::spawn(async move { copy_raw(source, tokio::io::stderr()).await }),
    };
    Some(handle)
}
