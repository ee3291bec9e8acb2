// src/dispatch/controller.rs

//! The fan-out execution controller.

use std::fmt;
use std::io;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::CommandSpec;
use crate::errors::{FanrunError, Result, UnitError};
use crate::resolve::Target;
use crate::unit::{UnitFactory, UnitStatus};

use super::driver::{OutputMode, drive_unit};
use super::sink::OutputSink;

/// How one target's dispatch ended.
#[derive(Debug)]
pub enum UnitOutcome {
    /// The unit reached a terminal status. A non-zero exit lands here too;
    /// the controller reports it without judging it.
    Completed(UnitStatus),
    /// A lifecycle step failed; the error names the step.
    Failed(UnitError),
}

/// The outcome at one target, keyed by its address.
#[derive(Debug)]
pub struct TargetOutcome {
    pub target: Target,
    pub outcome: UnitOutcome,
}

impl TargetOutcome {
    /// True when the unit completed with exit code zero.
    pub fn is_success(&self) -> bool {
        matches!(&self.outcome, UnitOutcome::Completed(status) if status.success())
    }
}

/// Completion signal posted exactly once per driver.
#[derive(Debug)]
pub(crate) struct Completion {
    pub(crate) index: usize,
    pub(crate) target: Target,
    pub(crate) outcome: UnitOutcome,
}

/// Dispatches one command to many targets concurrently and aggregates their
/// completion.
///
/// Holds no per-dispatch state: every `dispatch` call gets its own
/// completion channel and outstanding count, so one dispatcher can be used
/// for consecutive batches.
pub struct Dispatcher {
    factory: Arc<dyn UnitFactory>,
    sink: Option<OutputSink>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(factory: Arc<dyn UnitFactory>) -> Self {
        Self {
            factory,
            sink: None,
        }
    }

    /// Route tagged output into `sink` instead of this process's stdout.
    pub fn with_output_sink(mut self, sink: OutputSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run `command` at every target concurrently, then return one outcome
    /// per target in the order the targets were given.
    ///
    /// Failures at individual targets never abort their siblings; they come
    /// back as [`UnitOutcome::Failed`] entries. The returned error covers
    /// only batch-level problems: a malformed command, or a driver vanishing
    /// without reporting.
    pub async fn dispatch(
        &self,
        targets: Vec<Target>,
        command: CommandSpec,
        tag_output: bool,
    ) -> Result<Vec<TargetOutcome>> {
        command.validate()?;

        if targets.is_empty() {
            debug!("dispatch over zero targets; nothing to do");
            return Ok(Vec::new());
        }

        // When tagging to stdout this dispatch owns a writer task; it is
        // settled after collection so the tagged lines are flushed before
        // the outcomes are handed back.
        let mut writer = None;
        let mode = if tag_output {
            let sink = match &self.sink {
                Some(sink) => sink.clone(),
                None => {
                    let (sink, handle) = OutputSink::stdout();
                    writer = Some(handle);
                    sink
                }
            };
            OutputMode::Tagged(sink)
        } else {
            OutputMode::Raw
        };

        info!(targets = targets.len(), tag = tag_output, "dispatching command");

        self.run_batch(targets, command, mode, writer).await
    }

    async fn run_batch(
        &self,
        targets: Vec<Target>,
        command: CommandSpec,
        mode: OutputMode,
        writer: Option<JoinHandle<io::Result<()>>>,
    ) -> Result<Vec<TargetOutcome>> {
        let expected = targets.len();

        // Capacity matches the driver count so no driver can stall on a
        // slow collector.
        let (done_tx, mut done_rx) = mpsc::channel::<Completion>(expected);

        for (index, target) in targets.into_iter().enumerate() {
            tokio::spawn(drive_unit(
                index,
                target,
                command.clone(),
                Arc::clone(&self.factory),
                mode.clone(),
                done_tx.clone(),
            ));
        }
        // Only the drivers hold senders and sink clones from here on.
        drop(done_tx);
        drop(mode);

        let mut completions = Vec::with_capacity(expected);
        let mut outstanding = expected;
        while outstanding > 0 {
            match done_rx.recv().await {
                Some(done) => {
                    outstanding -= 1;
                    debug!(addr = %done.target, outstanding, "completion received");
                    completions.push(done);
                }
                None => break,
            }
        }

        if outstanding > 0 {
            // Drivers post a completion on every exit path, so this means a
            // driver task died outright. Surface it instead of hanging.
            return Err(FanrunError::MissingCompletions {
                expected,
                missing: outstanding,
            });
        }

        if let Some(writer) = writer {
            settle_writer(writer).await;
        }

        completions.sort_by_key(|done| done.index);
        Ok(completions
            .into_iter()
            .map(|done| TargetOutcome {
                target: done.target,
                outcome: done.outcome,
            })
            .collect())
    }

    /// Dispatch to a single target and unwrap its outcome, surfacing a
    /// lifecycle failure or a non-zero exit as an error.
    pub async fn dispatch_one(
        &self,
        target: Target,
        command: CommandSpec,
        tag_output: bool,
    ) -> Result<UnitStatus> {
        let addr = target.addr().to_string();
        let mut outcomes = self.dispatch(vec![target], command, tag_output).await?;
        let Some(last) = outcomes.pop() else {
            return Err(FanrunError::MissingCompletions {
                expected: 1,
                missing: 1,
            });
        };
        match last.outcome {
            UnitOutcome::Completed(status) if status.success() => Ok(status),
            UnitOutcome::Completed(status) => Err(FanrunError::CommandFailed {
                target: addr,
                status,
            }),
            UnitOutcome::Failed(source) => Err(FanrunError::TargetFailed {
                target: addr,
                source,
            }),
        }
    }
}

/// Wait out an owned stdout writer task. Every completion has already been
/// collected by the time this runs; a dead stdout costs output, never the
/// per-target outcomes, so write failures are logged and dropped.
async fn settle_writer(writer: JoinHandle<io::Result<()>>) {
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "tagged output writer failed"),
        Err(err) => warn!(error = %err, "tagged output writer task died"),
    }
}
