// src/unit/mod.rs

//! Execution units and the factory that creates them.
//!
//! A unit is one live instance of the dispatched command at one target:
//!
//! - [`process`] runs it as a local child process.
//! - [`docker`] runs it inside a container through the docker CLI.
//! - [`factory`] picks the variant each roster entry is configured for.
//!
//! The dispatch layer only sees the [`ExecUnit`] capability set, so further
//! unit kinds can be added without touching the controller or the driver.

pub mod docker;
pub mod factory;
pub mod process;

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncRead;

use crate::command::CommandSpec;
use crate::resolve::Target;

pub use docker::DockerUnit;
pub use factory::RosterUnitFactory;
pub use process::ProcessUnit;

/// Byte stream handed from a unit to the drain layer.
pub type UnitStream = Box<dyn AsyncRead + Send + Unpin>;

/// Which unit variant a roster entry launches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    #[default]
    Process,
    Docker,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Process => write!(f, "process"),
            UnitKind::Docker => write!(f, "docker"),
        }
    }
}

/// Terminal status reported by a unit.
///
/// Opaque to the dispatcher, which aggregates completion without judging
/// it; only the single-target convenience entry point interprets the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitStatus {
    /// Exit code, when the command exited on its own.
    pub code: Option<i32>,
    /// Signal number that terminated the command, if any (unix only).
    pub signal: Option<i32>,
}

impl UnitStatus {
    pub fn from_exit(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// True when the command exited with code zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => write!(f, "unknown status"),
        }
    }
}

/// One live execution of the command at one target.
///
/// The driver takes a unit through a fixed lifecycle: stdin is closed,
/// stdout/stderr are taken and drained, `wait` returns the terminal status.
/// Units are never reused.
#[async_trait]
pub trait ExecUnit: Send {
    /// Close the unit's stdin so the command sees end-of-input.
    ///
    /// A command that reads stdin would otherwise block forever, since
    /// nothing is ever written to it. Must be idempotent.
    async fn close_stdin(&mut self) -> anyhow::Result<()>;

    /// Take the unit's stdout stream. Returns `None` once taken.
    fn take_stdout(&mut self) -> Option<UnitStream>;

    /// Take the unit's stderr stream. Returns `None` once taken.
    fn take_stderr(&mut self) -> Option<UnitStream>;

    /// Block until the command reaches a terminal status.
    async fn wait(&mut self) -> anyhow::Result<UnitStatus>;

    /// Deliver a named signal, e.g. `"TERM"` or `"SIGKILL"`.
    async fn signal(&mut self, signal: &str) -> anyhow::Result<()>;
}

/// Creates execution units bound to targets.
///
/// Production code uses [`RosterUnitFactory`]; tests provide their own
/// implementation that doesn't launch real processes.
#[async_trait]
pub trait UnitFactory: Send + Sync {
    /// Instantiate `command` at `target`.
    ///
    /// Failure here is per-target: it must not leave side effects behind and
    /// it never affects units being created for other targets.
    async fn create(
        &self,
        target: &Target,
        command: &CommandSpec,
    ) -> anyhow::Result<Box<dyn ExecUnit>>;
}
