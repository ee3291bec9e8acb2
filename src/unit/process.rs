// src/unit/process.rs

//! Local process units.

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::debug;

use crate::command::CommandSpec;
use crate::resolve::Target;

use super::{ExecUnit, UnitStatus, UnitStream};

/// One command run as a local child process with fully piped stdio.
pub struct ProcessUnit {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl ProcessUnit {
    /// Spawn the command described by `spec`.
    ///
    /// `spec` is expected to already carry the merged env/dir for this
    /// target; the factory takes care of that.
    pub fn spawn(target: &Target, spec: &CommandSpec) -> Result<Self> {
        let mut cmd = Command::new(&spec.path);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for target '{target}'"))?;
        let stdin = child.stdin.take();

        debug!(addr = %target, pid = ?child.id(), "process unit spawned");

        Ok(Self { child, stdin })
    }
}

#[async_trait]
impl ExecUnit for ProcessUnit {
    async fn close_stdin(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin
                .shutdown()
                .await
                .context("shutting down process stdin pipe")?;
        }
        Ok(())
    }

    fn take_stdout(&mut self) -> Option<UnitStream> {
        self.child.stdout.take().map(|s| Box::new(s) as UnitStream)
    }

    fn take_stderr(&mut self) -> Option<UnitStream> {
        self.child.stderr.take().map(|s| Box::new(s) as UnitStream)
    }

    async fn wait(&mut self) -> Result<UnitStatus> {
        let status = self
            .child
            .wait()
            .await
            .context("waiting for process exit")?;
        Ok(UnitStatus::from_exit(status))
    }

    async fn signal(&mut self, signal: &str) -> Result<()> {
        let Some(pid) = self.child.id() else {
            bail!("process already reaped; cannot signal");
        };
        send_signal(pid, signal)
    }
}

/// Deliver a named signal to a pid.
#[cfg(unix)]
fn send_signal(pid: u32, name: &str) -> Result<()> {
    let signo = signal_number(name)?;
    let ret = unsafe { libc::kill(pid as libc::pid_t, signo) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error())
            .with_context(|| format!("delivering {name} to pid {pid}"));
    }
    Ok(())
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, name: &str) -> Result<()> {
    bail!("signal delivery is only supported on unix (got {name})");
}

/// Map a signal name, with or without the `SIG` prefix, to its number.
#[cfg(unix)]
fn signal_number(name: &str) -> Result<libc::c_int> {
    let upper = name.trim().to_ascii_uppercase();
    let bare = upper.strip_prefix("SIG").unwrap_or(&upper);
    let signo = match bare {
        "HUP" => libc::SIGHUP,
        "INT" => libc::SIGINT,
        "QUIT" => libc::SIGQUIT,
        "KILL" => libc::SIGKILL,
        "USR1" => libc::SIGUSR1,
        "USR2" => libc::SIGUSR2,
        "TERM" => libc::SIGTERM,
        "CONT" => libc::SIGCONT,
        "STOP" => libc::SIGSTOP,
        other => bail!("unsupported signal name: {other}"),
    };
    Ok(signo)
}
