// src/unit/docker.rs

//! Container units driven through the docker CLI.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::debug;

use crate::command::CommandSpec;
use crate::resolve::Target;

use super::{ExecUnit, UnitStatus, UnitStream};

/// Sequence number for container names, unique within this process.
static NAME_SEQ: AtomicU64 = AtomicU64::new(0);

/// One command run inside a container via `docker run`.
///
/// The client process exits with the container's exit code and relays its
/// stdio, so waiting and stream plumbing work exactly as for a plain
/// process. Signalling goes through `docker kill` against the container
/// name, which is unique per unit.
pub struct DockerUnit {
    child: Child,
    stdin: Option<ChildStdin>,
    container: String,
}

impl DockerUnit {
    pub fn launch(target: &Target, spec: &CommandSpec) -> Result<Self> {
        let container = next_container_name();
        let args = run_args(&container, spec)?;

        let mut cmd = Command::new("docker");
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("launching container for target '{target}'"))?;
        let stdin = child.stdin.take();

        debug!(addr = %target, container = %container, "container unit launched");

        Ok(Self {
            child,
            stdin,
            container,
        })
    }
}

/// Build the `docker run` argument list for a command.
fn run_args(container: &str, spec: &CommandSpec) -> Result<Vec<String>> {
    let Some(image) = spec.image.as_deref() else {
        bail!("docker target requires an 'image' in the command descriptor");
    };

    let mut args = vec![
        "run".to_string(),
        "--name".to_string(),
        container.to_string(),
        // Keep stdin attached so closing our pipe reaches the container.
        "-i".to_string(),
    ];
    if spec.scrub {
        // Scrubbed runs leave no terminated container record behind.
        args.push("--rm".to_string());
    }
    if let Some(dir) = &spec.dir {
        args.push("-w".to_string());
        args.push(dir.clone());
    }
    for (key, value) in &spec.env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }
    if let Some(memory) = spec.memory {
        args.push("--memory".to_string());
        args.push(memory.to_string());
    }
    if let Some(shares) = spec.cpu_shares {
        args.push("--cpu-shares".to_string());
        args.push(shares.to_string());
    }
    args.push(image.to_string());
    args.push(spec.path.clone());
    args.extend(spec.args.iter().cloned());

    Ok(args)
}

fn next_container_name() -> String {
    let seq = NAME_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("fanrun-{}-{}", std::process::id(), seq)
}

#[async_trait]
impl ExecUnit for DockerUnit {
    async fn close_stdin(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin
                .shutdown()
                .await
                .context("shutting down container stdin pipe")?;
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
            .with_context(|| format!("waiting for container '{}'", self.container))?;
        Ok(UnitStatus::from_exit(status))
    }

    async fn signal(&mut self, signal: &str) -> Result<()> {
        let status = Command::new("docker")
            .args(["kill", "--signal", signal, &self.container])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .context("running docker kill")?;
        if !status.success() {
            bail!(
                "docker kill --signal {signal} {} exited with {status}",
                self.container
            );
        }
        Ok(())
    }
}
