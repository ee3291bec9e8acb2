use std::collections::{HashMap, HashSet};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};

use fanrun::command::CommandSpec;
use fanrun::resolve::Target;
use fanrun::unit::{ExecUnit, UnitFactory, UnitStatus, UnitStream};

/// Scripted behaviour for one fake unit.
#[derive(Debug, Clone, Default)]
pub struct UnitScript {
    /// Bytes served as the unit's stdout.
    pub stdout: Vec<u8>,
    /// Bytes served as the unit's stderr.
    pub stderr: Vec<u8>,
    /// How long `wait` blocks before returning.
    pub wait_delay: Duration,
    /// Exit code reported by `wait` (unless `fail_wait` is set).
    pub exit_code: i32,
    /// Make `close_stdin` fail with this message.
    pub fail_close_stdin: Option<String>,
    /// Make `wait` fail with this message.
    pub fail_wait: Option<String>,
    /// Serve stdout through a reader that fails with this message once its
    /// bytes are exhausted.
    pub fail_stdout_read: Option<String>,
}

/// Lifecycle calls recorded as `"<address>:<operation>"`, in call order,
/// shared between the factory, its units and the test.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// A fake unit that:
/// - serves scripted stdout/stderr bytes
/// - records every lifecycle call into the shared log
/// - completes according to its script.
pub struct FakeUnit {
    target: Target,
    script: UnitScript,
    calls: CallLog,
    stdout: Option<UnitStream>,
    stderr: Option<UnitStream>,
}

impl FakeUnit {
    pub fn new(target: Target, script: UnitScript, calls: CallLog) -> Self {
        let stdout = stream_for(script.stdout.clone(), script.fail_stdout_read.clone());
        let stderr = stream_for(script.stderr.clone(), None);
        Self {
            target,
            script,
            calls,
            stdout: Some(stdout),
            stderr: Some(stderr),
        }
    }

    fn log(&self, op: &str) {
        let mut guard = self.calls.lock().unwrap();
        guard.push(format!("{}:{}", self.target, op));
    }
}

fn stream_for(bytes: Vec<u8>, fail: Option<String>) -> UnitStream {
    match fail {
        Some(message) => Box::new(FailingReader {
            bytes: io::Cursor::new(bytes),
            message,
        }),
        None => Box::new(io::Cursor::new(bytes)),
    }
}

#[async_trait]
impl ExecUnit for FakeUnit {
    async fn close_stdin(&mut self) -> Result<()> {
        self.log("close_stdin");
        match &self.script.fail_close_stdin {
            Some(msg) => Err(anyhow!("{msg}")),
            None => Ok(()),
        }
    }

    fn take_stdout(&mut self) -> Option<UnitStream> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<UnitStream> {
        self.stderr.take()
    }

    async fn wait(&mut self) -> Result<UnitStatus> {
        self.log("wait");
        if !self.script.wait_delay.is_zero() {
            tokio::time::sleep(self.script.wait_delay).await;
        }
        match &self.script.fail_wait {
            Some(msg) => Err(anyhow!("{msg}")),
            None => Ok(UnitStatus::exited(self.script.exit_code)),
        }
    }

    async fn signal(&mut self, signal: &str) -> Result<()> {
        self.log(&format!("signal {signal}"));
        Ok(())
    }
}

/// Reader that serves its bytes, then fails instead of reporting
/// end-of-stream.
struct FailingReader {
    bytes: io::Cursor<Vec<u8>>,
    message: String,
}

impl AsyncRead for FailingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.bytes.position() < this.bytes.get_ref().len() as u64 {
            return Pin::new(&mut this.bytes).poll_read(cx, buf);
        }
        Poll::Ready(Err(io::Error::other(this.message.clone())))
    }
}

/// A fake factory that:
/// - serves scripted units per address (with a default script as fallback)
/// - optionally refuses to create units for chosen addresses
/// - records every `create` call into the shared log.
pub struct FakeUnitFactory {
    default_script: UnitScript,
    scripts: HashMap<String, UnitScript>,
    fail_create: HashSet<String>,
    calls: CallLog,
}

impl FakeUnitFactory {
    pub fn new() -> Self {
        Self {
            default_script: UnitScript::default(),
            scripts: HashMap::new(),
            fail_create: HashSet::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script used for addresses without their own script.
    pub fn with_default_script(mut self, script: UnitScript) -> Self {
        self.default_script = script;
        self
    }

    /// Script used for this address only.
    pub fn with_script(mut self, addr: &str, script: UnitScript) -> Self {
        self.scripts.insert(addr.to_string(), script);
        self
    }

    /// Make `create` fail for this address.
    pub fn with_create_failure(mut self, addr: &str) -> Self {
        self.fail_create.insert(addr.to_string());
        self
    }

    /// Shared handle onto the call log.
    pub fn calls(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    /// Snapshot of the call log at this moment.
    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for FakeUnitFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UnitFactory for FakeUnitFactory {
    async fn create(&self, target: &Target, _command: &CommandSpec) -> Result<Box<dyn ExecUnit>> {
        {
            let mut guard = self.calls.lock().unwrap();
            guard.push(format!("{}:create", target));
        }

        if self.fail_create.contains(target.addr()) {
            return Err(anyhow!("creation refused for {target}"));
        }

        let script = self
            .scripts
            .get(target.addr())
            .cloned()
            .unwrap_or_else(|| self.default_script.clone());
        Ok(Box::new(FakeUnit::new(
            target.clone(),
            script,
            Arc::clone(&self.calls),
        )))
    }
}
