// src/dispatch/sink.rs

//! Shared line-granular output sink.
//!
//! Many drivers emit tagged lines concurrently; a single writer task owns
//! the underlying stream, so concurrent output can only interleave at line
//! boundaries, never inside a line.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How many lines may queue up before emitters are backpressured.
const LINE_BUFFER: usize = 256;

/// Clonable handle used by stream taggers to emit whole lines.
#[derive(Debug, Clone)]
pub struct OutputSink {
    tx: mpsc::Sender<String>,
}

impl OutputSink {
    /// Sink writing to this process's stdout.
    ///
    /// The returned handle resolves once every sink clone is gone and the
    /// final line has been flushed; await it before reporting outcomes.
    pub fn stdout() -> (Self, JoinHandle<io::Result<()>>) {
        Self::from_writer(tokio::io::stdout())
    }

    /// Sink writing newline-terminated lines to `writer`.
    pub fn from_writer<W>(writer: W) -> (Self, JoinHandle<io::Result<()>>)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<String>(LINE_BUFFER);
        let handle = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(line) = rx.recv().await {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                // Flush per line so output streams while units still run.
                writer.flush().await?;
            }
            Ok(())
        });
        (Self { tx }, handle)
    }

    /// Sink handing emitted lines to the returned receiver, for tests and
    /// embedders that want the lines themselves.
    pub fn capture() -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel::<String>(LINE_BUFFER);
        (Self { tx }, rx)
    }

    /// Emit one line, without its terminator.
    pub async fn send_line(&self, line: String) -> io::Result<()> {
        self.tx
            .send(line)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "output sink closed"))
    }
}
