// src/dispatch/tag.rs

//! Line tagging and raw copying for drained unit streams.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use super::sink::OutputSink;

/// Drain `stream` to end-of-stream, emitting every line to `sink` as the
/// label, one space, then the line with its terminator stripped.
///
/// Lines are emitted in stream order, each as soon as its terminator has
/// been read; a trailing fragment with no terminator is still emitted.
/// Units emit arbitrary bytes, so splitting happens before any text
/// decoding; bytes that are not valid UTF-8 come out as U+FFFD. An I/O
/// error stops the tagging, but lines already emitted stay emitted.
pub async fn tag_lines<R>(stream: R, label: &str, sink: &OutputSink) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        let line = String::from_utf8_lossy(&buf);
        sink.send_line(format!("{label} {line}")).await?;
    }
}

/// Drain `stream` into `writer` byte for byte, with no line reinterpretation.
pub async fn copy_raw<R, W>(mut stream: R, mut writer: W) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tokio::io::copy(&mut stream, &mut writer).await?;
    writer.flush().await
}
