//! Framed I/O for NNTP.
//!
//! NNTP is a line protocol: commands and status lines are single
//! CRLF-terminated lines, bodies are dot-encoded line sequences. The
//! read and write halves are kept separate so a client can pipeline
//! requests while a consumer task reads the responses.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::BytesMut;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};

use super::dot::{DotReader, DotWriter};
use crate::types::ResponseCode;
use crate::{Error, Result};

/// Default buffer size for reading and writing.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Longest command line a server accepts, terminator included.
pub const COMMAND_LINE_LIMIT: usize = 512;

/// Default line limit for status and listing lines.
pub const DEFAULT_LINE_LIMIT: usize = 64 * 1024;

/// Buffered line reader.
pub struct FramedReader<R> {
    reader: BufReader<R>,
    line_limit: usize,
}

impl<R> FramedReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Creates a reader with the given line limit (terminator included).
    pub fn new(inner: R, line_limit: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, inner),
            line_limit,
        }
    }

    /// Returns the line limit.
    pub const fn line_limit(&self) -> usize {
        self.line_limit
    }

    /// Reads one LF- or CRLF-terminated line, terminator stripped.
    ///
    /// Returns `Ok(None)` on a clean end of stream between lines. A line
    /// that does not fit the limit yields [`Error::LineTooLong`] with the
    /// rest of it still unread; call [`Self::discard_line`] before reading
    /// anything else.
    pub async fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                if line.is_empty() {
                    return Ok(None);
                }
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed mid-line",
                )));
            }

            let room = self.line_limit - line.len();
            if let Some(pos) = buf.iter().position(|&c| c == b'\n') {
                if pos + 1 > room {
                    self.reader.consume(room);
                    return Err(Error::LineTooLong {
                        limit: self.line_limit,
                    });
                }
                line.extend_from_slice(&buf[..pos]);
                self.reader.consume(pos + 1);
                break;
            }

            if buf.len() > room {
                self.reader.consume(room);
                return Err(Error::LineTooLong {
                    limit: self.line_limit,
                });
            }
            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);
        }

        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Skips input up to and including the next LF.
    pub async fn discard_line(&mut self) -> Result<()> {
        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Ok(());
            }
            if let Some(pos) = buf.iter().position(|&c| c == b'\n') {
                self.reader.consume(pos + 1);
                return Ok(());
            }
            let len = buf.len();
            self.reader.consume(len);
        }
    }

    /// Starts reading a dot-encoded body.
    pub fn dot_reader(&mut self) -> DotReader<'_, R> {
        DotReader::new(self)
    }

    pub(super) fn buffered(&mut self) -> &mut BufReader<R> {
        &mut self.reader
    }

    /// Consumes the reader, dropping anything buffered.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

/// Buffered line writer.
///
/// Lines accumulate in memory until [`Self::flush`].
pub struct FramedWriter<W> {
    writer: W,
    buffer: BytesMut,
}

impl<W> FramedWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Creates a writer.
    pub fn new(inner: W) -> Self {
        Self {
            writer: inner,
            buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Queues `line` followed by CRLF.
    pub fn queue_line(&mut self, line: &str) {
        self.buffer.extend_from_slice(line.as_bytes());
        self.buffer.extend_from_slice(b"\r\n");
    }

    /// Queues a status line `code text`.
    pub fn queue_status(&mut self, code: ResponseCode, text: &str) {
        self.queue_line(&format!("{code} {text}"));
    }

    /// Writes everything queued and flushes the transport.
    pub async fn flush(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer).await?;
            self.buffer.clear();
        }
        self.writer.flush().await?;
        Ok(())
    }

    /// Queues one line and flushes.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.queue_line(line);
        self.flush().await
    }

    /// Queues a status line and flushes.
    pub async fn send_status(&mut self, code: ResponseCode, text: &str) -> Result<()> {
        self.queue_status(code, text);
        self.flush().await
    }

    /// Starts a dot-encoded body.
    ///
    /// The body is terminated when the returned writer is finished or
    /// dropped, whichever comes first.
    pub fn dot_writer(&mut self) -> DotWriter<'_> {
        DotWriter::new(&mut self.buffer)
    }

    /// Consumes the writer, dropping anything not yet flushed.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Framed NNTP connection.
pub struct FramedStream<S> {
    reader: FramedReader<ReadHalf<S>>,
    writer: FramedWriter<WriteHalf<S>>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a framed stream with [`DEFAULT_LINE_LIMIT`].
    pub fn new(stream: S) -> Self {
        Self::with_line_limit(stream, DEFAULT_LINE_LIMIT)
    }

    /// Creates a framed stream with a custom line limit.
    pub fn with_line_limit(stream: S, line_limit: usize) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            reader: FramedReader::new(read, line_limit),
            writer: FramedWriter::new(write),
        }
    }

    /// Reads one line. See [`FramedReader::read_line`].
    pub async fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        self.reader.read_line().await
    }

    /// Reads one line, treating end of stream as an error.
    pub async fn read_line_required(&mut self) -> Result<Vec<u8>> {
        self.reader.read_line().await?.ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            ))
        })
    }

    /// Skips the remainder of an oversized line.
    pub async fn discard_line(&mut self) -> Result<()> {
        self.reader.discard_line().await
    }

    /// Queues a line and flushes.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer.send_line(line).await
    }

    /// Queues a status line and flushes.
    pub async fn send_status(&mut self, code: ResponseCode, text: &str) -> Result<()> {
        self.writer.send_status(code, text).await
    }

    /// Returns the read half.
    pub fn reader(&mut self) -> &mut FramedReader<ReadHalf<S>> {
        &mut self.reader
    }

    /// Returns the write half.
    pub fn writer(&mut self) -> &mut FramedWriter<WriteHalf<S>> {
        &mut self.writer
    }

    /// Borrows both halves at once for concurrent use.
    pub fn split_mut(
        &mut self,
    ) -> (
        &mut FramedReader<ReadHalf<S>>,
        &mut FramedWriter<WriteHalf<S>>,
    ) {
        (&mut self.reader, &mut self.writer)
    }

    /// Reassembles the transport, dropping buffered data.
    ///
    /// Used for the STARTTLS upgrade, after which no plaintext may be
    /// pending in either direction.
    pub fn into_inner(self) -> S {
        self.reader.into_inner().unsplit(self.writer.into_inner())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    #[tokio::test]
    async fn test_read_crlf_and_lf_lines() {
        let mock = Builder::new().read(b"200 ready\r\nQUIT\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_line().await.unwrap().unwrap(), b"200 ready");
        assert_eq!(framed.read_line().await.unwrap().unwrap(), b"QUIT");
        assert!(framed.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_line_split_across_reads() {
        let mock = Builder::new().read(b"GRO").read(b"UP misc").read(b"\r\n").build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(framed.read_line().await.unwrap().unwrap(), b"GROUP misc");
    }

    #[tokio::test]
    async fn test_line_too_long_then_recover() {
        let long = "A".repeat(COMMAND_LINE_LIMIT + 10);
        let input = format!("{long}\r\nDATE\r\n");
        let mock = Builder::new().read(input.as_bytes()).build();
        let mut framed = FramedStream::with_line_limit(mock, COMMAND_LINE_LIMIT);

        let err = framed.read_line().await.unwrap_err();
        assert!(matches!(err, Error::LineTooLong { limit: 512 }));
        framed.discard_line().await.unwrap();
        assert_eq!(framed.read_line().await.unwrap().unwrap(), b"DATE");
    }

    #[tokio::test]
    async fn test_line_exactly_at_limit() {
        let body = "B".repeat(COMMAND_LINE_LIMIT - 2);
        let input = format!("{body}\r\n");
        let mock = Builder::new().read(input.as_bytes()).build();
        let mut framed = FramedStream::with_line_limit(mock, COMMAND_LINE_LIMIT);
        assert_eq!(framed.read_line().await.unwrap().unwrap().len(), body.len());
    }

    #[tokio::test]
    async fn test_eof_mid_line() {
        let mock = Builder::new().read(b"partial").build();
        let mut framed = FramedStream::new(mock);
        assert!(framed.read_line().await.unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn test_send_status() {
        let mock = Builder::new().write(b"205 bye\r\n").build();
        let mut framed = FramedStream::new(mock);
        framed
            .send_status(ResponseCode::CLOSING, "bye")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_queued_lines_flush_together() {
        let mock = Builder::new().write(b"ARTICLE 1\r\nARTICLE 2\r\n").build();
        let mut framed = FramedStream::new(mock);
        framed.writer().queue_line("ARTICLE 1");
        framed.writer().queue_line("ARTICLE 2");
        framed.writer().flush().await.unwrap();
    }
}
