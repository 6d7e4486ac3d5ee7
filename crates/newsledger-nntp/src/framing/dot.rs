//! Dot-encoded multi-line bodies (RFC 3977 section 3.1.1).
//!
//! On the wire a body is a sequence of CRLF-terminated lines ending with a
//! line holding a single `.`; lines starting with `.` get an extra `.`
//! prepended. Decoded bodies use bare LF line endings.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead};

use super::framed::FramedReader;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    BeginLine,
    Dot,
    DotCr,
    Cr,
    Data,
    Done,
}

/// Decodes as much of `input` as possible into `out`.
///
/// Returns the number of input bytes consumed. Stops early when the
/// terminator has been seen, or after emitting an LF if `stop_at_eol`.
fn decode(state: &mut ReadState, input: &[u8], out: &mut Vec<u8>, stop_at_eol: bool) -> usize {
    let mut i = 0;
    while i < input.len() && *state != ReadState::Done {
        let c = input[i];
        match *state {
            ReadState::BeginLine => match c {
                b'.' => *state = ReadState::Dot,
                b'\r' => *state = ReadState::Cr,
                b'\n' => out.push(b'\n'),
                _ => {
                    out.push(c);
                    *state = ReadState::Data;
                }
            },
            ReadState::Dot => match c {
                b'\r' => *state = ReadState::DotCr,
                b'\n' => *state = ReadState::Done,
                _ => {
                    out.push(c);
                    *state = ReadState::Data;
                }
            },
            ReadState::DotCr => {
                if c == b'\n' {
                    *state = ReadState::Done;
                } else {
                    // ".\rX": keep the CR, reprocess X as data
                    out.push(b'\r');
                    *state = ReadState::Data;
                    continue;
                }
            }
            ReadState::Cr => {
                if c == b'\n' {
                    out.push(b'\n');
                    *state = ReadState::BeginLine;
                } else {
                    out.push(b'\r');
                    *state = ReadState::Data;
                    continue;
                }
            }
            ReadState::Data => match c {
                b'\r' => *state = ReadState::Cr,
                b'\n' => {
                    out.push(b'\n');
                    *state = ReadState::BeginLine;
                }
                _ => out.push(c),
            },
            ReadState::Done => break,
        }
        i += 1;
        if stop_at_eol && *state == ReadState::BeginLine {
            break;
        }
    }
    i
}

fn unexpected_eof() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "connection closed inside dot-encoded body",
    ))
}

/// Reader for one dot-encoded body.
///
/// Every body must be read to its terminator, either by reading it all or
/// with [`Self::discard`], before the stream is used again.
pub struct DotReader<'a, R> {
    reader: &'a mut FramedReader<R>,
    state: ReadState,
}

impl<'a, R> DotReader<'a, R>
where
    R: AsyncRead + Unpin,
{
    pub(super) fn new(reader: &'a mut FramedReader<R>) -> Self {
        Self {
            reader,
            state: ReadState::BeginLine,
        }
    }

    /// Returns true once the terminator line has been consumed.
    pub fn is_done(&self) -> bool {
        self.state == ReadState::Done
    }

    /// Decodes the next chunk of the body into `out`.
    ///
    /// Returns the number of bytes appended; zero means the body is
    /// complete.
    pub async fn read_chunk(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let before = out.len();
        while out.len() == before && self.state != ReadState::Done {
            let buf = self.reader.buffered().fill_buf().await?;
            if buf.is_empty() {
                return Err(unexpected_eof());
            }
            let used = decode(&mut self.state, buf, out, false);
            self.reader.buffered().consume(used);
        }
        Ok(out.len() - before)
    }

    /// Reads the next decoded line without its LF.
    ///
    /// Returns `Ok(None)` at the terminator. A line longer than the
    /// reader's line limit discards the rest of the body and fails with
    /// [`Error::LineTooLong`].
    pub async fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        let limit = self.reader.line_limit();
        let mut line = Vec::new();
        loop {
            if self.state == ReadState::Done {
                return Ok(if line.is_empty() { None } else { Some(line) });
            }
            let buf = self.reader.buffered().fill_buf().await?;
            if buf.is_empty() {
                return Err(unexpected_eof());
            }
            let used = decode(&mut self.state, buf, &mut line, true);
            self.reader.buffered().consume(used);

            if line.last() == Some(&b'\n') {
                line.pop();
                return Ok(Some(line));
            }
            if line.len() > limit {
                self.discard().await?;
                return Err(Error::LineTooLong { limit });
            }
        }
    }

    /// Reads the whole body.
    ///
    /// A body larger than `limit` is drained to its terminator and
    /// reported as [`Error::BodyTooLarge`], leaving the stream in sync.
    pub async fn read_to_end(&mut self, limit: usize) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        while self.read_chunk(&mut body).await? > 0 {
            if body.len() > limit {
                self.discard().await?;
                return Err(Error::BodyTooLarge { limit });
            }
        }
        Ok(body)
    }

    /// Skips the rest of the body.
    pub async fn discard(&mut self) -> Result<()> {
        let mut scratch = Vec::with_capacity(1024);
        while self.state != ReadState::Done {
            scratch.clear();
            self.read_chunk(&mut scratch).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    BeginLine,
    Cr,
    Data,
}

/// Writer for one dot-encoded body.
///
/// Encodes into the connection's write buffer. The terminator is appended
/// by [`Self::finish`], or by `Drop` if the writer is abandoned on an
/// early return, so the peer never sees an unterminated body.
pub struct DotWriter<'a> {
    buffer: &'a mut BytesMut,
    state: WriteState,
    finished: bool,
}

impl<'a> DotWriter<'a> {
    pub(super) fn new(buffer: &'a mut BytesMut) -> Self {
        Self {
            buffer,
            state: WriteState::BeginLine,
            finished: false,
        }
    }

    /// Encodes raw body bytes. LF becomes CRLF and leading dots are
    /// doubled.
    pub fn write(&mut self, data: &[u8]) {
        for &c in data {
            if self.state == WriteState::BeginLine && c == b'.' {
                self.buffer.extend_from_slice(b".");
            }
            match c {
                b'\n' => {
                    if self.state != WriteState::Cr {
                        self.buffer.extend_from_slice(b"\r");
                    }
                    self.buffer.extend_from_slice(b"\n");
                    self.state = WriteState::BeginLine;
                }
                b'\r' => {
                    self.buffer.extend_from_slice(b"\r");
                    self.state = WriteState::Cr;
                }
                _ => {
                    self.buffer.extend_from_slice(&[c]);
                    self.state = WriteState::Data;
                }
            }
        }
    }

    /// Encodes one line; the line terminator is added.
    pub fn write_line(&mut self, line: &str) {
        self.write(line.as_bytes());
        self.write(b"\n");
    }

    fn terminate(&mut self) {
        if self.finished {
            return;
        }
        if self.state != WriteState::BeginLine {
            self.buffer.extend_from_slice(b"\r\n");
        }
        self.buffer.extend_from_slice(b".\r\n");
        self.finished = true;
    }

    /// Appends the terminator. The caller flushes the connection.
    pub fn finish(mut self) {
        self.terminate();
    }
}

impl Drop for DotWriter<'_> {
    fn drop(&mut self) {
        self.terminate();
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

    fn encode(body: &[u8]) -> Vec<u8> {
        let mut buffer = BytesMut::new();
        let mut w = DotWriter::new(&mut buffer);
        w.write(body);
        w.finish();
        buffer.to_vec()
    }

    #[test]
    fn test_encode_stuffs_dots() {
        assert_eq!(encode(b"a\n.\n.foo\n"), b"a\r\n..\r\n..foo\r\n.\r\n");
        assert_eq!(encode(b""), b".\r\n");
        assert_eq!(encode(b"no newline"), b"no newline\r\n.\r\n");
        assert_eq!(encode(b"crlf\r\nkept\r\n"), b"crlf\r\nkept\r\n.\r\n");
    }

    #[test]
    fn test_drop_terminates() {
        let mut buffer = BytesMut::new();
        {
            let mut w = DotWriter::new(&mut buffer);
            w.write(b"partial");
        }
        assert_eq!(&buffer[..], b"partial\r\n.\r\n");
    }

    #[tokio::test]
    async fn test_decode_body() {
        let mock = Builder::new()
            .read(b"a\r\n..\r\n..foo\r\n.bar\r\n.\r\nNEXT\r\n")
            .build();
        let mut reader = FramedReader::new(mock, 512);
        let body = reader.dot_reader().read_to_end(1024).await.unwrap();
        assert_eq!(body, b"a\n.\n.foo\nbar\n");
        assert_eq!(reader.read_line().await.unwrap().unwrap(), b"NEXT");
    }

    #[tokio::test]
    async fn test_decode_split_terminator() {
        let mock = Builder::new()
            .read(b"line\r\n.")
            .read(b"\r")
            .read(b"\n")
            .build();
        let mut reader = FramedReader::new(mock, 512);
        let body = reader.dot_reader().read_to_end(1024).await.unwrap();
        assert_eq!(body, b"line\n");
    }

    #[tokio::test]
    async fn test_next_line() {
        let mock = Builder::new().read(b"one\r\n..two\r\n\r\n.\r\n").build();
        let mut reader = FramedReader::new(mock, 512);
        let mut dot = reader.dot_reader();
        assert_eq!(dot.next_line().await.unwrap().unwrap(), b"one");
        assert_eq!(dot.next_line().await.unwrap().unwrap(), b".two");
        assert_eq!(dot.next_line().await.unwrap().unwrap(), b"");
        assert!(dot.next_line().await.unwrap().is_none());
        assert!(dot.is_done());
    }

    #[tokio::test]
    async fn test_body_too_large_is_drained() {
        let mock = Builder::new()
            .read(b"0123456789\r\n0123456789\r\n.\r\n205 bye\r\n")
            .build();
        let mut reader = FramedReader::new(mock, 512);
        let err = reader.dot_reader().read_to_end(8).await.unwrap_err();
        assert!(matches!(err, Error::BodyTooLarge { limit: 8 }));
        assert_eq!(reader.read_line().await.unwrap().unwrap(), b"205 bye");
    }

    #[tokio::test]
    async fn test_discard() {
        let mock = Builder::new().read(b"x\r\ny\r\n.\r\nDATE\r\n").build();
        let mut reader = FramedReader::new(mock, 512);
        reader.dot_reader().discard().await.unwrap();
        assert_eq!(reader.read_line().await.unwrap().unwrap(), b"DATE");
    }

    #[tokio::test]
    async fn test_eof_inside_body() {
        let mock = Builder::new().read(b"x\r\n").build();
        let mut reader = FramedReader::new(mock, 512);
        let err = reader.dot_reader().read_to_end(1024).await.unwrap_err();
        assert!(err.is_transport());
    }
}
