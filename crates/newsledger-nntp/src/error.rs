//! Error types for NNTP framing and grammar.

use std::io;

/// Result type alias for NNTP protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// NNTP protocol error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A line did not fit into the line buffer.
    ///
    /// The remainder of the line is still pending on the wire and must be
    /// drained with [`crate::framing::FramedReader::discard_line`].
    #[error("line exceeds {limit} bytes")]
    LineTooLong {
        /// Configured line limit, terminator included.
        limit: usize,
    },

    /// Status line is not `DDD` or `DDD SP text`.
    #[error("response {0:?} not understood")]
    InvalidResponse(String),

    /// Status code outside of 100..=599.
    #[error("response code {0} out of range")]
    CodeOutOfRange(u16),

    /// Malformed listing line, argument or identifier.
    #[error("parse error: {0}")]
    Parse(String),

    /// A dot-encoded body exceeded the accepted size and was discarded.
    #[error("body exceeds {limit} bytes")]
    BodyTooLarge {
        /// Configured body limit.
        limit: usize,
    },

    /// Protocol violation or unexpected data.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Creates a parse error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Returns true if the transport is unusable after this error.
    ///
    /// Grammar errors leave the byte stream framed correctly and can be
    /// answered or skipped; I/O errors cannot.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_))
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
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::LineTooLong { limit: 512 };
        assert_eq!(err.to_string(), "line exceeds 512 bytes");

        let err = Error::CodeOutOfRange(700);
        assert_eq!(err.to_string(), "response code 700 out of range");
    }

    #[test]
    fn test_is_transport() {
        let err = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(err.is_transport());
        assert!(!Error::parse("bad").is_transport());
    }
}
