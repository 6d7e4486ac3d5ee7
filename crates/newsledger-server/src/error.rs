//! Error types for the NNTP server.

use std::io;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that end a connection or a listener.
///
/// Negative protocol outcomes (no such group, no such article, ...) are
/// never errors; they are answered on the wire and the session goes on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on the socket.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS handshake or configuration error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Framing error from the wire layer.
    #[error("NNTP error: {0}")]
    Nntp(#[from] newsledger_nntp::Error),

    /// The connection must be dropped without a further response.
    #[error("connection aborted: {0}")]
    Abort(String),

    /// Invalid server configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true for an orderly end of stream.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        let io = match self {
            Self::Io(e) => e,
            Self::Nntp(newsledger_nntp::Error::Io(e)) => e,
            _ => return false,
        };
        matches!(
            io.kind(),
            io::ErrorKind::UnexpectedEof
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::BrokenPipe
        )
    }
}

/// Failure inside a content provider.
///
/// Answered with `403` and logged; the connection stays usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

impl ProviderError {
    /// Creates a provider error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result type alias for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

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
    fn test_disconnect_classification() {
        let eof = Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(eof.is_disconnect());
        let nested = Error::Nntp(newsledger_nntp::Error::Io(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset",
        )));
        assert!(nested.is_disconnect());
        assert!(!Error::Abort("bye".into()).is_disconnect());
    }

    #[test]
    fn test_provider_error_display() {
        assert_eq!(ProviderError::new("db down").to_string(), "db down");
    }
}
