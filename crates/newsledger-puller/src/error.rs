//! Error types for the puller.

use std::io;
use std::time::Duration;

/// Result type alias for puller operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while talking to a remote or to the local store.
///
/// [`Error::is_fatal`] separates errors that leave the connection unusable
/// (drop it and back off) from errors that only end the current group or
/// slice.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on the socket.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Host name not usable for TLS verification.
    #[error("invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Framing or grammar error from the wire layer.
    #[error("NNTP error: {0}")]
    Nntp(#[from] newsledger_nntp::Error),

    /// The synchronisation store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The remote answered with a status the exchange does not allow.
    #[error("unexpected response {code} {text:?}")]
    UnexpectedResponse {
        /// Status code.
        code: u16,
        /// Status text.
        text: String,
    },

    /// The remote does not carry the group (`411`).
    #[error("no such group {0}")]
    NoSuchGroup(String),

    /// Every method for an exchange was rejected by this remote.
    #[error("no usable method to {0}")]
    NoMethod(&'static str),

    /// The article consumer stopped with responses still in flight.
    #[error("article consumer failed: {0}")]
    ConsumerFailed(#[source] Box<Error>),

    /// The remote ended the session (`400`).
    #[error("remote closed the session: {0}")]
    Discontinued(String),

    /// Connecting took longer than allowed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Protocol violation or unexpected data.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns true if the connection can no longer be used.
    ///
    /// Non-fatal errors leave the byte stream on a response boundary.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Nntp(e) => !matches!(e, newsledger_nntp::Error::Parse(_)),
            Self::Io(_)
            | Self::Tls(_)
            | Self::InvalidDnsName(_)
            | Self::ConsumerFailed(_)
            | Self::Discontinued(_)
            | Self::Timeout(_)
            | Self::Protocol(_) => true,
            Self::Store(_)
            | Self::UnexpectedResponse { .. }
            | Self::NoSuchGroup(_)
            | Self::NoMethod(_) => false,
        }
    }

    pub(crate) fn unexpected(response: &newsledger_nntp::Response) -> Self {
        Self::UnexpectedResponse {
            code: response.code.as_u16(),
            text: response.text.clone(),
        }
    }
}

/// Failure inside a [`crate::SyncStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl StoreError {
    /// Creates a store error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result type alias for store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

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
    fn test_fatal_classification() {
        assert!(Error::from(io::Error::from(io::ErrorKind::BrokenPipe)).is_fatal());
        assert!(Error::Protocol("bad greeting".into()).is_fatal());
        assert!(Error::ConsumerFailed(Box::new(Error::Store(StoreError::new("disk")))).is_fatal());
        assert!(Error::from(newsledger_nntp::Error::LineTooLong { limit: 512 }).is_fatal());

        assert!(!Error::from(newsledger_nntp::Error::parse("bad line")).is_fatal());
        assert!(!Error::Store(StoreError::new("busy")).is_fatal());
        assert!(!Error::NoSuchGroup("misc.test".into()).is_fatal());
        assert!(!Error::NoMethod("list groups").is_fatal());
        assert!(
            !Error::UnexpectedResponse {
                code: 502,
                text: "no".into()
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_display() {
        let err = Error::UnexpectedResponse {
            code: 480,
            text: "authentication required".into(),
        };
        assert_eq!(
            err.to_string(),
            "unexpected response 480 \"authentication required\""
        );
        let err = Error::ConsumerFailed(Box::new(Error::Store(StoreError::new("disk full"))));
        assert_eq!(
            err.to_string(),
            "article consumer failed: store error: disk full"
        );
    }
}
