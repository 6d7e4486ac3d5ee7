//! Error types for the spool.

use thiserror::Error;

/// Reasons an article cannot be filed.
///
/// The display text doubles as the refusal reason sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A required header is absent.
    #[error("missing {0} header")]
    MissingHeader(&'static str),

    /// The header block could not be parsed.
    #[error("malformed article: {0}")]
    Malformed(String),

    /// The Message-ID header disagrees with the one offered.
    #[error("Message-ID header {found} does not match {expected}")]
    IdMismatch {
        /// Offered Message-ID.
        expected: String,
        /// Message-ID found in the headers.
        found: String,
    },

    /// None of the article's newsgroups is carried here.
    #[error("no wanted newsgroups")]
    NoGroups,

    /// A group in the article does not accept posts.
    #[error("posting to {0} not allowed")]
    PostingNotAllowed(String),

    /// Grammar error from the protocol layer.
    #[error("{0}")]
    Grammar(String),
}

impl From<newsledger_nntp::Error> for Error {
    fn from(error: newsledger_nntp::Error) -> Self {
        Self::Grammar(error.to_string())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
