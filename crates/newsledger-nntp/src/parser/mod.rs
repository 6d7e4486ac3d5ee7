//! Sans-I/O parsers for NNTP lines.
//!
//! Everything here works on complete lines with the terminator already
//! stripped; reading those lines off the wire is the job of
//! [`crate::framing`].

mod command;
mod listing;
mod response;

pub use command::{ArgSplit, CommandLine, split_args};
pub use listing::{ActiveEntry, GroupStatus, HdrEntry, NewsgroupsEntry, Overview};
pub use response::{Response, parse_response};
