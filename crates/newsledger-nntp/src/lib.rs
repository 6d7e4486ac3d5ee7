//! # newsledger-nntp
//!
//! NNTP protocol building blocks shared by the newsledger server and
//! puller: wire framing, the wildmat pattern language, and the grammar of
//! identifiers, arguments and listings (RFC 3977, RFC 2980, RFC 4644).
//!
//! ## Features
//!
//! - **Line framing** with a hard line limit that reports oversized lines
//!   instead of truncating them
//! - **Dot-encoded bodies**: streaming decoder and an encoder that always
//!   terminates the body, even when dropped early
//! - **Split halves** so a client can pipeline requests while another
//!   future consumes the responses
//! - **Wildmat** compilation with last-match-wins semantics
//! - **Sans-I/O parsers** for status lines and LIST/OVER/HDR listings
//!
//! ## Example
//!
//! ```ignore
//! use newsledger_nntp::{FramedStream, ResponseCode, parse_response};
//!
//! let mut framed = FramedStream::new(tcp);
//! let greeting = parse_response(&framed.read_line_required().await?)?;
//! framed.send_line("LIST ACTIVE").await?;
//! let status = parse_response(&framed.read_line_required().await?)?;
//! if status.code == ResponseCode::LIST_FOLLOWS {
//!     let mut body = framed.reader().dot_reader();
//!     while let Some(line) = body.next_line().await? {
//!         println!("{}", String::from_utf8_lossy(&line));
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`framing`]: line reader/writer and dot-encoded bodies
//! - [`parser`]: status line, command line and listing parsers
//! - [`types`]: response codes, Message-IDs, group names, ranges, dates
//! - [`wildmat`]: wildmat validation and matching

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod framing;
pub mod parser;
pub mod types;
pub mod wildmat;

pub use error::{Error, Result};
pub use framing::{DotReader, DotWriter, FramedReader, FramedStream, FramedWriter};
pub use parser::{
    ActiveEntry, CommandLine, GroupStatus, HdrEntry, NewsgroupsEntry, Overview, Response,
    parse_response, split_args,
};
pub use types::{ArticleRange, Capability, GroupName, MessageId, ResponseCode};
pub use wildmat::{InvalidWildmat, Wildmat};
