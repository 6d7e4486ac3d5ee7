//! Core NNTP types.
//!
//! Identifiers and arguments as they appear on the wire, following
//! RFC 3977 and RFC 5536.

#![allow(clippy::missing_const_for_fn)]

mod capability;
mod datetime;
pub mod group;
mod header;
pub mod message_id;
mod range;
mod response_code;

pub use capability::Capability;
pub use datetime::{DateTimeError, format_query_date, format_server_date, parse_date_time};
pub use group::GroupName;
pub use header::{OVERVIEW_FORMAT, is_valid_header_query};
pub use message_id::MessageId;
pub use range::ArticleRange;
pub use response_code::ResponseCode;
