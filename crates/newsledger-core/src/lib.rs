//! # newsledger-core
//!
//! Reference storage for newsledger.
//!
//! This crate provides:
//! - An in-memory article spool numbering articles per group
//! - Overview and header extraction for OVER and HDR
//! - The spool as the server's content provider
//! - Per-remote synchronisation state for pullers, filing into the spool

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod spool;
pub mod sync;

pub use error::{Error, Result};
pub use spool::{Filing, ParsedArticle, Spool, StoredArticle};
pub use sync::SpoolSyncStore;
