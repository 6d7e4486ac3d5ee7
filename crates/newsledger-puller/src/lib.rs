//! # newsledger-puller
//!
//! Mirrors newsgroups from a remote NNTP server into a local store.
//! Progress is kept as a per-group watermark that only moves past
//! articles that were fully dealt with, so an interrupted run resumes
//! where it stopped and never ingests an article twice.
//!
//! ## Features
//!
//! - **Capability discovery** with MODE READER fallback
//! - **Group listing** via LIST ACTIVE, falling back to LIST NEWSGROUPS
//! - **Slice listing** via HDR, XHDR, OVER and XOVER, remembering which
//!   methods the remote refused
//! - **Pipelined fetching** with a bounded request queue
//! - **Remote quirks** for srndv2 and CNTPD servers
//! - **Optional** NEWGROUPS auto-add and NEWNEWS sweeps
//! - **Plain or implicit TLS** connections via rustls
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use newsledger_puller::{Puller, PullerConfig, Security};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = PullerConfig::builder("news.example.org")
//!     .security(Security::Implicit)
//!     .build();
//! let puller = Puller::new(config, store);
//! puller.run(CancellationToken::new()).await;
//! ```
//!
//! ## Modules
//!
//! - [`client`]: the reader connection and what it learned
//! - [`config`]: remote address, delays and policies
//! - [`pipeline`]: pipelined article fetching
//! - [`quirks`]: remote implementation workarounds
//! - [`store`]: the local store the puller writes to
//! - [`stream`]: plain and TLS transports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod client;
pub mod config;
mod error;
pub mod pipeline;
mod puller;
pub mod quirks;
pub mod store;
pub mod stream;

#[cfg(test)]
mod testing;

pub use client::{Client, RemoteGroup, RemoteState};
pub use config::{PullerConfig, PullerConfigBuilder, Security};
pub use error::{Error, Result, StoreError, StoreResult};
pub use pipeline::{ArticleRef, Progress};
pub use puller::{PassReport, Puller};
pub use quirks::{RemoteKind, RemoteQuirks};
pub use store::{Ingest, SyncStore, TempGroup};
pub use stream::{PullStream, default_tls_config};
