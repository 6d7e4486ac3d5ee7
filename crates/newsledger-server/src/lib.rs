//! # newsledger-server
//!
//! NNTP server engine (RFC 3977, RFC 4642, RFC 4643, RFC 4644): the
//! command dispatcher, the per-connection session state machine and the
//! listener lifecycle. Content comes from a [`Provider`]; this crate owns
//! the wire, the status codes and the session rules.
//!
//! ## Features
//!
//! - **Table-driven dispatch** with arity checks before any handler runs
//! - **Reader commands**: GROUP, LISTGROUP, NEXT, LAST, ARTICLE, HEAD,
//!   BODY, STAT, OVER/XOVER, HDR/XHDR, NEWNEWS, NEWGROUPS, LIST, XGTITLE
//! - **Transit**: POST, IHAVE and streaming CHECK/TAKETHIS
//! - **Security**: STARTTLS, implicit TLS, AUTHINFO USER/PASS and client
//!   certificate login
//! - **Hot reload**: configuration snapshots taken per command
//! - **Cooperative shutdown** of listeners, then connections
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use newsledger_server::{ConfigHandle, ListenParams, RunConfig, Server};
//!
//! let server = Server::new(provider, ConfigHandle::new(RunConfig::default()));
//! server.listen("[::]:119".parse()?, ListenParams::default()).await?;
//! tokio::signal::ctrl_c().await?;
//! server.shutdown().await;
//! ```
//!
//! ## Modules
//!
//! - [`auth`]: privileges, user and certificate lookup
//! - [`command`]: command tables and arity rules
//! - [`config`]: run configuration and listener parameters
//! - [`provider`]: the content provider trait
//! - [`session`]: per-connection state
//! - [`server`]: listeners and the connection registry

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod command;
pub mod config;
mod connection;
mod error;
mod handlers;
pub mod provider;
pub mod server;
pub mod session;
pub mod stream;

pub use auth::{
    CertFpMap, CertFpProvider, UserInfo, UserPassMap, UserPassProvider, UserPriv,
    cert_fingerprint, parse_fingerprint,
};
pub use config::{ConfigHandle, ListenParams, RunConfig, RunConfigBuilder};
pub use error::{Error, ProviderError, ProviderResult, Result};
pub use provider::{
    Article, ArticlePart, ArticleTarget, GroupSummary, Provider, Received, Wanted,
};
pub use server::Server;
pub use session::Session;
