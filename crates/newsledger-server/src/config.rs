//! Server run configuration.
//!
//! A [`RunConfig`] is immutable once built. [`ConfigHandle`] publishes
//! snapshots: each connection takes one snapshot per command and a reload
//! swaps in a new `Arc` without touching sessions already running.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::{CertFpProvider, UserPassProvider, UserPriv};

/// Name advertised in `IMPLEMENTATION` by default.
pub const DEFAULT_IMPLEMENTATION: &str = "newsledger";

/// Largest article accepted by POST, IHAVE and TAKETHIS by default.
pub const DEFAULT_MAX_ARTICLE_SIZE: usize = 16 * 1024 * 1024;

/// Server settings that may change at run time.
#[derive(Clone)]
pub struct RunConfig {
    /// Privileges every new session starts with.
    pub default_priv: UserPriv,
    /// TLS settings; enables STARTTLS (or NNTPS with `implicit_tls`).
    pub tls: Option<Arc<rustls::ServerConfig>>,
    /// Run TLS before the greeting instead of offering STARTTLS.
    pub implicit_tls: bool,
    /// Privileges added once TLS is active.
    pub tls_priv: UserPriv,
    /// Source of AUTHINFO USER/PASS accounts.
    pub user_pass: Option<Arc<dyn UserPassProvider>>,
    /// Source of client certificate fingerprints.
    pub cert_fp: Option<Arc<dyn CertFpProvider>>,
    /// Authenticate clients by certificate fingerprint after the handshake.
    pub cert_fp_auto_auth: bool,
    /// Allow AUTHINFO over plaintext connections.
    pub unsafe_pass: bool,
    /// Reject unknown users at AUTHINFO USER, which reveals which names
    /// exist.
    pub unsafe_early_user_reject: bool,
    /// Name advertised in CAPABILITIES.
    pub implementation: String,
    /// Largest accepted article body.
    pub max_article_size: usize,
}

impl RunConfig {
    /// Creates a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::new()
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            default_priv: UserPriv::ALL,
            tls: None,
            implicit_tls: false,
            tls_priv: UserPriv::NONE,
            user_pass: None,
            cert_fp: None,
            cert_fp_auto_auth: false,
            unsafe_pass: false,
            unsafe_early_user_reject: false,
            implementation: DEFAULT_IMPLEMENTATION.to_owned(),
            max_article_size: DEFAULT_MAX_ARTICLE_SIZE,
        }
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("default_priv", &self.default_priv)
            .field("tls", &self.tls.is_some())
            .field("implicit_tls", &self.implicit_tls)
            .field("tls_priv", &self.tls_priv)
            .field("user_pass", &self.user_pass.is_some())
            .field("cert_fp", &self.cert_fp.is_some())
            .field("cert_fp_auto_auth", &self.cert_fp_auto_auth)
            .field("unsafe_pass", &self.unsafe_pass)
            .field("unsafe_early_user_reject", &self.unsafe_early_user_reject)
            .field("implementation", &self.implementation)
            .field("max_article_size", &self.max_article_size)
            .finish()
    }
}

/// Builder for [`RunConfig`].
#[derive(Debug, Clone, Default)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the privileges sessions start with.
    #[must_use]
    pub const fn default_priv(mut self, privileges: UserPriv) -> Self {
        self.config.default_priv = privileges;
        self
    }

    /// Sets the TLS server configuration.
    #[must_use]
    pub fn tls(mut self, tls: Arc<rustls::ServerConfig>) -> Self {
        self.config.tls = Some(tls);
        self
    }

    /// Runs TLS before the greeting.
    #[must_use]
    pub const fn implicit_tls(mut self, enabled: bool) -> Self {
        self.config.implicit_tls = enabled;
        self
    }

    /// Sets the privileges added once TLS is active.
    #[must_use]
    pub const fn tls_priv(mut self, privileges: UserPriv) -> Self {
        self.config.tls_priv = privileges;
        self
    }

    /// Sets the AUTHINFO account source.
    #[must_use]
    pub fn user_pass(mut self, provider: Arc<dyn UserPassProvider>) -> Self {
        self.config.user_pass = Some(provider);
        self
    }

    /// Sets the certificate fingerprint source.
    #[must_use]
    pub fn cert_fp(mut self, provider: Arc<dyn CertFpProvider>) -> Self {
        self.config.cert_fp = Some(provider);
        self
    }

    /// Enables certificate fingerprint auto-authentication.
    #[must_use]
    pub const fn cert_fp_auto_auth(mut self, enabled: bool) -> Self {
        self.config.cert_fp_auto_auth = enabled;
        self
    }

    /// Allows AUTHINFO without TLS.
    #[must_use]
    pub const fn unsafe_pass(mut self, enabled: bool) -> Self {
        self.config.unsafe_pass = enabled;
        self
    }

    /// Rejects unknown users at AUTHINFO USER.
    #[must_use]
    pub const fn unsafe_early_user_reject(mut self, enabled: bool) -> Self {
        self.config.unsafe_early_user_reject = enabled;
        self
    }

    /// Sets the advertised implementation name.
    #[must_use]
    pub fn implementation(mut self, name: impl Into<String>) -> Self {
        self.config.implementation = name.into();
        self
    }

    /// Sets the largest accepted article.
    #[must_use]
    pub const fn max_article_size(mut self, bytes: usize) -> Self {
        self.config.max_article_size = bytes;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> RunConfig {
        self.config
    }
}

/// Shared, atomically replaceable [`RunConfig`].
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    tx: Arc<watch::Sender<Arc<RunConfig>>>,
}

impl ConfigHandle {
    /// Creates a handle publishing `config`.
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(config));
        Self { tx: Arc::new(tx) }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RunConfig> {
        Arc::clone(&self.tx.borrow())
    }

    /// Replaces the configuration. Commands already running keep the
    /// snapshot they started with.
    pub fn publish(&self, config: RunConfig) {
        self.tx.send_replace(Arc::new(config));
    }
}

/// Socket options applied to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenParams {
    /// Enable TCP keep-alive on accepted sockets.
    pub keepalive: bool,
    /// Disable Nagle's algorithm on accepted sockets.
    pub nodelay: bool,
    /// Listen backlog.
    pub backlog: u32,
}

impl Default for ListenParams {
    fn default() -> Self {
        Self {
            keepalive: true,
            nodelay: true,
            backlog: 1024,
        }
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
    use crate::auth::UserPassMap;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.default_priv, UserPriv::ALL);
        assert!(config.tls.is_none());
        assert!(!config.unsafe_pass);
        assert_eq!(config.implementation, "newsledger");
    }

    #[test]
    fn test_builder() {
        let config = RunConfig::builder()
            .default_priv(UserPriv::NONE)
            .unsafe_pass(true)
            .user_pass(Arc::new(UserPassMap::new()))
            .implementation("test")
            .max_article_size(10)
            .build();
        assert_eq!(config.default_priv, UserPriv::NONE);
        assert!(config.unsafe_pass);
        assert!(config.user_pass.is_some());
        assert_eq!(config.implementation, "test");
        assert_eq!(config.max_article_size, 10);
    }

    #[test]
    fn test_handle_publishes_snapshots() {
        let handle = ConfigHandle::new(RunConfig::default());
        let before = handle.snapshot();
        handle.publish(RunConfig::builder().unsafe_pass(true).build());
        let after = handle.snapshot();
        assert!(!before.unsafe_pass);
        assert!(after.unsafe_pass);
        assert!(handle.clone().snapshot().unsafe_pass);
    }

    #[test]
    fn test_debug_summarises_providers() {
        let config = RunConfig::builder()
            .user_pass(Arc::new(UserPassMap::new()))
            .build();
        let text = format!("{config:?}");
        assert!(text.contains("user_pass: true"));
        assert!(text.contains("cert_fp: false"));
    }
}
