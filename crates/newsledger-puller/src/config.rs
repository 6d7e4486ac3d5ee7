//! Puller configuration.

use std::time::Duration;

use newsledger_nntp::Wildmat;

/// Transport security towards the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plaintext (port 119).
    #[default]
    None,
    /// TLS from the first byte (NNTPS, port 563).
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 119,
            Self::Implicit => 563,
        }
    }
}

/// Configuration for one remote.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct PullerConfig {
    /// Remote hostname.
    pub host: String,
    /// Remote port.
    pub port: u16,
    /// Transport security.
    pub security: Security,
    /// Limit on TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
    /// Delay before reconnecting after a dial or protocol error.
    pub retry_delay: Duration,
    /// Delay before reconnecting after the remote ended the session.
    pub idle_delay: Duration,
    /// Delay between two scan passes on one connection.
    pub rescan_delay: Duration,
    /// Groups the remote lists that are not tracked yet and match this
    /// pattern start being tracked from article 1.
    pub auto_add: Option<Wildmat>,
    /// Ask the remote for groups created since the last pass.
    pub new_groups: bool,
    /// Sweep NEWNEWS after each group scan when the remote offers it.
    pub new_news: bool,
    /// Largest article body accepted from the remote.
    pub max_article_size: usize,
}

impl PullerConfig {
    /// Creates a plaintext configuration on port 119.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        PullerConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> PullerConfigBuilder {
        PullerConfigBuilder::new(host)
    }

    /// Returns `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns true if a group first seen on the remote should be tracked.
    #[must_use]
    pub fn wants_new_group(&self, name: &str) -> bool {
        self.auto_add.as_ref().is_some_and(|w| w.matches(name))
    }
}

/// Builder for [`PullerConfig`].
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct PullerConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    connect_timeout: Duration,
    retry_delay: Duration,
    idle_delay: Duration,
    rescan_delay: Duration,
    auto_add: Option<Wildmat>,
    new_groups: bool,
    new_news: bool,
    max_article_size: usize,
}

impl PullerConfigBuilder {
    /// Creates a builder with the default delays (10 s retry, 120 s idle,
    /// 90 s rescan).
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::None,
            connect_timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(10),
            idle_delay: Duration::from_secs(120),
            rescan_delay: Duration::from_secs(90),
            auto_add: None,
            new_groups: false,
            new_news: false,
            max_article_size: 4 * 1024 * 1024,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the delay after a failed session.
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets the delay after a session the remote ended.
    #[must_use]
    pub const fn idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    /// Sets the delay between scan passes.
    #[must_use]
    pub const fn rescan_delay(mut self, delay: Duration) -> Self {
        self.rescan_delay = delay;
        self
    }

    /// Sets the auto-add pattern for unseen groups.
    #[must_use]
    pub fn auto_add(mut self, pattern: Wildmat) -> Self {
        self.auto_add = Some(pattern);
        self
    }

    /// Enables NEWGROUPS discovery.
    #[must_use]
    pub const fn new_groups(mut self, enabled: bool) -> Self {
        self.new_groups = enabled;
        self
    }

    /// Enables the NEWNEWS sweep.
    #[must_use]
    pub const fn new_news(mut self, enabled: bool) -> Self {
        self.new_news = enabled;
        self
    }

    /// Sets the largest accepted article.
    #[must_use]
    pub const fn max_article_size(mut self, size: usize) -> Self {
        self.max_article_size = size;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> PullerConfig {
        PullerConfig {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            connect_timeout: self.connect_timeout,
            retry_delay: self.retry_delay,
            idle_delay: self.idle_delay,
            rescan_delay: self.rescan_delay,
            auto_add: self.auto_add,
            new_groups: self.new_groups,
            new_news: self.new_news,
            max_article_size: self.max_article_size,
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

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 119);
        assert_eq!(Security::Implicit.default_port(), 563);
    }

    #[test]
    fn test_defaults() {
        let config = PullerConfig::new("news.example.com");
        assert_eq!(config.address(), "news.example.com:119");
        assert_eq!(config.retry_delay, Duration::from_secs(10));
        assert_eq!(config.idle_delay, Duration::from_secs(120));
        assert_eq!(config.rescan_delay, Duration::from_secs(90));
        assert!(!config.new_groups);
        assert!(!config.wants_new_group("misc.test"));
    }

    #[test]
    fn test_builder() {
        let config = PullerConfig::builder("news.example.com")
            .security(Security::Implicit)
            .retry_delay(Duration::from_secs(1))
            .auto_add(Wildmat::compile("misc.*,!misc.secret").unwrap())
            .new_news(true)
            .build();
        assert_eq!(config.port, 563);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert!(config.new_news);
        assert!(config.wants_new_group("misc.test"));
        assert!(!config.wants_new_group("misc.secret"));
        assert!(!config.wants_new_group("alt.test"));

        let config = PullerConfig::builder("localhost").port(1119).build();
        assert_eq!(config.address(), "localhost:1119");
    }
}
