//! Settings file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use newsledger_nntp::{GroupName, Wildmat};
use newsledger_puller::{PullerConfig, Security};
use newsledger_server::{
    CertFpMap, ListenParams, RunConfig, UserPassMap, UserPriv, parse_fingerprint,
};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use serde::{Deserialize, Serialize};

/// Everything the binary reads at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Host name used in Xref headers and generated Message-IDs.
    pub hostname: String,
    /// Groups carried by the spool.
    pub groups: Vec<GroupSettings>,
    /// Addresses to accept readers and peers on.
    pub listeners: Vec<ListenerSettings>,
    /// Socket options shared by all listeners.
    pub socket: SocketSettings,
    /// Server certificate; enables STARTTLS and NNTPS listeners.
    pub tls: Option<TlsSettings>,
    /// What a session may do before authenticating.
    pub default_priv: PrivSettings,
    /// What a session gains once TLS is active.
    pub tls_priv: PrivSettings,
    /// AUTHINFO USER/PASS accounts.
    pub users: Vec<UserSettings>,
    /// Client certificate logins.
    pub certificates: Vec<CertificateSettings>,
    /// Log in certificate holders right after the handshake.
    pub cert_fp_auto_auth: bool,
    /// Allow AUTHINFO without TLS.
    pub unsafe_pass: bool,
    /// Reject unknown users already at AUTHINFO USER.
    pub unsafe_early_user_reject: bool,
    /// Remotes to pull articles from.
    pub peers: Vec<PeerSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hostname: "newsledger".to_owned(),
            groups: Vec::new(),
            listeners: vec![ListenerSettings {
                addr: SocketAddr::from(([0, 0, 0, 0], 119)),
                implicit_tls: false,
            }],
            socket: SocketSettings::default(),
            tls: None,
            default_priv: PrivSettings::ALL,
            tls_priv: PrivSettings::NONE,
            users: Vec::new(),
            certificates: Vec::new(),
            cert_fp_auto_auth: false,
            unsafe_pass: false,
            unsafe_early_user_reject: false,
            peers: Vec::new(),
        }
    }
}

/// A carried newsgroup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSettings {
    /// Group name.
    pub name: String,
    /// LIST NEWSGROUPS description.
    #[serde(default)]
    pub description: String,
    /// Whether POST may target the group.
    #[serde(default = "yes")]
    pub posting: bool,
}

/// One listening socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerSettings {
    /// Address to bind.
    pub addr: SocketAddr,
    /// Run TLS from the first byte (NNTPS).
    #[serde(default)]
    pub implicit_tls: bool,
}

/// Socket options, see [`ListenParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketSettings {
    /// TCP keep-alive on accepted sockets.
    pub keepalive: bool,
    /// Disable Nagle's algorithm.
    pub nodelay: bool,
    /// Listen backlog.
    pub backlog: u32,
}

impl Default for SocketSettings {
    fn default() -> Self {
        let params = ListenParams::default();
        Self {
            keepalive: params.keepalive,
            nodelay: params.nodelay,
            backlog: params.backlog,
        }
    }
}

impl From<SocketSettings> for ListenParams {
    fn from(socket: SocketSettings) -> Self {
        Self {
            keepalive: socket.keepalive,
            nodelay: socket.nodelay,
            backlog: socket.backlog,
        }
    }
}

/// PEM files for the server certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSettings {
    /// Certificate chain, leaf first.
    pub cert: PathBuf,
    /// Private key.
    pub key: PathBuf,
    /// CA bundle for client certificates; when set, clients may present
    /// a certificate for fingerprint login.
    #[serde(default)]
    pub client_ca: Option<PathBuf>,
}

impl TlsSettings {
    /// Loads the certificate and key into a rustls server config.
    pub fn load(&self) -> anyhow::Result<Arc<rustls::ServerConfig>> {
        let certs = CertificateDer::pem_file_iter(&self.cert)
            .with_context(|| format!("reading {}", self.cert.display()))?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("parsing {}", self.cert.display()))?;
        if certs.is_empty() {
            bail!("no certificate in {}", self.cert.display());
        }
        let key = PrivateKeyDer::from_pem_file(&self.key)
            .with_context(|| format!("reading {}", self.key.display()))?;
        let builder = rustls::ServerConfig::builder();
        let builder = match &self.client_ca {
            Some(path) => {
                let mut roots = rustls::RootCertStore::empty();
                for cert in CertificateDer::pem_file_iter(path)
                    .with_context(|| format!("reading {}", path.display()))?
                {
                    roots.add(cert.with_context(|| format!("parsing {}", path.display()))?)?;
                }
                let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
                    .allow_unauthenticated()
                    .build()?;
                builder.with_client_cert_verifier(verifier)
            }
            None => builder.with_no_client_auth(),
        };
        let config = builder
            .with_single_cert(certs, key)
            .context("building TLS configuration")?;
        Ok(Arc::new(config))
    }
}

/// Read and post flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivSettings {
    /// Reading commands.
    #[serde(default)]
    pub read: bool,
    /// Posting and transfer commands.
    #[serde(default)]
    pub post: bool,
}

impl PrivSettings {
    const ALL: Self = Self {
        read: true,
        post: true,
    };

    const NONE: Self = Self {
        read: false,
        post: false,
    };
}

impl From<PrivSettings> for UserPriv {
    fn from(privileges: PrivSettings) -> Self {
        Self {
            read: privileges.read,
            post: privileges.post,
        }
    }
}

/// An AUTHINFO account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    /// User name.
    pub name: String,
    /// Password; absent accepts the user without AUTHINFO PASS.
    #[serde(default)]
    pub password: Option<String>,
    /// Granted privileges.
    #[serde(default = "all")]
    pub privileges: PrivSettings,
}

/// A client certificate login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSettings {
    /// SHA-256 fingerprint in hex, `:` separators allowed.
    pub fingerprint: String,
    /// User the certificate logs in as.
    pub user: String,
    /// Granted privileges.
    #[serde(default = "all")]
    pub privileges: PrivSettings,
}

/// A remote to pull from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSettings {
    /// Host name or address.
    pub host: String,
    /// Port; defaults by security mode.
    #[serde(default)]
    pub port: Option<u16>,
    /// Use NNTPS.
    #[serde(default)]
    pub tls: bool,
    /// Wildmat of unseen groups to start tracking.
    #[serde(default)]
    pub auto_add: Option<String>,
    /// Ask for NEWGROUPS on every pass.
    #[serde(default)]
    pub new_groups: bool,
    /// Sweep NEWNEWS over tracked groups.
    #[serde(default)]
    pub new_news: bool,
    /// Seconds to wait after a failed session.
    #[serde(default)]
    pub retry_secs: Option<u64>,
    /// Seconds to wait after the remote discontinued service.
    #[serde(default)]
    pub idle_secs: Option<u64>,
    /// Seconds between passes in one session.
    #[serde(default)]
    pub rescan_secs: Option<u64>,
}

impl PeerSettings {
    /// Builds the puller configuration for this remote.
    pub fn puller_config(&self) -> anyhow::Result<PullerConfig> {
        let security = if self.tls {
            Security::Implicit
        } else {
            Security::None
        };
        let mut builder = PullerConfig::builder(self.host.clone())
            .security(security)
            .port(self.port.unwrap_or_else(|| security.default_port()))
            .new_groups(self.new_groups)
            .new_news(self.new_news);
        if let Some(pattern) = &self.auto_add {
            builder = builder.auto_add(Wildmat::compile(pattern)?);
        }
        if let Some(secs) = self.retry_secs {
            builder = builder.retry_delay(Duration::from_secs(secs));
        }
        if let Some(secs) = self.idle_secs {
            builder = builder.idle_delay(Duration::from_secs(secs));
        }
        if let Some(secs) = self.rescan_secs {
            builder = builder.rescan_delay(Duration::from_secs(secs));
        }
        Ok(builder.build())
    }
}

const fn yes() -> bool {
    true
}

const fn all() -> PrivSettings {
    PrivSettings::ALL
}

impl Settings {
    /// Default location: `<config dir>/newsledger/settings.json`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("newsledger")
            .join("settings.json")
    }

    /// Reads settings from `path`.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parses and checks a settings document.
    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let settings: Self = serde_json::from_str(contents)?;
        if settings.tls.is_none() && settings.listeners.iter().any(|l| l.implicit_tls) {
            bail!("implicit TLS listener without a tls section");
        }
        for group in &settings.groups {
            GroupName::parse(group.name.as_bytes())?;
        }
        for peer in &settings.peers {
            peer.puller_config()?;
        }
        Ok(settings)
    }

    /// Validated group names with their settings.
    pub fn groups(&self) -> anyhow::Result<Vec<(GroupName, &GroupSettings)>> {
        self.groups
            .iter()
            .map(|group| Ok((GroupName::parse(group.name.as_bytes())?, group)))
            .collect()
    }

    /// Builds the run configuration for one listener.
    pub fn run_config(
        &self,
        listener: &ListenerSettings,
        tls: Option<Arc<rustls::ServerConfig>>,
    ) -> anyhow::Result<RunConfig> {
        let mut builder = RunConfig::builder()
            .default_priv(self.default_priv.into())
            .tls_priv(self.tls_priv.into())
            .implicit_tls(listener.implicit_tls)
            .cert_fp_auto_auth(self.cert_fp_auto_auth)
            .unsafe_pass(self.unsafe_pass)
            .unsafe_early_user_reject(self.unsafe_early_user_reject)
            .implementation(format!("newsledger {}", env!("CARGO_PKG_VERSION")));
        if let Some(tls) = tls {
            builder = builder.tls(tls);
        }
        if !self.users.is_empty() {
            let mut users = UserPassMap::new();
            for user in &self.users {
                users.insert(&user.name, user.password.clone(), user.privileges.into())?;
            }
            builder = builder.user_pass(Arc::new(users));
        }
        if !self.certificates.is_empty() {
            let mut certificates = CertFpMap::new();
            for cert in &self.certificates {
                certificates.insert(
                    parse_fingerprint(&cert.fingerprint)?,
                    &cert.user,
                    cert.privileges.into(),
                )?;
            }
            builder = builder.cert_fp(Arc::new(certificates));
        }
        Ok(builder.build())
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
    fn test_empty_document_uses_defaults() {
        let settings = Settings::parse("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.listeners[0].addr.port(), 119);
    }

    #[test]
    fn test_full_document() {
        let settings = Settings::parse(
            r#"{
                "hostname": "news.example.org",
                "groups": [{"name": "misc.test", "description": "Testing"}],
                "listeners": [{"addr": "127.0.0.1:1119"}],
                "default_priv": {"read": true},
                "users": [{"name": "alice", "password": "secret"}],
                "peers": [{"host": "news.example.net", "tls": true, "auto_add": "comp.*"}]
            }"#,
        )
        .unwrap();
        assert_eq!(settings.hostname, "news.example.org");
        let groups = settings.groups().unwrap();
        assert_eq!(groups[0].0.as_str(), "misc.test");
        assert!(groups[0].1.posting);

        let config = settings
            .run_config(&settings.listeners[0], None)
            .unwrap();
        assert_eq!(
            config.default_priv,
            UserPriv {
                read: true,
                post: false
            }
        );
        assert!(config.user_pass.is_some());
        assert!(config.cert_fp.is_none());

        let peer = settings.peers[0].puller_config().unwrap();
        assert_eq!(peer.port, 563);
        assert_eq!(peer.security, Security::Implicit);
        assert!(peer.wants_new_group("comp.lang.rust"));
        assert!(!peer.wants_new_group("alt.test"));
    }

    #[test]
    fn test_peer_delays() {
        let peer: PeerSettings =
            serde_json::from_str(r#"{"host": "h", "port": 1119, "retry_secs": 3}"#).unwrap();
        let config = peer.puller_config().unwrap();
        assert_eq!(config.port, 1119);
        assert_eq!(config.retry_delay, Duration::from_secs(3));
    }

    #[test]
    fn test_rejects_bad_documents() {
        assert!(Settings::parse(r#"{"groups": [{"name": "bad group"}]}"#).is_err());
        assert!(Settings::parse(r#"{"peers": [{"host": "h", "auto_add": "a,"}]}"#).is_err());
        assert!(
            Settings::parse(r#"{"listeners": [{"addr": "[::]:563", "implicit_tls": true}]}"#)
                .is_err()
        );
    }
}
