//! Client transport: plaintext or implicit TLS.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::config::{PullerConfig, Security};
use crate::{Error, Result};

/// A connection to a remote, either plaintext or TLS.
pub enum PullStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl PullStream {
    /// Dials the remote named by `config`, with a TLS handshake for
    /// [`Security::Implicit`]. The whole exchange is bounded by the
    /// connect timeout.
    pub async fn connect(config: &PullerConfig, tls: &Arc<rustls::ClientConfig>) -> Result<Self> {
        tokio::time::timeout(config.connect_timeout, Self::dial(config, tls))
            .await
            .map_err(|_| Error::Timeout(config.connect_timeout))?
    }

    async fn dial(config: &PullerConfig, tls: &Arc<rustls::ClientConfig>) -> Result<Self> {
        let tcp = TcpStream::connect((config.host.as_str(), config.port)).await?;
        tcp.set_nodelay(true)?;
        match config.security {
            Security::None => Ok(Self::Plain(tcp)),
            Security::Implicit => {
                let server_name = ServerName::try_from(config.host.clone())?;
                let connector = TlsConnector::from(Arc::clone(tls));
                let stream = connector.connect(server_name, tcp).await?;
                Ok(Self::Tls(Box::new(stream)))
            }
        }
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for PullStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for PullStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Builds a client TLS configuration trusting the bundled web PKI roots.
#[must_use]
pub fn default_tls_config() -> Arc<rustls::ClientConfig> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Arc::new(config)
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
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn test_default_tls_config() {
        let config = default_tls_config();
        assert!(config.alpn_protocols.is_empty());
    }

    #[tokio::test]
    async fn test_connect_plain() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"200 hi\r\n").await.unwrap();
        });

        let config = PullerConfig::builder("127.0.0.1").port(port).build();
        let mut stream = PullStream::connect(&config, &default_tls_config())
            .await
            .unwrap();
        assert!(!stream.is_tls());
        let mut buf = [0u8; 8];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"200 hi\r\n");
        accept.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = PullerConfig::builder("127.0.0.1")
            .port(port)
            .connect_timeout(Duration::from_secs(5))
            .build();
        let err = PullStream::connect(&config, &default_tls_config())
            .await
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }
}
