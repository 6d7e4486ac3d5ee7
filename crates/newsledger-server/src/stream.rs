//! Transport for server connections: plaintext or TLS.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;

use crate::auth::cert_fingerprint;
use crate::{Error, Result};

/// Byte streams a connection can run over: TCP sockets in production,
/// in-memory duplex pipes in tests.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// A server-side stream that is either plaintext or TLS.
pub enum ServerStream<IO> {
    /// Plaintext stream.
    Plain(IO),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<IO>>),
}

impl<IO> ServerStream<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a plaintext stream.
    pub const fn plain(stream: IO) -> Self {
        Self::Plain(stream)
    }

    /// Runs the server side of a TLS handshake.
    pub async fn accept_tls(self, config: Arc<rustls::ServerConfig>) -> Result<Self> {
        match self {
            Self::Plain(io) => {
                let tls = TlsAcceptor::from(config).accept(io).await?;
                Ok(Self::Tls(Box::new(tls)))
            }
            Self::Tls(_) => Err(Error::Abort("stream is already TLS".into())),
        }
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// SHA-256 fingerprint of the client's leaf certificate, if it sent
    /// one.
    #[must_use]
    pub fn peer_fingerprint(&self) -> Option<[u8; 32]> {
        match self {
            Self::Plain(_) => None,
            Self::Tls(tls) => {
                let (_, conn) = tls.get_ref();
                conn.peer_certificates()
                    .and_then(<[_]>::first)
                    .map(|cert| cert_fingerprint(cert.as_ref()))
            }
        }
    }
}

impl<IO> AsyncRead for ServerStream<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
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

impl<IO> AsyncWrite for ServerStream<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
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
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn test_plain_passthrough() {
        let (client, server) = tokio::io::duplex(64);
        let mut server = ServerStream::plain(server);
        assert!(!server.is_tls());
        assert!(server.peer_fingerprint().is_none());

        let mut client = client;
        client.write_all(b"DATE\r\n").await.unwrap();
        let mut buf = [0u8; 6];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"DATE\r\n");
    }
}
