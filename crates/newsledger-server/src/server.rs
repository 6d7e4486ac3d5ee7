//! Listeners and the connection registry.
//!
//! Listener tasks and connection tasks are tracked separately so shutdown
//! can stop accepting first and then close every live connection.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::Result;
use crate::config::{ConfigHandle, ListenParams};
use crate::connection;
use crate::provider::Provider;
use crate::stream::Transport;

/// First delay after a temporary accept error.
const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(5);

/// Longest delay between accept retries.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Returns true for accept errors worth retrying: per-connection failures
/// and resource exhaustion.
fn is_temporary(error: &io::Error) -> bool {
    if matches!(
        error.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::OutOfMemory
    ) {
        return true;
    }
    // EMFILE / ENFILE
    matches!(error.raw_os_error(), Some(23 | 24))
}

/// An NNTP server: one provider, one configuration, any number of
/// listeners.
#[derive(Clone)]
pub struct Server {
    provider: Arc<dyn Provider>,
    config: ConfigHandle,
    listener_token: CancellationToken,
    connection_token: CancellationToken,
    listeners: TaskTracker,
    connections: TaskTracker,
}

impl Server {
    /// Creates a server.
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>, config: ConfigHandle) -> Self {
        Self {
            provider,
            config,
            listener_token: CancellationToken::new(),
            connection_token: CancellationToken::new(),
            listeners: TaskTracker::new(),
            connections: TaskTracker::new(),
        }
    }

    /// Returns the configuration handle; publishing through it affects
    /// commands from then on.
    #[must_use]
    pub const fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Binds `addr` with `params` and starts accepting in the background.
    ///
    /// Returns the bound address (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created or bound.
    pub async fn listen(&self, addr: SocketAddr, params: ListenParams) -> Result<SocketAddr> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.set_keepalive(params.keepalive)?;
        socket.bind(addr)?;
        let listener = socket.listen(params.backlog)?;
        let local = listener.local_addr()?;
        info!(%local, "listening");

        let server = self.clone();
        self.listeners
            .spawn(async move { server.serve(listener, params).await });
        Ok(local)
    }

    /// Accepts connections from `listener` until shutdown or a permanent
    /// accept error.
    pub async fn serve(&self, listener: TcpListener, params: ListenParams) {
        let mut backoff = ACCEPT_BACKOFF_MIN;
        loop {
            let accepted = tokio::select! {
                () = self.listener_token.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((socket, peer)) => {
                    backoff = ACCEPT_BACKOFF_MIN;
                    if let Err(error) = socket.set_nodelay(params.nodelay) {
                        debug!(%peer, %error, "set_nodelay failed");
                    }
                    self.serve_connection(socket, peer);
                }
                Err(error) if is_temporary(&error) => {
                    warn!(%error, ?backoff, "temporary accept error");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(ACCEPT_BACKOFF_MAX);
                }
                Err(error) => {
                    error!(%error, "accept failed, closing listener");
                    break;
                }
            }
        }
        debug!("listener stopped");
    }

    /// Serves one already accepted connection in a tracked task.
    pub fn serve_connection<IO: Transport>(&self, io: IO, peer: SocketAddr) {
        let provider = Arc::clone(&self.provider);
        let config = self.config.clone();
        let cancel = self.connection_token.child_token();
        let span = info_span!("conn", %peer);
        self.connections.spawn(
            async move {
                debug!("accepted");
                match connection::run(io, provider, config, cancel).await {
                    Ok(()) => debug!("closed"),
                    Err(error) if error.is_disconnect() => debug!(%error, "disconnected"),
                    Err(error) => warn!(%error, "connection failed"),
                }
            }
            .instrument(span),
        );
    }

    /// Stops every listener, waits for the accept loops, then closes every
    /// connection and waits for their tasks.
    pub async fn shutdown(&self) {
        self.listener_token.cancel();
        self.listeners.close();
        self.listeners.wait().await;

        self.connection_token.cancel();
        self.connections.close();
        self.connections.wait().await;
        info!("server stopped");
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
    fn test_temporary_errors() {
        assert!(is_temporary(&io::Error::from(io::ErrorKind::ConnectionAborted)));
        assert!(is_temporary(&io::Error::from_raw_os_error(24)));
        assert!(!is_temporary(&io::Error::from(io::ErrorKind::InvalidInput)));
    }

    #[test]
    fn test_backoff_caps() {
        let mut backoff = ACCEPT_BACKOFF_MIN;
        for _ in 0..20 {
            backoff = (backoff * 2).min(ACCEPT_BACKOFF_MAX);
        }
        assert_eq!(backoff, ACCEPT_BACKOFF_MAX);
    }
}
