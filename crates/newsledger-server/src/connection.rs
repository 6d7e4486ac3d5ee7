//! One client connection: greeting, command loop and TLS upgrades.

use std::sync::Arc;

use newsledger_nntp::framing::COMMAND_LINE_LIMIT;
use newsledger_nntp::{FramedStream, ResponseCode};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{ConfigHandle, RunConfig};
use crate::handlers::{Context, Flow, dispatch};
use crate::provider::Provider;
use crate::session::Session;
use crate::stream::{ServerStream, Transport};
use crate::{Error, Result};

/// Applies what a completed handshake changes: TLS privileges and, when
/// enabled, login by client certificate.
fn after_tls<IO: Transport>(session: &mut Session, stream: &ServerStream<IO>, config: &RunConfig) {
    session.activate_tls(config.tls_priv);
    if !config.cert_fp_auto_auth {
        return;
    }
    let user = config
        .cert_fp
        .as_ref()
        .zip(stream.peer_fingerprint())
        .and_then(|(provider, fp)| provider.user_by_fingerprint(&fp));
    if let Some(user) = user {
        info!(user = %user.name, "authenticated by client certificate");
        session.login(&user);
    }
}

/// Serves one connection until QUIT, end of stream, an I/O error or
/// cancellation.
///
/// Cancellation closes the connection even mid-command: a client that
/// stops sending an article body or stops reading responses is dropped
/// with its stream.
pub(crate) async fn run<IO: Transport>(
    io: IO,
    provider: Arc<dyn Provider>,
    config: ConfigHandle,
    cancel: CancellationToken,
) -> Result<()> {
    tokio::select! {
        biased;
        result = serve(io, provider, config, &cancel) => result,
        () = cancel.cancelled() => {
            debug!("connection dropped by shutdown");
            Ok(())
        }
    }
}

/// The connection proper. Between commands a cancellation ends it with a
/// clean stream shutdown.
async fn serve<IO: Transport>(
    io: IO,
    provider: Arc<dyn Provider>,
    config: ConfigHandle,
    cancel: &CancellationToken,
) -> Result<()> {
    let initial = config.snapshot();
    let mut session = Session::new(&initial);
    let mut stream = ServerStream::plain(io);

    if initial.implicit_tls {
        let Some(tls) = initial.tls.clone() else {
            return Err(Error::Config(
                "implicit TLS requested without a TLS configuration".into(),
            ));
        };
        stream = stream.accept_tls(tls).await?;
        after_tls(&mut session, &stream, &initial);
    }

    let mut framed = FramedStream::with_line_limit(stream, COMMAND_LINE_LIMIT);
    if session.can_post() && provider.supports_post() {
        framed
            .send_status(ResponseCode::READY_POSTING_ALLOWED, "service ready, posting allowed")
            .await?;
    } else {
        framed
            .send_status(ResponseCode::READY_NO_POSTING, "service ready, posting prohibited")
            .await?;
    }

    loop {
        let read = tokio::select! {
            () = cancel.cancelled() => {
                debug!("connection cancelled");
                break;
            }
            read = framed.read_line() => read,
        };
        let line = match read {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("client closed connection");
                return Ok(());
            }
            Err(newsledger_nntp::Error::LineTooLong { .. }) => {
                framed.discard_line().await?;
                framed
                    .send_status(ResponseCode::SYNTAX_ERROR, "command too long")
                    .await?;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot = config.snapshot();
        let flow = {
            let mut ctx = Context {
                framed: &mut framed,
                session: &mut session,
                config: &snapshot,
                provider: provider.as_ref(),
            };
            dispatch(&mut ctx, &line).await?
        };

        match flow {
            Flow::Continue => {}
            Flow::Close => break,
            Flow::StartTls => {
                let Some(tls) = snapshot.tls.clone() else {
                    return Err(Error::Abort("TLS configuration vanished".into()));
                };
                // plaintext pipelined after STARTTLS is dropped here
                let stream = framed.into_inner().accept_tls(tls).await?;
                after_tls(&mut session, &stream, &snapshot);
                debug!("TLS activated");
                framed = FramedStream::with_line_limit(stream, COMMAND_LINE_LIMIT);
            }
        }
    }

    let mut stream = framed.into_inner();
    if let Err(error) = stream.shutdown().await {
        debug!(%error, "shutdown failed");
    }
    Ok(())
}
