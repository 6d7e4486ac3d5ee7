//! `newsledger` - NNTP news server with peer pulling
//!
//! Serves one in-memory spool on every configured listener and keeps it
//! filled from the configured remotes.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use newsledger_core::{Spool, SpoolSyncStore};
use newsledger_puller::Puller;
use newsledger_server::{ConfigHandle, ListenParams, Server};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::{Settings, TlsSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "newsledger=info,newsledger_server=info,newsledger_puller=info,newsledger_core=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = load_settings().await?;
    info!(hostname = %settings.hostname, "Starting newsledger");

    let spool = Arc::new(Spool::new(settings.hostname.clone()));
    for (name, group) in settings.groups()? {
        spool
            .create_group(&name, &group.description, group.posting)
            .await;
    }

    let tls = settings.tls.as_ref().map(TlsSettings::load).transpose()?;
    let params = ListenParams::from(settings.socket);
    let mut servers = Vec::with_capacity(settings.listeners.len());
    for listener in &settings.listeners {
        let config = settings.run_config(listener, tls.clone())?;
        let server = Server::new(spool.clone(), ConfigHandle::new(config));
        let addr = server
            .listen(listener.addr, params)
            .await
            .with_context(|| format!("listening on {}", listener.addr))?;
        info!(%addr, implicit_tls = listener.implicit_tls, "accepting connections");
        servers.push(server);
    }

    let cancel = CancellationToken::new();
    let pullers = TaskTracker::new();
    for peer in &settings.peers {
        let store = Arc::new(SpoolSyncStore::new(spool.clone()));
        let puller = Puller::new(peer.puller_config()?, store);
        let cancel = cancel.clone();
        pullers.spawn(async move { puller.run(cancel).await });
    }
    pullers.close();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("Shutting down");

    cancel.cancel();
    pullers.wait().await;
    for server in &servers {
        server.shutdown().await;
    }
    info!("Stopped");
    Ok(())
}

/// Reads the settings named on the command line, else the default file.
/// A missing default file means default settings.
async fn load_settings() -> anyhow::Result<Settings> {
    if let Some(path) = std::env::args_os().nth(1) {
        return Settings::load(&PathBuf::from(path)).await;
    }
    let path = Settings::default_path();
    if !path.exists() {
        warn!(path = %path.display(), "no settings file, using defaults");
        return Ok(Settings::default());
    }
    Settings::load(&path).await
}
